use duration_str::deserialize_duration;
use log::LevelFilter;
use serde::Deserialize;
use std::{fs::File, io::Read, path::Path, time::Duration};

use crate::interpolate::InterpolationMode;

#[derive(Deserialize, Debug, Clone)]
pub struct Log {
  pub level: LevelFilter,
}

impl Default for Log {
  fn default() -> Self {
    Self {
      level: LevelFilter::Debug,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Sim {
  /// how often the render loop asks for interpolated situations
  #[serde(deserialize_with = "deserialize_duration")]
  pub render_interval: Duration,
  #[serde(deserialize_with = "deserialize_duration")]
  pub metrics_interval: Duration,
  pub render_range_nm: f64,
  pub max_rendered_aircraft: usize,
}

impl Default for Sim {
  fn default() -> Self {
    Self {
      render_interval: Duration::from_millis(50),
      metrics_interval: Duration::from_secs(30),
      render_range_nm: 100.0,
      max_rendered_aircraft: 20,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Interpolation {
  pub mode: InterpolationMode,
  /// render time is shifted back by this much to stay between updates
  #[serde(deserialize_with = "deserialize_duration")]
  pub time_offset: Duration,
  pub pitch_on_ground_deg: Option<f64>,
}

impl Default for Interpolation {
  fn default() -> Self {
    Self {
      mode: InterpolationMode::Linear,
      time_offset: Duration::from_secs(6),
      pitch_on_ground_deg: None,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Provider {
  pub reverse_lookup_messages: bool,
}

impl Default for Provider {
  fn default() -> Self {
    Self {
      reverse_lookup_messages: false,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Feed {
  pub aircraft: usize,
  #[serde(deserialize_with = "deserialize_duration")]
  pub update_period: Duration,
  #[serde(deserialize_with = "deserialize_duration")]
  pub jitter: Duration,
  /// chance that two consecutive updates of one aircraft swap on the wire
  pub out_of_order_probability: f64,
  pub origin_lat: f64,
  pub origin_lng: f64,
  pub field_elevation_ft: f64,
  pub scenario: Option<String>,
}

impl Default for Feed {
  fn default() -> Self {
    Self {
      aircraft: 5,
      update_period: Duration::from_secs(5),
      jitter: Duration::from_millis(300),
      out_of_order_probability: 0.05,
      origin_lat: 50.0333,
      origin_lng: 8.5706,
      field_elevation_ft: 364.0,
      scenario: None,
    }
  }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
  pub log: Log,
  pub sim: Sim,
  pub interpolation: Interpolation,
  pub provider: Provider,
  pub feed: Feed,
}

pub fn read_config(filename: Option<&str>) -> Config {
  let mut filenames = vec!["./simtraffic.toml", "/etc/simtraffic.toml"];
  if let Some(filename) = filename {
    filenames.insert(0, filename);
  }

  for fname in filenames {
    let path = Path::new(fname);
    println!("Trying config file {}...", fname);
    if path.is_file() {
      let res = File::open(path);
      if let Err(err) = res {
        println!("Error opening config file {}: {}", fname, err);
        continue;
      }
      let mut f = res.unwrap();
      let mut config_raw = String::new();
      let res = f.read_to_string(&mut config_raw);
      if let Err(err) = res {
        println!("Error reading config file {}: {}", fname, err);
        continue;
      }
      let res: Result<Config, toml::de::Error> = toml::from_str(&config_raw);
      if let Err(err) = res {
        println!("Error parsing config file {}: {}", fname, err);
        continue;
      }
      return res.unwrap();
    }
    println!("Config file {} does not exist", fname);
  }
  println!("No config files can be read, using default settings");
  Default::default()
}
