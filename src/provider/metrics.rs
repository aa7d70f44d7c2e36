use chrono::{DateTime, Utc};
use std::{collections::HashMap, fmt::Display};

use crate::util::seconds_since;

#[macro_export]
macro_rules! labels {
  ($($label:literal = $value:expr),+) => {
    {
      let mut c: HashMap<&'static str, String> = HashMap::new();
      $(c.insert(($label).into(), ($value).into());)+
      c
    }
  };
}

#[derive(Debug, Clone)]
pub enum MetricType {
  Counter,
  Gauge,
  Summary,
  Histogram,
}

impl Display for MetricType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      MetricType::Counter => write!(f, "counter"),
      MetricType::Gauge => write!(f, "gauge"),
      MetricType::Summary => write!(f, "summary"),
      MetricType::Histogram => write!(f, "histogram"),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Metric<T: Display + Clone + Default> {
  name: String,
  help: String,
  metric_type: MetricType,
  single: bool,
  values: HashMap<String, T>,
}

impl<T: Display + Clone + Default> Metric<T> {
  pub fn new(name: &str, help: &str, mtype: MetricType) -> Self {
    Self {
      name: name.into(),
      help: help.into(),
      metric_type: mtype,
      single: false,
      values: HashMap::new(),
    }
  }

  pub fn reset(&mut self) {
    self.values.clear();
  }

  pub fn set(&mut self, labels: HashMap<&'static str, String>, value: T) {
    self.single = false;
    let mut labels = labels
      .iter()
      .map(|(k, v)| format!("{}=\"{}\"", k, v))
      .collect::<Vec<String>>();
    labels.sort();
    let label_str = labels.join(",");
    self.values.insert(label_str, value);
  }

  pub fn set_single(&mut self, value: T) {
    self.reset();
    self.single = true;
    self.values.insert("_".into(), value);
  }

  pub fn render(&self) -> String {
    if self.values.is_empty() {
      return "".into();
    }

    let comment = format!(
      "# HELP {} {}\n# TYPE {} {}\n",
      self.name, self.help, self.name, self.metric_type
    );

    if self.single {
      let value = self.values.get("_").cloned().unwrap_or_default();
      comment + &format!("{} {}", self.name, value) + "\n"
    } else {
      let values = self
        .values
        .iter()
        .map(|(k, v)| format!("{}{{{}}} {}", self.name, k, v))
        .collect::<Vec<String>>()
        .join("\n");
      comment + &values + "\n"
    }
  }
}

impl<T: Display + Clone + Default> Metric<T>
where
  T: std::ops::AddAssign + From<u8>,
{
  pub fn inc(&mut self, labels: HashMap<&'static str, String>) {
    self.single = false;
    let mut keys = labels
      .iter()
      .map(|(k, v)| format!("{}=\"{}\"", k, v))
      .collect::<Vec<String>>();
    keys.sort();
    let key = keys.join(",");
    let entry = self.values.entry(key).or_default();
    *entry += T::from(1u8);
  }
}

/// Engine counters in Prometheus text form. Monotonic counts live on plain
/// fields, labelled ones on `Metric` values.
#[derive(Debug, Clone)]
pub struct Metrics {
  pub situations_stored: u64,
  pub parts_stored: u64,
  pub aircraft_added: u64,
  pub aircraft_removed: u64,
  pub elevation_backfills: u64,
  pub snapshots_built: u64,
  pub interpolations: Metric<u64>,
  pub processing_time_sec: Metric<f32>,
  pub process_started_at: DateTime<Utc>,
}

impl Metrics {
  pub fn new() -> Self {
    Self {
      situations_stored: 0,
      parts_stored: 0,
      aircraft_added: 0,
      aircraft_removed: 0,
      elevation_backfills: 0,
      snapshots_built: 0,
      interpolations: Metric::new(
        "interpolations_total",
        "Interpolation requests by outcome",
        MetricType::Counter,
      ),
      processing_time_sec: Metric::new(
        "processing_time_sec",
        "Processing time of feed and render stages",
        MetricType::Gauge,
      ),
      process_started_at: Utc::now(),
    }
  }

  pub fn render(&self) -> String {
    let mut metrics = vec![];

    let singles: [(&str, &str, u64); 6] = [
      (
        "situations_stored_total",
        "Situations ever stored",
        self.situations_stored,
      ),
      ("parts_stored_total", "Parts ever stored", self.parts_stored),
      (
        "aircraft_added_total",
        "Aircraft ever sighted",
        self.aircraft_added,
      ),
      (
        "aircraft_removed_total",
        "Aircraft removed after leaving range",
        self.aircraft_removed,
      ),
      (
        "elevation_backfills_total",
        "Stored situations retroactively resolved by elevation lookups",
        self.elevation_backfills,
      ),
      (
        "snapshots_built_total",
        "Airspace snapshots computed",
        self.snapshots_built,
      ),
    ];
    for (name, help, value) in singles {
      let mut metric = Metric::new(name, help, MetricType::Counter);
      metric.set_single(value);
      metrics.push(metric.render());
    }

    metrics.push(self.interpolations.render());
    metrics.push(self.processing_time_sec.render());

    let mut metric = Metric::new("uptime", "Process uptime in sec", MetricType::Counter);
    let sec = seconds_since(self.process_started_at).ceil() as u64;
    metric.set_single(sec);
    metrics.push(metric.render());

    metrics.join("")
  }
}

impl Default for Metrics {
  fn default() -> Self {
    Self::new()
  }
}
