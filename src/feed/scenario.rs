//! JSON trace replay. Recorded traces use relative timestamps so the same
//! file replays at any wall-clock time; the loader layers raw serde types
//! into domain values the same way live network input would arrive.

use serde::Deserialize;
use std::{
  error::Error,
  fmt::Display,
  fs,
};

use super::FeedEvent;
use crate::{
  aircraft::{
    parts::{AircraftParts, PartsDetails},
    simulated::AircraftModel,
    situation::{AircraftSituation, OnGroundInfo},
  },
  types::{Callsign, Point},
};

pub type Result<T> = std::result::Result<T, ScenarioError>;

#[derive(Debug)]
pub enum ScenarioError {
  IOError(std::io::Error),
  JsonError(serde_json::Error),
  EmptyScenario,
}

impl Display for ScenarioError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ScenarioError::IOError(err) => write!(f, "ScenarioError: {err}"),
      ScenarioError::JsonError(err) => write!(f, "Scenario file not parseable: {err}"),
      ScenarioError::EmptyScenario => write!(f, "Scenario contains no updates"),
    }
  }
}

impl Error for ScenarioError {}

impl From<std::io::Error> for ScenarioError {
  fn from(value: std::io::Error) -> Self {
    Self::IOError(value)
  }
}

impl From<serde_json::Error> for ScenarioError {
  fn from(value: serde_json::Error) -> Self {
    Self::JsonError(value)
  }
}

#[derive(Debug, Deserialize)]
struct RawScenario {
  name: String,
  aircraft: Vec<RawAircraft>,
}

#[derive(Debug, Deserialize)]
struct RawAircraft {
  callsign: String,
  #[serde(default)]
  model: Option<String>,
  #[serde(default)]
  cg_ft: f64,
  #[serde(default)]
  vtol: bool,
  updates: Vec<RawUpdate>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
  t_ms: i64,
  lat: f64,
  lng: f64,
  altitude_ft: f64,
  #[serde(default)]
  heading_deg: f64,
  #[serde(default)]
  pitch_deg: f64,
  #[serde(default)]
  bank_deg: f64,
  #[serde(default)]
  ground_speed_kt: f64,
  #[serde(default)]
  on_ground: Option<bool>,
  #[serde(default)]
  parts: Option<RawParts>,
}

#[derive(Debug, Deserialize)]
struct RawParts {
  gear_down: bool,
  #[serde(default)]
  flaps_percent: f64,
  #[serde(default)]
  spoilers_out: bool,
  #[serde(default)]
  engines_on: Vec<bool>,
  #[serde(default)]
  guessed: bool,
}

/// A loaded trace: aircraft models to announce plus the merged, time-sorted
/// event stream with timestamps relative to scenario start.
#[derive(Debug, Clone)]
pub struct Scenario {
  pub name: String,
  pub models: Vec<(Callsign, AircraftModel)>,
  pub events: Vec<FeedEvent>,
}

impl Scenario {
  pub fn duration_ms(&self) -> i64 {
    self.events.last().map(|e| e.timestamp_ms()).unwrap_or(0)
  }
}

impl From<RawScenario> for Scenario {
  fn from(raw: RawScenario) -> Self {
    let mut models = vec![];
    let mut events = vec![];

    for raw_aircraft in raw.aircraft.into_iter() {
      let callsign = Callsign::new(&raw_aircraft.callsign);

      let mut model = AircraftModel::new(
        raw_aircraft.model.as_deref().unwrap_or(""),
        raw_aircraft.cg_ft,
      );
      model.set_vtol(raw_aircraft.vtol);
      models.push((callsign.clone(), model));

      for update in raw_aircraft.updates.into_iter() {
        let mut situation = AircraftSituation::new(
          callsign.clone(),
          Point::new(update.lat, update.lng).clamp(),
          update.altitude_ft,
          update.t_ms,
        );
        situation.heading_deg = update.heading_deg;
        situation.pitch_deg = update.pitch_deg;
        situation.bank_deg = update.bank_deg;
        situation.ground_speed_kt = update.ground_speed_kt;
        if let Some(on_ground) = update.on_ground {
          situation.on_ground = OnGroundInfo::from_network(on_ground);
        }
        events.push(FeedEvent::Situation(situation));

        if let Some(raw_parts) = update.parts {
          let mut parts = AircraftParts::new(update.on_ground.unwrap_or(false), update.t_ms);
          parts.gear_down = raw_parts.gear_down;
          parts.flaps_percent = raw_parts.flaps_percent;
          parts.spoilers_out = raw_parts.spoilers_out;
          parts.engines_on = raw_parts.engines_on;
          parts.details = if raw_parts.guessed {
            PartsDetails::GuessedParts
          } else {
            PartsDetails::FsdParts
          };
          events.push(FeedEvent::Parts(callsign.clone(), parts));
        }
      }
    }

    events.sort_by_key(|e| e.timestamp_ms());
    Self {
      name: raw.name,
      models,
      events,
    }
  }
}

pub fn load_scenario(filename: &str) -> Result<Scenario> {
  let raw = fs::read_to_string(filename)?;
  parse_scenario(&raw)
}

pub fn parse_scenario(raw: &str) -> Result<Scenario> {
  let raw: RawScenario = serde_json::from_str(raw)?;
  let scenario: Scenario = raw.into();
  if scenario.events.is_empty() {
    return Err(ScenarioError::EmptyScenario);
  }
  Ok(scenario)
}

#[cfg(test)]
pub mod tests {
  use super::*;

  const TRACE: &str = r#"{
    "name": "takeoff",
    "aircraft": [
      {
        "callsign": "dlh123",
        "model": "A320",
        "cg_ft": 4.5,
        "updates": [
          {
            "t_ms": 5000, "lat": 50.03, "lng": 8.57, "altitude_ft": 368.0,
            "heading_deg": 250.0, "ground_speed_kt": 0.0, "on_ground": true,
            "parts": { "gear_down": true, "engines_on": [true, true] }
          },
          { "t_ms": 0, "lat": 50.03, "lng": 8.57, "altitude_ft": 368.0, "on_ground": true },
          { "t_ms": 10000, "lat": 50.04, "lng": 8.55, "altitude_ft": 600.0, "on_ground": false }
        ]
      }
    ]
  }"#;

  #[test]
  fn test_parse_and_sort() {
    let scenario = parse_scenario(TRACE).unwrap();
    assert_eq!(scenario.name, "takeoff");
    assert_eq!(scenario.models.len(), 1);
    assert_eq!(scenario.models[0].0, Callsign::new("DLH123"));
    assert!((scenario.models[0].1.cg_ft - 4.5).abs() < 1e-9);

    // three situations + one parts record, merged and time-sorted
    assert_eq!(scenario.events.len(), 4);
    let times: Vec<i64> = scenario.events.iter().map(|e| e.timestamp_ms()).collect();
    assert_eq!(times, vec![0, 5000, 5000, 10000]);
    assert_eq!(scenario.duration_ms(), 10_000);
  }

  #[test]
  fn test_ground_flag_layering() {
    let scenario = parse_scenario(TRACE).unwrap();
    let grounded: Vec<bool> = scenario
      .events
      .iter()
      .filter_map(|e| match e {
        FeedEvent::Situation(s) => Some(s.is_on_ground()),
        _ => None,
      })
      .collect();
    assert_eq!(grounded, vec![true, true, false]);
  }

  #[test]
  fn test_parts_details() {
    let scenario = parse_scenario(TRACE).unwrap();
    let parts = scenario
      .events
      .iter()
      .find_map(|e| match e {
        FeedEvent::Parts(_, p) => Some(p.clone()),
        _ => None,
      })
      .unwrap();
    assert_eq!(parts.details, PartsDetails::FsdParts);
    assert!(parts.gear_down);
    assert_eq!(parts.engines_on, vec![true, true]);
  }

  #[test]
  fn test_bad_json() {
    assert!(matches!(
      parse_scenario("{not json"),
      Err(ScenarioError::JsonError(_))
    ));
    assert!(matches!(
      parse_scenario(r#"{"name": "empty", "aircraft": []}"#),
      Err(ScenarioError::EmptyScenario)
    ));
  }
}
