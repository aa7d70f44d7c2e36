use serde::Serialize;
use std::fmt::Display;

use super::Timestamped;

/// Where a parts record came from. Guessed parts are synthesized by clients
/// for aircraft that never send the real thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PartsDetails {
  NotSet,
  FsdParts,
  GuessedParts,
}

impl Display for PartsDetails {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PartsDetails::NotSet => write!(f, "not set"),
      PartsDetails::FsdParts => write!(f, "fsd"),
      PartsDetails::GuessedParts => write!(f, "guessed"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AircraftLights {
  pub strobe: bool,
  pub landing: bool,
  pub taxi: bool,
  pub beacon: bool,
  pub nav: bool,
  pub logo: bool,
}

impl AircraftLights {
  pub fn all_on() -> Self {
    Self {
      strobe: true,
      landing: true,
      taxi: true,
      beacon: true,
      nav: true,
      logo: true,
    }
  }
}

/// One instant of aircraft systems state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftParts {
  pub on_ground: bool,
  pub gear_down: bool,
  pub flaps_percent: f64,
  pub spoilers_out: bool,
  pub lights: AircraftLights,
  /// one flag per engine, empty means "engine count unknown"
  pub engines_on: Vec<bool>,
  pub details: PartsDetails,
  pub timestamp_ms: i64,
  pub time_offset_ms: i64,
}

impl AircraftParts {
  pub fn new(on_ground: bool, timestamp_ms: i64) -> Self {
    Self {
      on_ground,
      gear_down: on_ground,
      flaps_percent: 0.0,
      spoilers_out: false,
      lights: AircraftLights::default(),
      engines_on: vec![],
      details: PartsDetails::NotSet,
      timestamp_ms,
      time_offset_ms: 0,
    }
  }

  pub fn null() -> Self {
    Self::new(false, 0)
  }

  pub fn is_null(&self) -> bool {
    self.timestamp_ms == 0
  }

  pub fn any_engine_on(&self) -> bool {
    self.engines_on.iter().any(|e| *e)
  }
}

impl Timestamped for AircraftParts {
  fn timestamp_ms(&self) -> i64 {
    self.timestamp_ms
  }

  fn time_offset_ms(&self) -> i64 {
    self.time_offset_ms
  }
}
