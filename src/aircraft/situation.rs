use serde::Serialize;
use std::fmt::Display;

use super::Timestamped;
use crate::types::{Callsign, Point};

/// Ground factor at or above this value counts as "on ground" whenever a
/// boolean answer is required.
pub const GROUND_FACTOR_THRESHOLD: f64 = 0.95;

/// Tri-state ground classification. `Unknown` means nobody could tell,
/// which is a normal steady state for freshly sighted aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OnGroundState {
  NotOnGround,
  OnGround,
  Unknown,
}

/// Where the ground classification came from, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OnGroundDetails {
  NotSet,
  /// derived from the interpolated ground factor
  OnGroundByInterpolation,
  /// elevation plane + CG comparison
  OnGroundByElevationAndCg,
  /// change-detector heuristics
  OnGroundByGuessing,
  /// the network update carried an explicit ground flag
  InFromNetwork,
  /// taken from a received parts record
  InFromParts,
  /// own aircraft sent out to the network
  OutOnGroundOwnAircraft,
}

impl OnGroundDetails {
  /// Relative trust used when deciding whether a later resolution may
  /// replace an earlier one.
  pub fn strength(&self) -> u8 {
    match self {
      OnGroundDetails::NotSet => 0,
      OnGroundDetails::OutOnGroundOwnAircraft => 1,
      OnGroundDetails::OnGroundByGuessing => 2,
      OnGroundDetails::OnGroundByElevationAndCg => 3,
      OnGroundDetails::OnGroundByInterpolation => 4,
      OnGroundDetails::InFromParts => 5,
      OnGroundDetails::InFromNetwork => 6,
    }
  }

  /// Network and parts flags are ground truth, a guess never beats them.
  pub fn is_authoritative(&self) -> bool {
    matches!(
      self,
      OnGroundDetails::InFromNetwork | OnGroundDetails::InFromParts
    )
  }
}

impl Display for OnGroundDetails {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      OnGroundDetails::NotSet => write!(f, "not set"),
      OnGroundDetails::OnGroundByInterpolation => write!(f, "interpolation"),
      OnGroundDetails::OnGroundByElevationAndCg => write!(f, "elevation+cg"),
      OnGroundDetails::OnGroundByGuessing => write!(f, "guessing"),
      OnGroundDetails::InFromNetwork => write!(f, "network"),
      OnGroundDetails::InFromParts => write!(f, "parts"),
      OnGroundDetails::OutOnGroundOwnAircraft => write!(f, "own aircraft"),
    }
  }
}

/// Ground classification plus a continuous factor in [0,1] used for smooth
/// visual transitions. Factor -1.0 means "no factor known" and the discrete
/// state alone applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OnGroundInfo {
  pub state: OnGroundState,
  pub details: OnGroundDetails,
  pub factor: f64,
}

impl OnGroundInfo {
  pub fn not_set() -> Self {
    Self {
      state: OnGroundState::Unknown,
      details: OnGroundDetails::NotSet,
      factor: -1.0,
    }
  }

  pub fn from_network(on_ground: bool) -> Self {
    Self {
      state: if on_ground {
        OnGroundState::OnGround
      } else {
        OnGroundState::NotOnGround
      },
      details: OnGroundDetails::InFromNetwork,
      factor: -1.0,
    }
  }

  pub fn from_parts(on_ground: bool) -> Self {
    Self {
      state: if on_ground {
        OnGroundState::OnGround
      } else {
        OnGroundState::NotOnGround
      },
      details: OnGroundDetails::InFromParts,
      factor: -1.0,
    }
  }

  /// Interpolated case: the state is derived from the factor so the two can
  /// never disagree.
  pub fn from_ground_factor(factor: f64) -> Self {
    let factor = factor.clamp(0.0, 1.0);
    Self {
      state: if factor >= GROUND_FACTOR_THRESHOLD {
        OnGroundState::OnGround
      } else {
        OnGroundState::NotOnGround
      },
      details: OnGroundDetails::OnGroundByInterpolation,
      factor,
    }
  }

  pub fn resolved(state: OnGroundState, details: OnGroundDetails) -> Self {
    Self {
      state,
      details,
      factor: -1.0,
    }
  }

  pub fn has_factor(&self) -> bool {
    self.factor >= 0.0
  }

  /// With a factor present this is a pure threshold test, otherwise the
  /// discrete state decides.
  pub fn is_on_ground(&self) -> bool {
    if self.has_factor() {
      self.factor >= GROUND_FACTOR_THRESHOLD
    } else {
      self.state == OnGroundState::OnGround
    }
  }

  pub fn is_unknown(&self) -> bool {
    !self.has_factor() && self.state == OnGroundState::Unknown
  }
}

/// How a ground elevation value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElevationInfo {
  NoElevation,
  /// simulator terrain probe
  SimProvider,
  /// averaged from surrounding non-moving aircraft
  Average,
  Test,
}

/// Linear plus angular velocity, optional as one block since the network
/// either sends a full fast-position update or none of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Velocity6Dof {
  pub x_velocity_ms: f64,
  pub y_velocity_ms: f64,
  pub z_velocity_ms: f64,
  pub pitch_rad_per_sec: f64,
  pub bank_rad_per_sec: f64,
  pub heading_rad_per_sec: f64,
}

impl Velocity6Dof {
  pub fn lerp(&self, other: &Velocity6Dof, fraction: f64) -> Velocity6Dof {
    let f = fraction.clamp(0.0, 1.0);
    let lerp = |a: f64, b: f64| a + (b - a) * f;
    Velocity6Dof {
      x_velocity_ms: lerp(self.x_velocity_ms, other.x_velocity_ms),
      y_velocity_ms: lerp(self.y_velocity_ms, other.y_velocity_ms),
      z_velocity_ms: lerp(self.z_velocity_ms, other.z_velocity_ms),
      pitch_rad_per_sec: lerp(self.pitch_rad_per_sec, other.pitch_rad_per_sec),
      bank_rad_per_sec: lerp(self.bank_rad_per_sec, other.bank_rad_per_sec),
      heading_rad_per_sec: lerp(self.heading_rad_per_sec, other.heading_rad_per_sec),
    }
  }
}

/// One instant of remote-aircraft truth as received from the network,
/// possibly enriched with a resolved ground elevation later on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftSituation {
  pub callsign: Callsign,
  pub position: Point,
  pub altitude_ft: f64,
  pub pressure_altitude_ft: Option<f64>,
  pub heading_deg: f64,
  pub pitch_deg: f64,
  pub bank_deg: f64,
  pub ground_speed_kt: f64,
  pub velocity: Option<Velocity6Dof>,
  pub on_ground: OnGroundInfo,
  pub ground_elevation_ft: Option<f64>,
  pub elevation_info: ElevationInfo,
  pub timestamp_ms: i64,
  pub time_offset_ms: i64,
}

impl AircraftSituation {
  pub fn new(callsign: Callsign, position: Point, altitude_ft: f64, timestamp_ms: i64) -> Self {
    Self {
      callsign,
      position,
      altitude_ft,
      pressure_altitude_ft: None,
      heading_deg: 0.0,
      pitch_deg: 0.0,
      bank_deg: 0.0,
      ground_speed_kt: 0.0,
      velocity: None,
      on_ground: OnGroundInfo::not_set(),
      ground_elevation_ft: None,
      elevation_info: ElevationInfo::NoElevation,
      timestamp_ms,
      time_offset_ms: 0,
    }
  }

  /// Sentinel returned by lookups that found nothing.
  pub fn null() -> Self {
    Self::new(Callsign::new(""), Point::new(f64::NAN, f64::NAN), 0.0, 0)
  }

  pub fn is_null(&self) -> bool {
    self.callsign.is_empty() || self.timestamp_ms == 0
  }

  /// Position validity is independent of ground validity, a situation may
  /// lack elevation and still place the aircraft.
  pub fn has_valid_position(&self) -> bool {
    self.position.is_valid() && self.altitude_ft.is_finite()
  }

  pub fn has_ground_elevation(&self) -> bool {
    self.ground_elevation_ft.is_some()
  }

  pub fn is_on_ground(&self) -> bool {
    self.on_ground.is_on_ground()
  }

  /// Height of the CG-corrected gear point above the known ground
  /// elevation, `None` without an elevation.
  pub fn ground_distance_ft(&self, cg_ft: f64) -> Option<f64> {
    self
      .ground_elevation_ft
      .map(|elv| self.altitude_ft - (elv + cg_ft))
  }

  pub fn set_ground_elevation(&mut self, elevation_ft: f64, info: ElevationInfo) {
    self.ground_elevation_ft = Some(elevation_ft);
    self.elevation_info = info;
  }
}

impl Timestamped for AircraftSituation {
  fn timestamp_ms(&self) -> i64 {
    self.timestamp_ms
  }

  fn time_offset_ms(&self) -> i64 {
    self.time_offset_ms
  }
}

#[cfg(test)]
pub mod tests {
  use super::*;

  #[test]
  fn test_ground_factor_threshold() {
    let info = OnGroundInfo::from_ground_factor(0.96);
    assert_eq!(info.state, OnGroundState::OnGround);
    assert!(info.is_on_ground());

    let info = OnGroundInfo::from_ground_factor(0.94);
    assert_eq!(info.state, OnGroundState::NotOnGround);
    assert!(!info.is_on_ground());
  }

  #[test]
  fn test_factor_and_state_agree() {
    // state is derived from the factor in the interpolation case,
    // disagreement is impossible by construction
    for factor in [0.0, 0.5, 0.949, 0.95, 1.0] {
      let info = OnGroundInfo::from_ground_factor(factor);
      assert_eq!(info.is_on_ground(), info.state == OnGroundState::OnGround);
    }
  }

  #[test]
  fn test_details_strength() {
    assert!(OnGroundDetails::InFromNetwork.strength() > OnGroundDetails::InFromParts.strength());
    assert!(
      OnGroundDetails::InFromParts.strength() > OnGroundDetails::OnGroundByElevationAndCg.strength()
    );
    assert!(
      OnGroundDetails::OnGroundByElevationAndCg.strength()
        > OnGroundDetails::OnGroundByGuessing.strength()
    );
    assert!(OnGroundDetails::InFromNetwork.is_authoritative());
    assert!(!OnGroundDetails::OnGroundByGuessing.is_authoritative());
  }

  #[test]
  fn test_ground_distance() {
    let mut s = AircraftSituation::new(
      Callsign::new("DLH123"),
      Point::new(50.0, 8.0),
      1000.0,
      1_000_000,
    );
    assert!(s.ground_distance_ft(4.0).is_none());
    s.set_ground_elevation(364.0, ElevationInfo::SimProvider);
    let gd = s.ground_distance_ft(4.0).unwrap();
    assert!((gd - 632.0).abs() < 1e-9);
  }

  #[test]
  fn test_null_situation() {
    let s = AircraftSituation::null();
    assert!(s.is_null());
    assert!(!s.has_valid_position());
  }

  #[test]
  fn test_adjusted_timestamp() {
    let mut s = AircraftSituation::new(
      Callsign::new("DLH123"),
      Point::new(50.0, 8.0),
      1000.0,
      5000,
    );
    s.time_offset_ms = 250;
    assert_eq!(s.adjusted_timestamp_ms(), 5250);
  }
}
