use serde::Serialize;

use super::{situation::AircraftSituation, Timestamped};
use crate::{
  interpolate::pbh::shortest_delta_deg,
  types::Callsign,
  util::mean_and_stddev,
};

/// Altitude differences below this are treated as level flight noise.
const ALT_TREND_EPSILON_FT: f64 = 2.0;
/// Pushback: total heading swing at least this while crawling on ground.
const PUSHBACK_HEADING_SWING_DEG: f64 = 10.0;
/// Pushback: every sample in the window slower than this.
const PUSHBACK_MAX_GS_KT: f64 = 5.0;
/// Pushback: altitude essentially constant.
const PUSHBACK_MAX_ALT_STDDEV_FT: f64 = 2.0;
/// Rotation: accumulated nose-up pitch at least this while on the runway.
const ROTATE_PITCH_RISE_DEG: f64 = 2.0;
/// Rotation: per-pair pitch changes below this do not count as rising.
const ROTATE_PITCH_EPSILON_DEG: f64 = 0.25;
/// "Near ground" classification: mean gear height above terrain at most this.
const NEAR_GROUND_MAX_DISTANCE_FT: f64 = 50.0;
/// "Near ground" classification: altitude scatter at most this.
const NEAR_GROUND_MAX_ALT_STDDEV_FT: f64 = 4.0;
/// Elevation scatter allowed while still trusting a ground-level guess.
const ELEVATION_STDDEV_TOLERANCE_FT: f64 = 4.0;

/// What the window of situations says about scenery vs. network ground level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SceneryDeviation {
  NoDeviationInfo,
  AllOnGround,
  WasOnGround,
  SmallAglDeviationNearGround,
}

/// Mean and population standard deviation of one sampled quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
  pub mean: f64,
  pub stddev: f64,
}

/// Motion-state flags and rolling statistics derived from the latest window
/// of situations for one callsign, newest first. Recomputed from scratch on
/// every insertion, never updated incrementally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftSituationChange {
  pub callsign: Callsign,
  pub situations_count: usize,
  pub oldest_ms: i64,
  pub newest_ms: i64,

  pub const_ascending: bool,
  pub const_descending: bool,
  pub const_on_ground: bool,
  pub was_on_ground: bool,
  pub const_not_on_ground: bool,
  pub was_not_on_ground: bool,
  pub just_taking_off: bool,
  pub just_touching_down: bool,
  pub rotating_up: bool,
  pub contains_push_back: bool,

  pub altitude: Option<Stats>,
  pub elevation: Option<Stats>,
  pub pitch: Option<Stats>,
  pub ground_speed: Option<Stats>,
  pub ground_distance: Option<Stats>,

  /// network ground level minus local terrain, CG included
  pub scenery_deviation_cg_ft: Option<f64>,
  /// same with the aircraft CG subtracted out
  pub scenery_deviation_ft: Option<f64>,
  pub scenery_deviation: SceneryDeviation,
}

impl AircraftSituationChange {
  pub fn null(callsign: Callsign) -> Self {
    Self {
      callsign,
      situations_count: 0,
      oldest_ms: 0,
      newest_ms: 0,
      const_ascending: false,
      const_descending: false,
      const_on_ground: false,
      was_on_ground: false,
      const_not_on_ground: false,
      was_not_on_ground: false,
      just_taking_off: false,
      just_touching_down: false,
      rotating_up: false,
      contains_push_back: false,
      altitude: None,
      elevation: None,
      pitch: None,
      ground_speed: None,
      ground_distance: None,
      scenery_deviation_cg_ft: None,
      scenery_deviation_ft: None,
      scenery_deviation: SceneryDeviation::NoDeviationInfo,
    }
  }

  /// Analyze a window of situations, newest first. Fewer than two situations
  /// yield the null change. VTOL gates the fixed-wing takeoff, touchdown,
  /// rotation and pushback heuristics, rotor-craft ground contact does not
  /// follow them.
  pub fn compute(window: &[AircraftSituation], cg_ft: f64, vtol: bool) -> Self {
    let callsign = window
      .first()
      .map(|s| s.callsign.clone())
      .unwrap_or_else(|| Callsign::new(""));
    if window.len() < 2 {
      return Self::null(callsign);
    }

    let newest = &window[0];
    let mut change = Self::null(callsign);
    change.situations_count = window.len();
    change.newest_ms = newest.timestamp_ms();
    change.oldest_ms = window[window.len() - 1].timestamp_ms();

    // adjacent pairs, newer minus older
    let mut ascending = true;
    let mut descending = true;
    let mut pitch_rising = true;
    for pair in window.windows(2) {
      let d_alt = pair[0].altitude_ft - pair[1].altitude_ft;
      ascending = ascending && d_alt > ALT_TREND_EPSILON_FT;
      descending = descending && d_alt < -ALT_TREND_EPSILON_FT;
      pitch_rising = pitch_rising && pair[0].pitch_deg - pair[1].pitch_deg > ROTATE_PITCH_EPSILON_DEG;
    }
    change.const_ascending = ascending;
    change.const_descending = descending;

    change.const_on_ground = window.iter().all(|s| s.is_on_ground());
    change.const_not_on_ground = window.iter().all(|s| !s.is_on_ground());
    change.was_on_ground = window[1..].iter().all(|s| s.is_on_ground());
    change.was_not_on_ground = window[1..].iter().all(|s| !s.is_on_ground());

    if !vtol {
      change.just_taking_off = change.was_on_ground
        && !newest.is_on_ground()
        && newest.altitude_ft >= window[1].altitude_ft - ALT_TREND_EPSILON_FT;
      change.just_touching_down = change.was_not_on_ground && newest.is_on_ground();
      let total_pitch_rise = newest.pitch_deg - window[window.len() - 1].pitch_deg;
      change.rotating_up = (change.const_on_ground || change.was_on_ground)
        && pitch_rising
        && total_pitch_rise >= ROTATE_PITCH_RISE_DEG;
    }

    let altitudes: Vec<f64> = window.iter().map(|s| s.altitude_ft).collect();
    let pitches: Vec<f64> = window.iter().map(|s| s.pitch_deg).collect();
    let speeds: Vec<f64> = window.iter().map(|s| s.ground_speed_kt).collect();
    let elevations: Vec<f64> = window.iter().filter_map(|s| s.ground_elevation_ft).collect();
    let distances: Vec<f64> = window
      .iter()
      .filter_map(|s| s.ground_distance_ft(cg_ft))
      .collect();

    change.altitude = stats_of(&altitudes);
    change.pitch = stats_of(&pitches);
    change.ground_speed = stats_of(&speeds);
    change.elevation = stats_of(&elevations);
    change.ground_distance = stats_of(&distances);

    if !vtol && change.const_on_ground {
      // heading swing while parked-slow with constant altitude distinguishes
      // pushback from taxi
      let slow = speeds.iter().all(|gs| *gs < PUSHBACK_MAX_GS_KT);
      let level = change
        .altitude
        .map(|a| a.stddev <= PUSHBACK_MAX_ALT_STDDEV_FT)
        .unwrap_or(false);
      if slow && level {
        let mut swing = 0.0;
        for pair in window.windows(2) {
          swing += shortest_delta_deg(pair[1].heading_deg, pair[0].heading_deg).abs();
        }
        change.contains_push_back = swing >= PUSHBACK_HEADING_SWING_DEG;
      }
    }

    change.guess_scenery_deviation(cg_ft);
    change
  }

  fn guess_scenery_deviation(&mut self, cg_ft: f64) {
    let gnd = match self.ground_distance {
      Some(gnd) => gnd,
      None => return,
    };

    if self.was_on_ground && self.has_elevation_dev_within_allowed_range() {
      // gear glued to network ground level, the remaining offset is the
      // scenery mismatch
      self.scenery_deviation_cg_ft = Some(gnd.mean + cg_ft);
      self.scenery_deviation_ft = Some(gnd.mean);
      self.scenery_deviation = if self.const_on_ground {
        SceneryDeviation::AllOnGround
      } else {
        SceneryDeviation::WasOnGround
      };
    } else if let Some(alt) = self.altitude {
      let near_ground =
        gnd.mean + cg_ft <= NEAR_GROUND_MAX_DISTANCE_FT && alt.stddev <= NEAR_GROUND_MAX_ALT_STDDEV_FT;
      if near_ground {
        self.scenery_deviation_cg_ft = Some(gnd.mean + cg_ft);
        self.scenery_deviation_ft = Some(gnd.mean);
        self.scenery_deviation = SceneryDeviation::SmallAglDeviationNearGround;
      }
    }
  }

  pub fn is_null(&self) -> bool {
    self.situations_count < 2
  }

  /// Elevation scatter small enough to trust a ground-level conclusion.
  pub fn has_elevation_dev_within_allowed_range(&self) -> bool {
    self
      .elevation
      .map(|e| e.stddev <= ELEVATION_STDDEV_TOLERANCE_FT)
      .unwrap_or(false)
  }
}

impl Timestamped for AircraftSituationChange {
  fn timestamp_ms(&self) -> i64 {
    self.newest_ms
  }

  fn time_offset_ms(&self) -> i64 {
    0
  }
}

fn stats_of(values: &[f64]) -> Option<Stats> {
  mean_and_stddev(values).map(|(mean, stddev)| Stats { mean, stddev })
}
