pub mod linear;
pub mod pbh;
pub mod spline;

use serde::Deserialize;
use std::fmt::Display;

use self::{linear::LinearInterpolant, spline::SplineInterpolant};
use crate::aircraft::{
  parts::AircraftParts,
  situation::AircraftSituation,
  Timestamped,
};

/// Render time is shifted back by this much by default so the target stays
/// between received updates instead of ahead of them.
pub const DEFAULT_TIME_OFFSET_MS: i64 = 6000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
  #[default]
  Linear,
  Spline,
}

impl Display for InterpolationMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      InterpolationMode::Linear => write!(f, "linear"),
      InterpolationMode::Spline => write!(f, "spline"),
    }
  }
}

/// Per-callsign interpolation configuration, falling back to a provider-wide
/// default when no override exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationSetup {
  pub mode: InterpolationMode,
  pub time_offset_ms: i64,
  pub cg_override_ft: Option<f64>,
  pub pitch_on_ground_deg: Option<f64>,
}

impl Default for InterpolationSetup {
  fn default() -> Self {
    Self {
      mode: InterpolationMode::Linear,
      time_offset_ms: DEFAULT_TIME_OFFSET_MS,
      cg_override_ft: None,
      pitch_on_ground_deg: None,
    }
  }
}

/// Outcome flags alongside an interpolation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterpolationStatus {
  pub interpolated: bool,
  pub same_situation: bool,
  pub situations_count: usize,
  pub valid_situation: bool,
}

impl InterpolationStatus {
  pub fn is_interpolated(&self) -> bool {
    self.interpolated
  }

  pub fn has_valid_situation(&self) -> bool {
    self.valid_situation
  }
}

/// What the render loop consumes, once per callsign per frame.
#[derive(Debug, Clone, Default)]
pub struct InterpolationResult {
  pub situation: Option<AircraftSituation>,
  pub parts: Option<AircraftParts>,
  pub status: InterpolationStatus,
}

/// The interpolator family as a tagged variant, one capability: evaluate at
/// a target time.
#[derive(Debug, Clone)]
pub enum Interpolant {
  Linear(LinearInterpolant),
  Spline(SplineInterpolant),
}

impl Interpolant {
  /// Interpolated situation plus the same-situation marker.
  pub fn at(&self, target_ms: i64) -> (AircraftSituation, bool) {
    match self {
      Interpolant::Linear(li) => li.interpolate(target_ms),
      Interpolant::Spline(si) => si.interpolate(target_ms),
    }
  }
}

/// Select the bracketing pair around `target_ms` from a newest-first window
/// and wrap it in the requested interpolant. `None` below two situations.
/// The spline needs three, below that it degrades to linear.
pub fn produce_interpolant(
  window: &[AircraftSituation],
  mode: InterpolationMode,
  target_ms: i64,
) -> Option<Interpolant> {
  if window.len() < 2 {
    return None;
  }

  // first entry older than the target; everything before it is at or past it
  let first_older = window
    .iter()
    .position(|s| s.adjusted_timestamp_ms() < target_ms);
  let (end_idx, start_idx) = match first_older {
    // target older than the whole window, hold at the oldest pair
    None => (window.len() - 2, window.len() - 1),
    // target newer than the whole window, extrapolate off the newest pair
    Some(0) => (0, 1),
    Some(i) => (i - 1, i),
  };

  let start = window[start_idx].clone();
  let end = window[end_idx].clone();

  match mode {
    InterpolationMode::Spline if window.len() >= 3 => {
      let prev = window.get(start_idx + 1).cloned();
      let next = if end_idx > 0 {
        window.get(end_idx - 1).cloned()
      } else {
        None
      };
      Some(Interpolant::Spline(SplineInterpolant::new(
        prev, start, end, next,
      )))
    }
    _ => Some(Interpolant::Linear(LinearInterpolant::new(start, end))),
  }
}

/// Parts are not interpolated, the most recent record at or before the
/// target is carried forward unchanged; before any record, the oldest one.
pub fn extrapolated_parts(parts_newest_first: &[AircraftParts], target_ms: i64) -> Option<AircraftParts> {
  parts_newest_first
    .iter()
    .find(|p| p.adjusted_timestamp_ms() <= target_ms)
    .or_else(|| parts_newest_first.last())
    .cloned()
}
