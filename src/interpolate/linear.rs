use crate::{
  aircraft::{situation::AircraftSituation, Timestamped},
  interpolate::pbh::{interpolate_centered_deg, Pbh},
  types::Point,
};

/// Bracketing pair around the target time, `start` older, `end` newer.
#[derive(Debug, Clone)]
pub struct LinearInterpolant {
  pub start: AircraftSituation,
  pub end: AircraftSituation,
}

impl LinearInterpolant {
  pub fn new(start: AircraftSituation, end: AircraftSituation) -> Self {
    Self { start, end }
  }

  /// Time fraction in [0,1] for the target, clamped when the target lies
  /// outside the bracket (extrapolation holds the nearer endpoint).
  /// `None` when start and end coincide in time.
  pub fn fraction(&self, target_ms: i64) -> Option<f64> {
    let t0 = self.start.adjusted_timestamp_ms();
    let t1 = self.end.adjusted_timestamp_ms();
    if t1 <= t0 {
      return None;
    }
    let f = (target_ms - t0) as f64 / (t1 - t0) as f64;
    Some(f.clamp(0.0, 1.0))
  }

  /// Interpolated situation at the target time. The bool is the
  /// same-situation marker set when the bracket is degenerate.
  pub fn interpolate(&self, target_ms: i64) -> (AircraftSituation, bool) {
    let fraction = match self.fraction(target_ms) {
      Some(f) => f,
      None => return (self.end.clone(), true),
    };
    (interpolate_pair(&self.start, &self.end, fraction, target_ms), false)
  }
}

/// Plain lerp between two situations at `fraction`, shared by the linear and
/// the spline variant (the latter replaces only the path through space).
pub fn interpolate_pair(
  start: &AircraftSituation,
  end: &AircraftSituation,
  fraction: f64,
  target_ms: i64,
) -> AircraftSituation {
  let f = fraction.clamp(0.0, 1.0);
  let lerp = |a: f64, b: f64| a + (b - a) * f;

  let mut result = end.clone();
  result.timestamp_ms = target_ms;
  result.time_offset_ms = 0;

  result.position = Point::new(
    lerp(start.position.lat, end.position.lat),
    // longitudes may straddle the date line, go the short way
    interpolate_centered_deg(start.position.lng, end.position.lng, f),
  )
  .clamp();
  result.altitude_ft = lerp(start.altitude_ft, end.altitude_ft);
  result.pressure_altitude_ft = match (start.pressure_altitude_ft, end.pressure_altitude_ft) {
    (Some(a), Some(b)) => Some(lerp(a, b)),
    _ => end.pressure_altitude_ft,
  };
  result.ground_speed_kt = lerp(start.ground_speed_kt, end.ground_speed_kt);

  let pbh = Pbh::new(start.pitch_deg, start.bank_deg, start.heading_deg).interpolate(
    &Pbh::new(end.pitch_deg, end.bank_deg, end.heading_deg),
    f,
  );
  result.pitch_deg = pbh.pitch_deg;
  result.bank_deg = pbh.bank_deg;
  result.heading_deg = pbh.heading_deg;

  result.velocity = match (start.velocity, end.velocity) {
    (Some(a), Some(b)) => Some(a.lerp(&b, f)),
    _ => end.velocity,
  };

  result.ground_elevation_ft = match (start.ground_elevation_ft, end.ground_elevation_ft) {
    (Some(a), Some(b)) => Some(lerp(a, b)),
    _ => end.ground_elevation_ft,
  };

  // the factor stays continuous here, consumers threshold it themselves
  let factor = lerp(ground_factor_of(start), ground_factor_of(end));
  result.on_ground = crate::aircraft::situation::OnGroundInfo::from_ground_factor(factor);

  result
}

/// Continuous ground factor of a stored situation: its own factor when
/// present, otherwise the discrete state collapsed to 0 or 1.
pub fn ground_factor_of(situation: &AircraftSituation) -> f64 {
  if situation.on_ground.has_factor() {
    situation.on_ground.factor
  } else if situation.is_on_ground() {
    1.0
  } else {
    0.0
  }
}

#[cfg(test)]
pub mod tests {
  use super::*;
  use crate::{
    aircraft::situation::OnGroundInfo,
    types::Callsign,
  };

  fn situation(t: i64, lat: f64, lng: f64, alt: f64) -> AircraftSituation {
    AircraftSituation::new(Callsign::new("DLH123"), Point::new(lat, lng), alt, t)
  }

  #[test]
  fn test_altitude_midpoint_and_endpoints() {
    let s1 = situation(1000, 50.0, 8.0, 1000.0);
    let s2 = situation(2000, 51.0, 9.0, 2000.0);
    let li = LinearInterpolant::new(s1, s2);

    let (mid, same) = li.interpolate(1500);
    assert!(!same);
    assert!((mid.altitude_ft - 1500.0).abs() < 1e-9);
    assert!((mid.position.lat - 50.5).abs() < 1e-9);
    assert!((mid.position.lng - 8.5).abs() < 1e-9);

    let (at_start, _) = li.interpolate(1000);
    assert!((at_start.altitude_ft - 1000.0).abs() < 1e-9);
    let (at_end, _) = li.interpolate(2000);
    assert!((at_end.altitude_ft - 2000.0).abs() < 1e-9);
  }

  #[test]
  fn test_extrapolation_clamps() {
    let s1 = situation(1000, 50.0, 8.0, 1000.0);
    let s2 = situation(2000, 51.0, 9.0, 2000.0);
    let li = LinearInterpolant::new(s1, s2);
    let (before, _) = li.interpolate(500);
    assert!((before.altitude_ft - 1000.0).abs() < 1e-9);
    let (after, _) = li.interpolate(5000);
    assert!((after.altitude_ft - 2000.0).abs() < 1e-9);
  }

  #[test]
  fn test_degenerate_bracket_returns_end() {
    let s1 = situation(1000, 50.0, 8.0, 1000.0);
    let s2 = situation(1000, 51.0, 9.0, 2000.0);
    let li = LinearInterpolant::new(s1, s2);
    let (s, same) = li.interpolate(1000);
    assert!(same);
    assert!((s.altitude_ft - 2000.0).abs() < 1e-9);
  }

  #[test]
  fn test_ground_factor_monotonic() {
    let mut s1 = situation(1000, 50.0, 8.0, 364.0);
    s1.on_ground = OnGroundInfo::from_ground_factor(1.0);
    let mut s2 = situation(2000, 50.01, 8.0, 400.0);
    s2.on_ground = OnGroundInfo::from_ground_factor(0.0);
    let li = LinearInterpolant::new(s1, s2);

    let mut last = f64::INFINITY;
    for target in [1000, 1250, 1500, 1750, 2000] {
      let (s, _) = li.interpolate(target);
      assert!(s.on_ground.factor <= last, "factor not decreasing at {target}");
      last = s.on_ground.factor;
    }
  }

  #[test]
  fn test_heading_wrap_through_pair() {
    let mut s1 = situation(1000, 50.0, 8.0, 1000.0);
    s1.heading_deg = 350.0;
    let mut s2 = situation(2000, 50.0, 8.0, 1000.0);
    s2.heading_deg = 10.0;
    let li = LinearInterpolant::new(s1, s2);
    let (mid, _) = li.interpolate(1500);
    let h = mid.heading_deg;
    assert!(h.abs() < 1e-9 || (h - 360.0).abs() < 1e-9, "got {h}");
  }

  #[test]
  fn test_date_line_longitude() {
    let s1 = situation(1000, 0.0, 179.5, 1000.0);
    let s2 = situation(2000, 0.0, -179.5, 1000.0);
    let li = LinearInterpolant::new(s1, s2);
    let (mid, _) = li.interpolate(1500);
    // short way across the antimeridian, not back through Greenwich
    assert!(
      (mid.position.lng - 180.0).abs() < 1e-6 || (mid.position.lng + 180.0).abs() < 1e-6,
      "got {}",
      mid.position.lng
    );
  }
}
