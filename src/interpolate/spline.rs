use crate::{
  aircraft::{situation::AircraftSituation, Timestamped},
  interpolate::{
    linear::interpolate_pair,
    pbh::shortest_delta_deg,
  },
  types::Point,
};

/// Cubic Hermite interpolant over the bracketing pair with Catmull-Rom
/// tangents taken from the neighboring situations when available. Attitude,
/// ground factor and the other channels still come from the pairwise lerp,
/// the spline only bends the path through space.
#[derive(Debug, Clone)]
pub struct SplineInterpolant {
  pub prev: Option<AircraftSituation>,
  pub start: AircraftSituation,
  pub end: AircraftSituation,
  pub next: Option<AircraftSituation>,
}

impl SplineInterpolant {
  pub fn new(
    prev: Option<AircraftSituation>,
    start: AircraftSituation,
    end: AircraftSituation,
    next: Option<AircraftSituation>,
  ) -> Self {
    Self {
      prev,
      start,
      end,
      next,
    }
  }

  pub fn interpolate(&self, target_ms: i64) -> (AircraftSituation, bool) {
    let t1 = self.start.adjusted_timestamp_ms();
    let t2 = self.end.adjusted_timestamp_ms();
    if t2 <= t1 {
      return (self.end.clone(), true);
    }
    let s = ((target_ms - t1) as f64 / (t2 - t1) as f64).clamp(0.0, 1.0);

    let mut result = interpolate_pair(&self.start, &self.end, s, target_ms);

    // unwrap longitudes into one continuous axis around the bracket
    let lng1 = self.start.position.lng;
    let lng2 = lng1 + shortest_delta_deg(lng1, self.end.position.lng);
    let lng0 = self
      .prev
      .as_ref()
      .map(|p| lng1 - shortest_delta_deg(p.position.lng, lng1));
    let lng3 = self
      .next
      .as_ref()
      .map(|n| lng2 + shortest_delta_deg(self.end.position.lng, n.position.lng));

    let lat = self.channel(
      s,
      self.prev.as_ref().map(|p| p.position.lat),
      self.start.position.lat,
      self.end.position.lat,
      self.next.as_ref().map(|n| n.position.lat),
    );
    let lng = self.channel(s, lng0, lng1, lng2, lng3);
    let alt = self.channel(
      s,
      self.prev.as_ref().map(|p| p.altitude_ft),
      self.start.altitude_ft,
      self.end.altitude_ft,
      self.next.as_ref().map(|n| n.altitude_ft),
    );

    result.position = Point::new(lat, lng).clamp();
    result.altitude_ft = alt;
    (result, false)
  }

  /// Hermite evaluation of one scalar channel at fraction `s` of the
  /// bracket. Missing neighbors degrade the tangent to the chord, which
  /// makes the curve linear at the history edges.
  fn channel(&self, s: f64, p0: Option<f64>, p1: f64, p2: f64, p3: Option<f64>) -> f64 {
    let t0 = self.prev.as_ref().map(|p| p.adjusted_timestamp_ms());
    let t1 = self.start.adjusted_timestamp_ms();
    let t2 = self.end.adjusted_timestamp_ms();
    let t3 = self.next.as_ref().map(|n| n.adjusted_timestamp_ms());
    let h = (t2 - t1) as f64;

    let chord = (p2 - p1) / h;
    let m1 = match (p0, t0) {
      (Some(p0), Some(t0)) if t2 > t0 => (p2 - p0) / (t2 - t0) as f64,
      _ => chord,
    };
    let m2 = match (p3, t3) {
      (Some(p3), Some(t3)) if t3 > t1 => (p3 - p1) / (t3 - t1) as f64,
      _ => chord,
    };

    let s2 = s * s;
    let s3 = s2 * s;
    (2.0 * s3 - 3.0 * s2 + 1.0) * p1
      + (s3 - 2.0 * s2 + s) * h * m1
      + (-2.0 * s3 + 3.0 * s2) * p2
      + (s3 - s2) * h * m2
  }
}
