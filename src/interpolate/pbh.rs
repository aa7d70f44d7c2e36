//! Attitude interpolation. Headings wrap at 0/360 and banks at ±180, a
//! naive lerp would spin the aircraft the long way round.

use serde::Serialize;

/// Normalize into [0, 360).
pub fn normalize_heading_deg(deg: f64) -> f64 {
  deg.rem_euclid(360.0)
}

/// Normalize into [-180, 180).
pub fn normalize_centered_deg(deg: f64) -> f64 {
  (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Signed shortest rotation from `from` to `to`, in [-180, 180).
pub fn shortest_delta_deg(from: f64, to: f64) -> f64 {
  normalize_centered_deg(to - from)
}

/// Shortest-path heading interpolation, result in [0, 360).
pub fn interpolate_heading_deg(from: f64, to: f64, fraction: f64) -> f64 {
  normalize_heading_deg(from + shortest_delta_deg(from, to) * fraction)
}

/// Shortest-path interpolation for centered angles (bank), in [-180, 180).
pub fn interpolate_centered_deg(from: f64, to: f64, fraction: f64) -> f64 {
  normalize_centered_deg(from + shortest_delta_deg(from, to) * fraction)
}

/// Pitch, bank, heading as one interpolatable block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pbh {
  pub pitch_deg: f64,
  pub bank_deg: f64,
  pub heading_deg: f64,
}

impl Pbh {
  pub fn new(pitch_deg: f64, bank_deg: f64, heading_deg: f64) -> Self {
    Self {
      pitch_deg: normalize_centered_deg(pitch_deg),
      bank_deg: normalize_centered_deg(bank_deg),
      heading_deg: normalize_heading_deg(heading_deg),
    }
  }

  pub fn interpolate(&self, other: &Pbh, fraction: f64) -> Pbh {
    let f = fraction.clamp(0.0, 1.0);
    Pbh {
      // pitch never comes near the wrap point, plain lerp is fine, but
      // going through the angular helpers keeps the result normalized
      pitch_deg: interpolate_centered_deg(self.pitch_deg, other.pitch_deg, f),
      bank_deg: interpolate_centered_deg(self.bank_deg, other.bank_deg, f),
      heading_deg: interpolate_heading_deg(self.heading_deg, other.heading_deg, f),
    }
  }
}

#[cfg(test)]
pub mod tests {
  use super::*;

  #[test]
  fn test_heading_wraparound() {
    // 350 -> 10 at half way is due north, not south
    let h = interpolate_heading_deg(350.0, 10.0, 0.5);
    assert!(h.abs() < 1e-9 || (h - 360.0).abs() < 1e-9, "got {h}");
  }

  #[test]
  fn test_heading_no_wrap() {
    let h = interpolate_heading_deg(90.0, 100.0, 0.5);
    assert!((h - 95.0).abs() < 1e-9, "got {h}");
  }

  #[test]
  fn test_heading_endpoints() {
    assert!((interpolate_heading_deg(350.0, 10.0, 0.0) - 350.0).abs() < 1e-9);
    assert!((interpolate_heading_deg(350.0, 10.0, 1.0) - 10.0).abs() < 1e-9);
  }

  #[test]
  fn test_bank_wraparound() {
    let b = interpolate_centered_deg(-170.0, 170.0, 0.5);
    assert!((b - (-180.0)).abs() < 1e-9 || (b - 180.0).abs() < 1e-9, "got {b}");
  }

  #[test]
  fn test_shortest_delta() {
    assert!((shortest_delta_deg(350.0, 10.0) - 20.0).abs() < 1e-9);
    assert!((shortest_delta_deg(10.0, 350.0) + 20.0).abs() < 1e-9);
    assert!((shortest_delta_deg(0.0, 180.0).abs() - 180.0).abs() < 1e-9);
  }

  #[test]
  fn test_pbh_interpolate() {
    let a = Pbh::new(0.0, -5.0, 355.0);
    let b = Pbh::new(4.0, 5.0, 5.0);
    let m = a.interpolate(&b, 0.5);
    assert!((m.pitch_deg - 2.0).abs() < 1e-9);
    assert!(m.bank_deg.abs() < 1e-9);
    assert!(m.heading_deg.abs() < 1e-9 || (m.heading_deg - 360.0).abs() < 1e-9);
  }

  #[test]
  fn test_normalization() {
    assert!((normalize_heading_deg(-10.0) - 350.0).abs() < 1e-9);
    assert!((normalize_heading_deg(370.0) - 10.0).abs() < 1e-9);
    assert!((normalize_centered_deg(190.0) - (-170.0)).abs() < 1e-9);
  }
}
