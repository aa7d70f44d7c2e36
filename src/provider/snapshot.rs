use serde::Serialize;

use crate::{
  aircraft::simulated::SimulatedAircraft,
  types::{Callsign, Point},
  util::epoch_millis_now,
};

/// Point-in-time, read-only summary of the airspace around a reference
/// position, used to drive rendering prioritization. Plain values only,
/// nothing in here aliases provider state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirspaceAircraftSnapshot {
  pub timestamp_ms: i64,
  pub reference: Point,
  pub range_nm: f64,
  /// every known aircraft ascending by distance from the reference
  pub aircraft_by_distance: Vec<(Callsign, f64)>,
  /// enabled aircraft within range, closest first, truncated to the
  /// rendering budget
  pub enabled_in_range: Vec<Callsign>,
  pub disabled: Vec<Callsign>,
  pub vtol: Vec<Callsign>,
  pub total_count: usize,
}

impl AirspaceAircraftSnapshot {
  pub fn build(
    aircraft: &[SimulatedAircraft],
    reference: Point,
    range_nm: f64,
    max_aircraft: usize,
  ) -> Self {
    let mut by_distance: Vec<(&SimulatedAircraft, f64)> = aircraft
      .iter()
      .filter(|a| a.situation.has_valid_position())
      .map(|a| (a, reference.distance_nm(&a.situation.position)))
      .collect();
    by_distance.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let enabled_in_range = by_distance
      .iter()
      .filter(|(a, d)| a.enabled && *d <= range_nm)
      .take(max_aircraft)
      .map(|(a, _)| a.callsign.clone())
      .collect();

    Self {
      timestamp_ms: epoch_millis_now(),
      reference,
      range_nm,
      enabled_in_range,
      disabled: by_distance
        .iter()
        .filter(|(a, _)| !a.enabled)
        .map(|(a, _)| a.callsign.clone())
        .collect(),
      vtol: by_distance
        .iter()
        .filter(|(a, _)| a.is_vtol())
        .map(|(a, _)| a.callsign.clone())
        .collect(),
      aircraft_by_distance: by_distance
        .into_iter()
        .map(|(a, d)| (a.callsign.clone(), d))
        .collect(),
      total_count: aircraft.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.total_count == 0
  }
}
