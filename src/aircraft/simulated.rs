use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashSet;

use super::{parts::AircraftParts, situation::AircraftSituation};
use crate::types::Callsign;

lazy_static! {
  // ICAO designators of rotor and tilt-rotor craft, a small subset that
  // covers what actually shows up on the network
  static ref VTOL_DESIGNATORS: HashSet<&'static str> = HashSet::from([
    "A109", "A139", "A149", "A169", "A189", "AS32", "AS50", "AS55", "AS65", "B06", "B105",
    "B212", "B412", "B429", "B47G", "B505", "EC20", "EC30", "EC35", "EC45", "EC55", "EC75",
    "EH10", "H47", "H53", "H53S", "H60", "H64", "LYNX", "MD52", "MD60", "MI8", "MI17", "MI24",
    "NH90", "R22", "R44", "R66", "S61", "S76", "S92", "V22",
  ]);
}

/// Simulator model rendered for an aircraft, plus the CG offset used to
/// correct altitude-to-ground comparisons.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftModel {
  pub model_string: String,
  pub description: String,
  /// ICAO type designator if known, e.g. "A320" or "EC35"
  pub designator: Option<String>,
  pub cg_ft: f64,
  vtol: Option<bool>,
}

impl AircraftModel {
  pub fn new(model_string: &str, cg_ft: f64) -> Self {
    Self {
      model_string: model_string.into(),
      description: String::new(),
      designator: None,
      cg_ft,
      vtol: None,
    }
  }

  pub fn unknown() -> Self {
    Self::new("", 0.0)
  }

  pub fn has_model_string(&self) -> bool {
    !self.model_string.is_empty()
  }

  pub fn set_vtol(&mut self, vtol: bool) {
    self.vtol = Some(vtol);
  }

  /// Explicit flag wins, otherwise the designator decides.
  pub fn is_vtol(&self) -> bool {
    if let Some(vtol) = self.vtol {
      return vtol;
    }
    self
      .designator
      .as_ref()
      .map(|d| VTOL_DESIGNATORS.contains(d.to_uppercase().as_str()))
      .unwrap_or(false)
  }
}

/// COM radios and transponder, carried along for completeness but not
/// interpreted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComState {
  pub com1_khz: u32,
  pub com2_khz: u32,
  pub transponder_code: u16,
  pub transponder_mode_c: bool,
}

impl Default for ComState {
  fn default() -> Self {
    Self {
      com1_khz: 122_800,
      com2_khz: 121_500,
      transponder_code: 2000,
      transponder_mode_c: false,
    }
  }
}

/// Per-callsign aggregate owned by the provider: latest truth plus the
/// rendering flags the simulator and UI toggle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedAircraft {
  pub callsign: Callsign,
  pub pilot_name: String,
  pub situation: AircraftSituation,
  pub parts: AircraftParts,
  pub com: ComState,
  pub model: AircraftModel,
  /// model the network reported, kept separately to expose mismatches
  pub network_model: Option<AircraftModel>,
  pub enabled: bool,
  pub rendered: bool,
  pub parts_synchronized: bool,
  pub fast_position_updates: bool,
  pub supports_ground_flag: bool,
}

impl SimulatedAircraft {
  pub fn new(situation: AircraftSituation) -> Self {
    Self {
      callsign: situation.callsign.clone(),
      pilot_name: String::new(),
      situation,
      parts: AircraftParts::null(),
      com: ComState::default(),
      model: AircraftModel::unknown(),
      network_model: None,
      enabled: true,
      rendered: false,
      parts_synchronized: false,
      fast_position_updates: false,
      supports_ground_flag: false,
    }
  }

  pub fn cg_ft(&self) -> f64 {
    self.model.cg_ft
  }

  pub fn is_vtol(&self) -> bool {
    self.model.is_vtol()
  }

  pub fn has_model_mismatch(&self) -> bool {
    match &self.network_model {
      Some(nm) => nm.has_model_string() && nm.model_string != self.model.model_string,
      None => false,
    }
  }

  /// "DLH123: rendered as BOEING738 instead of A320" style diagnostics.
  pub fn model_mismatch_message(&self) -> Option<String> {
    if !self.has_model_mismatch() {
      return None;
    }
    let nm = self.network_model.as_ref()?;
    Some(format!(
      "{}: rendered as {} instead of {}",
      self.callsign, self.model.model_string, nm.model_string
    ))
  }
}
