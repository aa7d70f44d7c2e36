pub mod metrics;
pub mod snapshot;
pub mod spatial;
pub mod store;

use dashmap::{DashMap, DashSet};
use log::{trace, warn};
use rstar::RTree;
use std::{
  collections::{HashMap, VecDeque},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
  },
};
use tokio::sync::broadcast;

use self::{
  metrics::Metrics,
  snapshot::AirspaceAircraftSnapshot,
  spatial::PointObject,
  store::{CallsignKeyedStore, DEFAULT_CAP, PARTS_MAX_AGE_MS},
};
use crate::{
  aircraft::{
    change::AircraftSituationChange,
    parts::{AircraftParts, PartsDetails},
    simulated::{AircraftModel, SimulatedAircraft},
    situation::AircraftSituation,
  },
  ground::{can_upgrade, on_ground_by_elevation, resolve_on_ground, ElevationPlane, ElevationProvider},
  interpolate::{
    extrapolated_parts, produce_interpolant, InterpolationResult, InterpolationSetup,
  },
  labels,
  types::{Callsign, Point},
};
use crate::aircraft::situation::{ElevationInfo, OnGroundDetails};

/// Short diagnostic history of computed changes per callsign.
const CHANGES_CAP: usize = 8;
/// Reverse-lookup trace messages kept per callsign.
const MESSAGES_CAP: usize = 32;
const EVENT_CHANNEL_CAP: usize = 256;

/// Change notification fanned out to subscribers. Delivery is queued, a slow
/// consumer never blocks the producer thread.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
  AddedSituation(AircraftSituation),
  AddedParts(Callsign),
  RemovedAircraft(Callsign),
  AircraftEnabledChanged(Callsign, bool),
  SnapshotReady(AirspaceAircraftSnapshot),
}

/// Single source of truth for every remote aircraft: per-callsign histories,
/// derived changes, the spatial index and the interpolation facade. All
/// methods are synchronous and callable from any thread; no lock is held
/// while an event is sent.
pub struct RemoteAircraftProvider {
  aircraft: DashMap<Callsign, SimulatedAircraft>,
  situations: CallsignKeyedStore<AircraftSituation>,
  parts: CallsignKeyedStore<AircraftParts>,
  changes: CallsignKeyedStore<AircraftSituationChange>,
  parts_supporting: DashSet<Callsign>,

  aircraft2d: RwLock<RTree<PointObject>>,
  aircraft_po: DashMap<Callsign, PointObject>,

  setups: DashMap<Callsign, InterpolationSetup>,
  default_setup: RwLock<InterpolationSetup>,

  // test-only side channel, off unless explicitly enabled
  test_altitude_offset_ft: RwLock<Option<f64>>,
  test_altitude_offsets: DashMap<Callsign, f64>,

  messages_enabled: AtomicBool,
  messages: DashMap<Callsign, VecDeque<String>>,

  latest_snapshot: RwLock<Option<AirspaceAircraftSnapshot>>,
  metrics: RwLock<Metrics>,
  events: broadcast::Sender<ProviderEvent>,
  elevation: Arc<dyn ElevationProvider>,
}

impl RemoteAircraftProvider {
  pub fn new(elevation: Arc<dyn ElevationProvider>, default_setup: InterpolationSetup) -> Self {
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAP);
    Self {
      aircraft: DashMap::new(),
      situations: CallsignKeyedStore::new(DEFAULT_CAP, None),
      parts: CallsignKeyedStore::new(DEFAULT_CAP, Some(PARTS_MAX_AGE_MS)),
      changes: CallsignKeyedStore::new(CHANGES_CAP, None),
      parts_supporting: DashSet::new(),
      aircraft2d: RwLock::new(RTree::new()),
      aircraft_po: DashMap::new(),
      setups: DashMap::new(),
      default_setup: RwLock::new(default_setup),
      test_altitude_offset_ft: RwLock::new(None),
      test_altitude_offsets: DashMap::new(),
      messages_enabled: AtomicBool::new(false),
      messages: DashMap::new(),
      latest_snapshot: RwLock::new(None),
      metrics: RwLock::new(Metrics::new()),
      events,
      elevation,
    }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
    self.events.subscribe()
  }

  // region:ingest

  /// Ingest one network situation. Validates, applies the optional debug
  /// altitude offset, recomputes the change window, resolves the ground
  /// state and stores everything. Returns false for rejected input.
  pub fn store_aircraft_situation(&self, situation: AircraftSituation) -> bool {
    let mut situation = situation;
    let callsign = situation.callsign.clone();
    if callsign.is_empty() || !callsign.is_valid() {
      warn!("dropping situation with invalid callsign {callsign:?}");
      return false;
    }
    if !situation.has_valid_position() {
      warn!("dropping situation with invalid position for {callsign}");
      return false;
    }

    if let Some(offset) = self.test_altitude_offset_for(&callsign) {
      situation.altitude_ft += offset;
    }

    let (model_cg_ft, vtol) = self
      .aircraft
      .get(&callsign)
      .map(|a| (a.cg_ft(), a.is_vtol()))
      .unwrap_or((0.0, false));
    // a configured CG override beats the model CG for all ground math
    let cg_ft = self
      .interpolation_setup(&callsign)
      .cg_override_ft
      .unwrap_or(model_cg_ft);

    // provisional window with the fresh situation at its sorted slot
    let mut window = self.situations.all(&callsign);
    let pos = window
      .iter()
      .position(|s| s.timestamp_ms <= situation.timestamp_ms)
      .unwrap_or(window.len());
    window.insert(pos, situation.clone());
    let change = AircraftSituationChange::compute(&window, cg_ft, vtol);

    if !situation.on_ground.details.is_authoritative() {
      resolve_on_ground(&mut situation, &change, cg_ft, self.elevation.as_ref());
      self.add_reverse_lookup_message(
        &callsign,
        format!(
          "ground resolved by {}: on ground {}",
          situation.on_ground.details,
          situation.is_on_ground()
        ),
      );
    }

    self.situations.insert(&callsign, situation.clone(), false);
    self.changes.insert(&callsign, change, false);

    // first sighting is decided inside the entry shard lock, a racing
    // second producer must not count the aircraft twice
    let mut added = false;
    {
      let mut entry = self.aircraft.entry(callsign.clone()).or_insert_with(|| {
        added = true;
        SimulatedAircraft::new(situation.clone())
      });
      entry.situation = situation.clone();
    }
    self.update_spatial(&callsign);

    {
      let mut metrics = self.metrics.write().unwrap();
      metrics.situations_stored += 1;
      if added {
        metrics.aircraft_added += 1;
      }
    }

    let _ = self.events.send(ProviderEvent::AddedSituation(situation));
    true
  }

  /// Ingest one parts record. Real (non-guessed) parts mark the callsign as
  /// parts-supporting for good.
  pub fn store_aircraft_parts(&self, callsign: &Callsign, parts: AircraftParts) -> bool {
    if callsign.is_empty() || !callsign.is_valid() {
      warn!("dropping parts with invalid callsign {callsign:?}");
      return false;
    }

    self.parts.insert(callsign, parts.clone(), true);
    let fsd = parts.details == PartsDetails::FsdParts;
    if fsd {
      self.parts_supporting.insert(callsign.clone());
    }

    if let Some(mut aircraft) = self.aircraft.get_mut(callsign) {
      aircraft.parts = parts;
      aircraft.parts_synchronized = fsd;
      aircraft.supports_ground_flag = aircraft.supports_ground_flag || fsd;
    }

    self.metrics.write().unwrap().parts_stored += 1;
    let _ = self.events.send(ProviderEvent::AddedParts(callsign.clone()));
    true
  }

  /// Rebuild the spatial entry for one callsign from its current situation.
  /// Map and tree are swapped under one tree write lock; concurrent updates
  /// of the same callsign serialize there and cannot orphan tree objects.
  fn update_spatial(&self, callsign: &Callsign) {
    let po = match self.aircraft.get(callsign) {
      Some(aircraft) => PointObject::from(&*aircraft),
      None => return,
    };
    let mut tree = self.aircraft2d.write().unwrap();
    if let Some(old) = self.aircraft_po.insert(callsign.clone(), po.clone()) {
      tree.remove(&old);
    }
    tree.insert(po);
  }

  // endregion:ingest

  // region:mutation

  /// Targeted in-place mutation, true when something actually changed.
  fn update_aircraft(
    &self,
    callsign: &Callsign,
    f: impl FnOnce(&mut SimulatedAircraft) -> bool,
  ) -> bool {
    if callsign.is_empty() {
      return false;
    }
    match self.aircraft.get_mut(callsign) {
      Some(mut aircraft) => f(&mut aircraft),
      None => false,
    }
  }

  pub fn update_aircraft_enabled(&self, callsign: &Callsign, enabled: bool) -> bool {
    let changed = self.update_aircraft(callsign, |a| {
      if a.enabled == enabled {
        return false;
      }
      a.enabled = enabled;
      true
    });
    if changed {
      let _ = self
        .events
        .send(ProviderEvent::AircraftEnabledChanged(callsign.clone(), enabled));
    }
    changed
  }

  pub fn update_aircraft_rendered(&self, callsign: &Callsign, rendered: bool) -> bool {
    self.update_aircraft(callsign, |a| {
      if a.rendered == rendered {
        return false;
      }
      a.rendered = rendered;
      true
    })
  }

  pub fn update_cg(&self, callsign: &Callsign, cg_ft: f64) -> bool {
    self.update_aircraft(callsign, |a| {
      if (a.model.cg_ft - cg_ft).abs() < f64::EPSILON {
        return false;
      }
      a.model.cg_ft = cg_ft;
      true
    })
  }

  pub fn update_cg_and_model_string(
    &self,
    callsign: &Callsign,
    cg_ft: f64,
    model_string: &str,
  ) -> bool {
    self.update_aircraft(callsign, |a| {
      let same = (a.model.cg_ft - cg_ft).abs() < f64::EPSILON && a.model.model_string == model_string;
      if same {
        return false;
      }
      a.model.cg_ft = cg_ft;
      a.model.model_string = model_string.into();
      true
    })
  }

  pub fn update_aircraft_model(&self, callsign: &Callsign, model: AircraftModel) -> bool {
    self.update_aircraft(callsign, |a| {
      if a.model == model {
        return false;
      }
      a.model = model;
      true
    })
  }

  pub fn update_aircraft_network_model(&self, callsign: &Callsign, model: AircraftModel) -> bool {
    self.update_aircraft(callsign, |a| {
      if a.network_model.as_ref() == Some(&model) {
        return false;
      }
      a.network_model = Some(model);
      true
    })
  }

  pub fn update_fast_position_updates(&self, callsign: &Callsign, fast: bool) -> bool {
    self.update_aircraft(callsign, |a| {
      if a.fast_position_updates == fast {
        return false;
      }
      a.fast_position_updates = fast;
      true
    })
  }

  /// Remove a callsign from every per-callsign structure. True if the
  /// aircraft was known.
  pub fn remove_aircraft(&self, callsign: &Callsign) -> bool {
    let known = self.aircraft.remove(callsign).is_some();
    self.situations.remove_callsign(callsign);
    self.parts.remove_callsign(callsign);
    self.changes.remove_callsign(callsign);
    self.parts_supporting.remove(callsign);
    self.setups.remove(callsign);
    self.test_altitude_offsets.remove(callsign);
    self.messages.remove(callsign);
    {
      let mut tree = self.aircraft2d.write().unwrap();
      if let Some((_, po)) = self.aircraft_po.remove(callsign) {
        tree.remove(&po);
      }
    }
    if known {
      self.metrics.write().unwrap().aircraft_removed += 1;
      let _ = self.events.send(ProviderEvent::RemovedAircraft(callsign.clone()));
    }
    known
  }

  pub fn remove_all_aircraft(&self) -> usize {
    let callsigns = self.aircraft_callsigns();
    let mut removed = 0;
    for cs in callsigns {
      if self.remove_aircraft(&cs) {
        removed += 1;
      }
    }
    removed
  }

  // endregion:mutation

  // region:queries

  pub fn aircraft_in_range(&self) -> Vec<SimulatedAircraft> {
    self.aircraft.iter().map(|e| e.value().clone()).collect()
  }

  pub fn aircraft_in_range_count(&self) -> usize {
    self.aircraft.len()
  }

  pub fn aircraft_callsigns(&self) -> Vec<Callsign> {
    self.aircraft.iter().map(|e| e.key().clone()).collect()
  }

  pub fn aircraft_for_callsign(&self, callsign: &Callsign) -> Option<SimulatedAircraft> {
    self.aircraft.get(callsign).map(|a| a.clone())
  }

  pub fn situations_for(&self, callsign: &Callsign) -> Vec<AircraftSituation> {
    self.situations.all(callsign)
  }

  pub fn situations_count(&self, callsign: &Callsign) -> usize {
    self.situations.count(callsign)
  }

  /// Situation at `index` (0 = latest), the null sentinel on any miss.
  pub fn situation_at(&self, callsign: &Callsign, index: usize) -> AircraftSituation {
    self
      .situations
      .at(callsign, index)
      .unwrap_or_else(AircraftSituation::null)
  }

  pub fn latest_situation(&self, callsign: &Callsign) -> Option<AircraftSituation> {
    self.situations.latest(callsign)
  }

  pub fn parts_for(&self, callsign: &Callsign) -> Vec<AircraftParts> {
    self.parts.all(callsign)
  }

  pub fn latest_change(&self, callsign: &Callsign) -> AircraftSituationChange {
    self
      .changes
      .latest(callsign)
      .unwrap_or_else(|| AircraftSituationChange::null(callsign.clone()))
  }

  pub fn is_supporting_parts(&self, callsign: &Callsign) -> bool {
    self.parts_supporting.contains(callsign)
  }

  pub fn parts_supporting_callsigns(&self) -> Vec<Callsign> {
    self.parts_supporting.iter().map(|e| e.key().clone()).collect()
  }

  // endregion:queries

  // region:elevation

  /// Average ground elevation of parked aircraft around `reference`, a
  /// proxy for the field elevation. Needs at least `min_values`
  /// contributors, stops scanning after `sufficient_values`.
  pub fn average_elevation_of_non_moving_aircraft(
    &self,
    reference: Point,
    range_nm: f64,
    min_values: usize,
    sufficient_values: usize,
  ) -> Option<ElevationPlane> {
    let mut elevations: Vec<f64> = vec![];
    let rect = reference.range_rect(range_nm);
    {
      let tree = self.aircraft2d.read().unwrap();
      'scan: for env in rect.envelopes() {
        for po in tree.locate_in_envelope(&env) {
          if po.point.distance_nm(&reference) > range_nm {
            continue;
          }
          let change = self.latest_change(&po.id);
          if change.is_null() {
            continue;
          }
          let moving = change
            .ground_speed
            .map(|gs| gs.mean > 2.5 || gs.stddev > 2.0)
            .unwrap_or(true);
          if moving {
            continue;
          }
          if let Some(elv) = self
            .situations
            .latest(&po.id)
            .and_then(|s| s.ground_elevation_ft)
          {
            elevations.push(elv);
            if elevations.len() >= sufficient_values {
              break 'scan;
            }
          }
        }
      }
    }

    if elevations.len() < min_values {
      return None;
    }
    let mean = elevations.iter().sum::<f64>() / elevations.len() as f64;
    Some(ElevationPlane::new(
      reference,
      mean,
      range_nm,
      ElevationInfo::Average,
    ))
  }

  /// Backfill an elevation plane into stored history. Fills missing ground
  /// elevations and upgrades weak classifications for every covered
  /// situation, mutating history in place. Returns how many entries
  /// changed; a non-zero count means already-rendered frames may disagree
  /// with the store, which consumers must tolerate.
  pub fn update_ground_elevation(&self, plane: &ElevationPlane) -> usize {
    let mut total = 0;
    for callsign in self.situations.callsigns() {
      let cg_ft = self.interpolation_setup(&callsign).cg_override_ft.unwrap_or_else(|| {
        self
          .aircraft
          .get(&callsign)
          .map(|a| a.cg_ft())
          .unwrap_or(0.0)
      });
      total += self.situations.modify(&callsign, |list| {
        let mut changed = 0;
        for s in list.iter_mut() {
          if !plane.covers(&s.position) {
            continue;
          }
          let mut touched = false;
          if s.ground_elevation_ft.is_none() {
            s.set_ground_elevation(plane.altitude_ft, plane.info);
            touched = true;
          }
          if can_upgrade(s.on_ground.details, OnGroundDetails::OnGroundByElevationAndCg) {
            if let Some(info) = on_ground_by_elevation(s, cg_ft) {
              if info != s.on_ground {
                s.on_ground = info;
                touched = true;
              }
            }
          }
          if touched {
            changed += 1;
          }
        }
        changed
      });
    }
    if total > 0 {
      self.metrics.write().unwrap().elevation_backfills += total as u64;
      trace!("elevation backfill touched {total} stored situations");
    }
    total
  }

  // endregion:elevation

  // region:interpolation

  pub fn set_interpolation_setup(&self, callsign: &Callsign, setup: InterpolationSetup) {
    self.setups.insert(callsign.clone(), setup);
  }

  pub fn set_default_interpolation_setup(&self, setup: InterpolationSetup) {
    *self.default_setup.write().unwrap() = setup;
  }

  pub fn interpolation_setup(&self, callsign: &Callsign) -> InterpolationSetup {
    self
      .setups
      .get(callsign)
      .map(|s| *s)
      .unwrap_or_else(|| *self.default_setup.read().unwrap())
  }

  /// Interpolated situation and parts for one callsign at the given render
  /// time. Below two stored situations the status reports not-interpolated
  /// and the latest known situation is handed out to hold position with.
  pub fn interpolate(&self, callsign: &Callsign, render_time_ms: i64) -> InterpolationResult {
    let setup = self.interpolation_setup(callsign);
    let target_ms = render_time_ms - setup.time_offset_ms;
    let window = self.situations.all(callsign);

    let mut result = InterpolationResult::default();
    result.status.situations_count = window.len();
    result.parts = extrapolated_parts(&self.parts.all(callsign), target_ms);

    match produce_interpolant(&window, setup.mode, target_ms) {
      None => {
        if let Some(last) = window.first() {
          result.status.valid_situation = last.has_valid_position();
          result.situation = Some(last.clone());
        }
        self
          .metrics
          .write()
          .unwrap()
          .interpolations
          .inc(labels!("result" = "miss"));
      }
      Some(interpolant) => {
        let (mut situation, same) = interpolant.at(target_ms);
        if situation.is_on_ground() {
          if let Some(pitch) = setup.pitch_on_ground_deg {
            situation.pitch_deg = pitch;
          }
        }
        result.status.interpolated = true;
        result.status.same_situation = same;
        result.status.valid_situation = situation.has_valid_position();
        result.situation = Some(situation);
        self
          .metrics
          .write()
          .unwrap()
          .interpolations
          .inc(labels!("result" = "hit"));
      }
    }
    result
  }

  // endregion:interpolation

  // region:snapshot

  pub fn compute_airspace_snapshot(
    &self,
    reference: Point,
    range_nm: f64,
    max_aircraft: usize,
  ) -> AirspaceAircraftSnapshot {
    let aircraft = self.aircraft_in_range();
    let snap = AirspaceAircraftSnapshot::build(&aircraft, reference, range_nm, max_aircraft);
    *self.latest_snapshot.write().unwrap() = Some(snap.clone());
    self.metrics.write().unwrap().snapshots_built += 1;
    let _ = self.events.send(ProviderEvent::SnapshotReady(snap.clone()));
    snap
  }

  pub fn latest_airspace_snapshot(&self) -> Option<AirspaceAircraftSnapshot> {
    self.latest_snapshot.read().unwrap().clone()
  }

  // endregion:snapshot

  // region:debug

  /// Debug altitude shift applied to every incoming situation, test-only.
  pub fn set_test_altitude_offset(&self, offset_ft: Option<f64>) {
    *self.test_altitude_offset_ft.write().unwrap() = offset_ft;
  }

  pub fn set_test_altitude_offset_for(&self, callsign: &Callsign, offset_ft: Option<f64>) {
    match offset_ft {
      Some(offset) => {
        self.test_altitude_offsets.insert(callsign.clone(), offset);
      }
      None => {
        self.test_altitude_offsets.remove(callsign);
      }
    }
  }

  fn test_altitude_offset_for(&self, callsign: &Callsign) -> Option<f64> {
    self
      .test_altitude_offsets
      .get(callsign)
      .map(|v| *v)
      .or(*self.test_altitude_offset_ft.read().unwrap())
  }

  pub fn enable_reverse_lookup_messages(&self, enabled: bool) {
    self.messages_enabled.store(enabled, Ordering::Relaxed);
  }

  pub fn reverse_lookup_messages_enabled(&self) -> bool {
    self.messages_enabled.load(Ordering::Relaxed)
  }

  /// Observability only, never consulted by control flow.
  pub fn add_reverse_lookup_message(&self, callsign: &Callsign, message: impl Into<String>) {
    if !self.reverse_lookup_messages_enabled() {
      return;
    }
    let mut ring = self.messages.entry(callsign.clone()).or_default();
    if ring.len() >= MESSAGES_CAP {
      ring.pop_front();
    }
    ring.push_back(message.into());
  }

  pub fn reverse_lookup_messages(&self, callsign: &Callsign) -> Vec<String> {
    self
      .messages
      .get(callsign)
      .map(|r| r.iter().cloned().collect())
      .unwrap_or_default()
  }

  pub fn render_metrics(&self) -> String {
    self.metrics.read().unwrap().render()
  }

  pub fn track_processing_time(&self, stage: &str, seconds: f32) {
    self
      .metrics
      .write()
      .unwrap()
      .processing_time_sec
      .set(labels!("stage" = stage), seconds);
  }

  // endregion:debug
}

#[cfg(test)]
pub mod tests {
  use super::*;
  use crate::{
    aircraft::situation::OnGroundInfo,
    ground::{FlatTerrain, NoTerrain},
  };
  use std::thread;

  fn provider(elevation_ft: Option<f64>) -> RemoteAircraftProvider {
    let elevation: Arc<dyn ElevationProvider> = match elevation_ft {
      Some(elevation_ft) => Arc::new(FlatTerrain { elevation_ft }),
      None => Arc::new(NoTerrain),
    };
    let mut setup = InterpolationSetup::default();
    setup.time_offset_ms = 0;
    RemoteAircraftProvider::new(elevation, setup)
  }

  fn situation(cs: &str, t: i64, alt: f64) -> AircraftSituation {
    AircraftSituation::new(Callsign::new(cs), Point::new(50.0, 8.0), alt, t)
  }

  #[test]
  fn test_store_and_order() {
    let p = provider(None);
    let cs = Callsign::new("DLH123");
    for t in [3000, 1000, 2000] {
      assert!(p.store_aircraft_situation(situation("DLH123", t, 1000.0)));
    }
    let all = p.situations_for(&cs);
    let times: Vec<i64> = all.iter().map(|s| s.timestamp_ms).collect();
    assert_eq!(times, vec![3000, 2000, 1000]);
    assert_eq!(p.aircraft_in_range_count(), 1);
  }

  #[test]
  fn test_rejects_invalid_input() {
    let p = provider(None);
    assert!(!p.store_aircraft_situation(situation("", 1000, 1000.0)));
    let mut s = situation("DLH123", 1000, 1000.0);
    s.position = Point::new(f64::NAN, 8.0);
    assert!(!p.store_aircraft_situation(s));
    assert_eq!(p.aircraft_in_range_count(), 0);
    assert!(!p.store_aircraft_parts(&Callsign::new(""), AircraftParts::new(true, 1000)));
  }

  #[test]
  fn test_provenance_precedence_survives_backfill() {
    let p = provider(None);
    let cs = Callsign::new("DLH123");
    let mut s = situation("DLH123", 1000, 5000.0);
    s.on_ground = OnGroundInfo::from_network(true);
    p.store_aircraft_situation(s);

    // airborne by elevation, but the network flag is authoritative
    let plane = ElevationPlane::new(Point::new(50.0, 8.0), 364.0, 10.0, ElevationInfo::Test);
    p.update_ground_elevation(&plane);

    let stored = p.latest_situation(&cs).unwrap();
    assert_eq!(stored.on_ground.details, OnGroundDetails::InFromNetwork);
    assert!(stored.is_on_ground());
  }

  #[test]
  fn test_elevation_backfill_upgrades_guesses() {
    let p = provider(None);
    let cs = Callsign::new("DLH123");
    p.store_aircraft_situation(situation("DLH123", 1000, 366.0));
    p.store_aircraft_situation(situation("DLH123", 2000, 366.0));
    assert!(p.latest_situation(&cs).unwrap().on_ground.is_unknown());

    let plane = ElevationPlane::new(Point::new(50.0, 8.0), 364.0, 10.0, ElevationInfo::SimProvider);
    let changed = p.update_ground_elevation(&plane);
    assert_eq!(changed, 2);

    let stored = p.latest_situation(&cs).unwrap();
    assert_eq!(stored.ground_elevation_ft, Some(364.0));
    assert_eq!(
      stored.on_ground.details,
      OnGroundDetails::OnGroundByElevationAndCg
    );
    assert!(stored.is_on_ground());

    // second run changes nothing further
    assert_eq!(p.update_ground_elevation(&plane), 0);
  }

  #[test]
  fn test_ground_resolution_on_ingest() {
    let p = provider(Some(364.0));
    p.store_aircraft_situation(situation("DLH123", 1000, 365.0));
    let stored = p.latest_situation(&Callsign::new("DLH123")).unwrap();
    assert_eq!(
      stored.on_ground.details,
      OnGroundDetails::OnGroundByElevationAndCg
    );
    assert!(stored.is_on_ground());
  }

  #[test]
  fn test_parts_supporting_set() {
    let p = provider(None);
    let cs = Callsign::new("DLH123");
    p.store_aircraft_situation(situation("DLH123", 1000, 1000.0));

    let mut guessed = AircraftParts::new(true, 1000);
    guessed.details = PartsDetails::GuessedParts;
    p.store_aircraft_parts(&cs, guessed);
    assert!(!p.is_supporting_parts(&cs));
    assert!(!p.aircraft_for_callsign(&cs).unwrap().parts_synchronized);

    let mut real = AircraftParts::new(true, 2000);
    real.details = PartsDetails::FsdParts;
    p.store_aircraft_parts(&cs, real);
    assert!(p.is_supporting_parts(&cs));
    let aircraft = p.aircraft_for_callsign(&cs).unwrap();
    assert!(aircraft.parts_synchronized);
    assert!(aircraft.supports_ground_flag);
  }

  #[test]
  fn test_update_flags_report_change() {
    let p = provider(None);
    let cs = Callsign::new("DLH123");
    p.store_aircraft_situation(situation("DLH123", 1000, 1000.0));

    assert!(p.update_aircraft_enabled(&cs, false));
    assert!(!p.update_aircraft_enabled(&cs, false));
    assert!(p.update_aircraft_rendered(&cs, true));
    assert!(p.update_cg(&cs, 12.0));
    assert!(!p.update_cg(&cs, 12.0));
    assert!(p.update_cg_and_model_string(&cs, 12.0, "BOEING738"));
    assert!(!p.update_cg_and_model_string(&cs, 12.0, "BOEING738"));
    // unknown callsign is a no-op
    assert!(!p.update_aircraft_enabled(&Callsign::new("NOBODY"), false));
  }

  #[test]
  fn test_remove_cleans_everything() {
    let p = provider(None);
    let cs = Callsign::new("DLH123");
    p.store_aircraft_situation(situation("DLH123", 1000, 1000.0));
    p.store_aircraft_parts(&cs, AircraftParts::new(true, 1000));

    assert!(p.remove_aircraft(&cs));
    assert!(!p.remove_aircraft(&cs));
    assert_eq!(p.aircraft_in_range_count(), 0);
    assert!(p.situations_for(&cs).is_empty());
    assert!(p.parts_for(&cs).is_empty());
    assert!(p.latest_change(&cs).is_null());
    assert!(p.situation_at(&cs, 0).is_null());
  }

  #[test]
  fn test_interpolation_facade() {
    let p = provider(None);
    let cs = Callsign::new("DLH123");
    p.store_aircraft_situation(situation("DLH123", 1000, 1000.0));

    // one situation: hold position, not interpolated
    let res = p.interpolate(&cs, 1000);
    assert!(!res.status.is_interpolated());
    assert!(res.status.has_valid_situation());
    assert_eq!(res.status.situations_count, 1);

    p.store_aircraft_situation(situation("DLH123", 2000, 2000.0));
    let res = p.interpolate(&cs, 1500);
    assert!(res.status.is_interpolated());
    let s = res.situation.unwrap();
    assert!((s.altitude_ft - 1500.0).abs() < 1e-9);
  }

  #[test]
  fn test_interpolation_unknown_callsign() {
    let p = provider(None);
    let res = p.interpolate(&Callsign::new("NOBODY"), 1000);
    assert!(!res.status.is_interpolated());
    assert!(!res.status.has_valid_situation());
    assert!(res.situation.is_none());
  }

  #[test]
  fn test_snapshot_scenario() {
    let p = provider(None);
    let reference = Point::new(50.0, 8.0);
    for (cs, bearing, dist) in [("NEAR5", 90.0, 5.0), ("MID50", 180.0, 50.0), ("FAR500", 0.0, 500.0)]
    {
      let pos = reference.destination(bearing, dist);
      let mut s = situation(cs, 1000, 5000.0);
      s.position = pos;
      s.callsign = Callsign::new(cs);
      p.store_aircraft_situation(s);
    }
    let snap = p.compute_airspace_snapshot(reference, 100.0, 2);
    assert_eq!(
      snap.enabled_in_range,
      vec![Callsign::new("NEAR5"), Callsign::new("MID50")]
    );
    assert_eq!(p.latest_airspace_snapshot().unwrap(), snap);
  }

  #[test]
  fn test_average_elevation() {
    let p = provider(Some(364.0));
    let reference = Point::new(50.0, 8.0);
    // two parked aircraft close by, elevation resolved on ingest
    for cs in ["PARK1", "PARK2"] {
      for t in [1000, 2000, 3000] {
        let mut s = situation(cs, t, 365.0);
        s.callsign = Callsign::new(cs);
        s.ground_speed_kt = 0.5;
        p.store_aircraft_situation(s);
      }
    }
    // one fast one that must not contribute
    for t in [1000, 2000, 3000] {
      let mut s = situation("FAST1", t, 365.0);
      s.ground_speed_kt = 140.0;
      p.store_aircraft_situation(s);
    }

    let plane = p
      .average_elevation_of_non_moving_aircraft(reference, 10.0, 2, 5)
      .unwrap();
    assert!((plane.altitude_ft - 364.0).abs() < 1e-9);
    assert_eq!(plane.info, ElevationInfo::Average);

    assert!(p
      .average_elevation_of_non_moving_aircraft(reference, 10.0, 3, 5)
      .is_none());
  }

  #[test]
  fn test_test_altitude_offset() {
    let p = provider(None);
    let cs = Callsign::new("DLH123");
    p.set_test_altitude_offset(Some(100.0));
    p.store_aircraft_situation(situation("DLH123", 1000, 1000.0));
    assert!((p.latest_situation(&cs).unwrap().altitude_ft - 1100.0).abs() < 1e-9);

    p.set_test_altitude_offset(None);
    p.store_aircraft_situation(situation("DLH123", 2000, 1000.0));
    assert!((p.latest_situation(&cs).unwrap().altitude_ft - 1000.0).abs() < 1e-9);
  }

  #[test]
  fn test_reverse_lookup_messages() {
    let p = provider(Some(364.0));
    let cs = Callsign::new("DLH123");
    p.store_aircraft_situation(situation("DLH123", 1000, 365.0));
    assert!(p.reverse_lookup_messages(&cs).is_empty());

    p.enable_reverse_lookup_messages(true);
    p.store_aircraft_situation(situation("DLH123", 2000, 365.0));
    let msgs = p.reverse_lookup_messages(&cs);
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].contains("elevation+cg"));
  }

  #[test]
  fn test_concurrent_insert_and_read() {
    let p = Arc::new(provider(None));
    let producers: Vec<_> = (0..4)
      .map(|n| {
        let p = p.clone();
        thread::spawn(move || {
          for t in 1..=200 {
            let cs = format!("TST{n}");
            let mut s = situation(&cs, t * 100, 1000.0);
            s.callsign = Callsign::new(&cs);
            p.store_aircraft_situation(s);
          }
        })
      })
      .collect();
    let readers: Vec<_> = (0..4)
      .map(|_| {
        let p = p.clone();
        thread::spawn(move || {
          for _ in 0..500 {
            let count = p.aircraft_in_range_count();
            assert!(count <= 4, "count {count} exceeds distinct callsigns");
            let _ = p.interpolate(&Callsign::new("TST0"), 10_000);
          }
        })
      })
      .collect();
    for h in producers.into_iter().chain(readers) {
      h.join().unwrap();
    }
    assert_eq!(p.aircraft_in_range_count(), 4);
  }

  #[test]
  fn test_cg_override_flips_ground_resolution() {
    // 380ft over a 364ft field: gear 16ft up with the default CG
    let p = provider(Some(364.0));
    p.store_aircraft_situation(situation("DLH123", 1000, 380.0));
    assert!(!p.latest_situation(&Callsign::new("DLH123")).unwrap().is_on_ground());

    // same geometry, but a 15ft configured CG leaves 1ft of gear clearance
    let q = provider(Some(364.0));
    let cs = Callsign::new("DLH123");
    let mut setup = InterpolationSetup::default();
    setup.time_offset_ms = 0;
    setup.cg_override_ft = Some(15.0);
    q.set_interpolation_setup(&cs, setup);
    q.store_aircraft_situation(situation("DLH123", 1000, 380.0));
    let stored = q.latest_situation(&cs).unwrap();
    assert!(stored.is_on_ground());
    assert_eq!(
      stored.on_ground.details,
      OnGroundDetails::OnGroundByElevationAndCg
    );
    assert!(q.interpolate(&cs, 1000).situation.unwrap().is_on_ground());
  }

  #[test]
  fn test_concurrent_updates_keep_one_spatial_object() {
    let p = Arc::new(provider(None));
    let handles: Vec<_> = (0..4)
      .map(|n: i64| {
        let p = p.clone();
        thread::spawn(move || {
          for t in 1..=50 {
            let mut s = situation("DLH123", t * 100 + n, 1000.0);
            s.position = Point::new(50.0 + (n as f64) * 0.001, 8.0);
            p.store_aircraft_situation(s);
          }
        })
      })
      .collect();
    for h in handles {
      h.join().unwrap();
    }
    // exactly one tree object per callsign, whatever the write interleaving
    assert_eq!(p.aircraft2d.read().unwrap().size(), 1);
    assert_eq!(p.aircraft_po.len(), 1);

    let cs = Callsign::new("DLH123");
    assert!(p.remove_aircraft(&cs));
    assert_eq!(p.aircraft2d.read().unwrap().size(), 0);
    assert!(p.aircraft_po.is_empty());
  }

  #[test]
  fn test_first_sighting_counted_once() {
    let p = Arc::new(provider(None));
    let handles: Vec<_> = (0..8)
      .map(|n: i64| {
        let p = p.clone();
        thread::spawn(move || {
          p.store_aircraft_situation(situation("DLH123", 1000 + n, 1000.0));
        })
      })
      .collect();
    for h in handles {
      h.join().unwrap();
    }
    assert_eq!(p.metrics.read().unwrap().aircraft_added, 1);
    assert_eq!(p.aircraft_in_range_count(), 1);
  }

  #[tokio::test]
  async fn test_events_delivered() {
    let p = provider(None);
    let mut rx = p.subscribe();
    p.store_aircraft_situation(situation("DLH123", 1000, 1000.0));
    match rx.recv().await.unwrap() {
      ProviderEvent::AddedSituation(s) => assert_eq!(s.callsign, Callsign::new("DLH123")),
      other => panic!("unexpected event {other:?}"),
    }

    let cs = Callsign::new("DLH123");
    p.update_aircraft_enabled(&cs, false);
    match rx.recv().await.unwrap() {
      ProviderEvent::AircraftEnabledChanged(ecs, enabled) => {
        assert_eq!(ecs, cs);
        assert!(!enabled);
      }
      other => panic!("unexpected event {other:?}"),
    }

    p.remove_aircraft(&cs);
    match rx.recv().await.unwrap() {
      ProviderEvent::RemovedAircraft(ecs) => assert_eq!(ecs, cs),
      other => panic!("unexpected event {other:?}"),
    }
  }

  #[test]
  fn test_metrics_counters() {
    let p = provider(None);
    p.store_aircraft_situation(situation("DLH123", 1000, 1000.0));
    p.store_aircraft_situation(situation("DLH123", 2000, 1000.0));
    p.store_aircraft_parts(&Callsign::new("DLH123"), AircraftParts::new(true, 1000));
    let rendered = p.render_metrics();
    assert!(rendered.contains("situations_stored_total 2"));
    assert!(rendered.contains("parts_stored_total 1"));
    assert!(rendered.contains("aircraft_added_total 1"));
  }
}
