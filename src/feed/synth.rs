//! Synthetic traffic generator for the replay/soak binary: a handful of
//! aircraft flying a pushback → taxi → takeoff → climb → cruise profile
//! with measurement noise, timestamp jitter and optional out-of-order
//! delivery, exercising reordering, change detection and ground guessing.

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::FeedEvent;
use crate::{
  aircraft::{
    parts::{AircraftLights, AircraftParts, PartsDetails},
    situation::{AircraftSituation, OnGroundInfo},
  },
  config::Feed,
  interpolate::pbh::normalize_heading_deg,
  types::{Callsign, Point},
};

const TAXI_SPEED_KT: f64 = 12.0;
const ROTATE_SPEED_KT: f64 = 140.0;
const CLIMB_RATE_FPM: f64 = 2000.0;
const CRUISE_ALTITUDE_FT: f64 = 20_000.0;
const CRUISE_SPEED_KT: f64 = 440.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlightPhase {
  Parked,
  Pushback,
  Taxi,
  TakeoffRoll,
  Climb,
  Cruise,
}

impl FlightPhase {
  /// Phase by elapsed flight time. Boundaries are loosely modeled on a
  /// short-haul departure.
  pub fn at(elapsed_s: f64) -> Self {
    match elapsed_s {
      t if t < 20.0 => FlightPhase::Parked,
      t if t < 50.0 => FlightPhase::Pushback,
      t if t < 110.0 => FlightPhase::Taxi,
      t if t < 140.0 => FlightPhase::TakeoffRoll,
      t if t < 440.0 => FlightPhase::Climb,
      _ => FlightPhase::Cruise,
    }
  }

  pub fn on_ground(&self) -> bool {
    *self <= FlightPhase::TakeoffRoll
  }
}

#[derive(Debug)]
struct SyntheticAircraft {
  callsign: Callsign,
  position: Point,
  heading_deg: f64,
  agl_ft: f64,
  ground_speed_kt: f64,
  pitch_deg: f64,
  field_elevation_ft: f64,
  /// staggers aircraft into different phases
  phase_offset_s: f64,
  elapsed_s: f64,
}

impl SyntheticAircraft {
  fn phase(&self) -> FlightPhase {
    FlightPhase::at(self.elapsed_s + self.phase_offset_s)
  }

  fn advance(&mut self, dt_s: f64) {
    self.elapsed_s += dt_s;
    match self.phase() {
      FlightPhase::Parked => {
        self.ground_speed_kt = 0.0;
        self.pitch_deg = 0.0;
      }
      FlightPhase::Pushback => {
        self.ground_speed_kt = 2.0;
        self.heading_deg = normalize_heading_deg(self.heading_deg - 1.0 * dt_s);
        self.move_along(self.heading_deg + 180.0, dt_s);
      }
      FlightPhase::Taxi => {
        self.ground_speed_kt = TAXI_SPEED_KT;
        self.move_along(self.heading_deg, dt_s);
      }
      FlightPhase::TakeoffRoll => {
        self.ground_speed_kt = (self.ground_speed_kt + 5.0 * dt_s).min(ROTATE_SPEED_KT);
        if self.ground_speed_kt > 120.0 {
          self.pitch_deg = (self.pitch_deg + 1.5 * dt_s).min(8.0);
        }
        self.move_along(self.heading_deg, dt_s);
      }
      FlightPhase::Climb => {
        self.ground_speed_kt = (self.ground_speed_kt + 2.0 * dt_s).min(160.0);
        self.pitch_deg = 8.0;
        self.agl_ft = (self.agl_ft + CLIMB_RATE_FPM * dt_s / 60.0)
          .min(CRUISE_ALTITUDE_FT - self.field_elevation_ft);
        self.move_along(self.heading_deg, dt_s);
      }
      FlightPhase::Cruise => {
        self.ground_speed_kt = CRUISE_SPEED_KT;
        self.pitch_deg = 2.0;
        self.agl_ft = CRUISE_ALTITUDE_FT - self.field_elevation_ft;
        self.move_along(self.heading_deg, dt_s);
      }
    }
  }

  fn move_along(&mut self, bearing_deg: f64, dt_s: f64) {
    let distance_nm = self.ground_speed_kt * dt_s / 3600.0;
    if distance_nm > 0.0 {
      self.position = self.position.destination(bearing_deg, distance_nm);
    }
  }

  fn situation(&self, timestamp_ms: i64, rng: &mut StdRng) -> AircraftSituation {
    let phase = self.phase();
    let mut s = AircraftSituation::new(
      self.callsign.clone(),
      self.position,
      self.field_elevation_ft + self.agl_ft + rng.gen_range(-1.5..1.5),
      timestamp_ms,
    );
    s.heading_deg = normalize_heading_deg(self.heading_deg + rng.gen_range(-0.3..0.3));
    s.pitch_deg = self.pitch_deg;
    s.ground_speed_kt = self.ground_speed_kt;
    s.on_ground = OnGroundInfo::from_network(phase.on_ground());
    s
  }

  fn parts(&self, timestamp_ms: i64) -> AircraftParts {
    let phase = self.phase();
    let mut parts = AircraftParts::new(phase.on_ground(), timestamp_ms);
    parts.gear_down = phase <= FlightPhase::Climb && self.agl_ft < 1500.0;
    parts.flaps_percent = match phase {
      FlightPhase::TakeoffRoll | FlightPhase::Climb => 25.0,
      _ => 0.0,
    };
    parts.engines_on = match phase {
      FlightPhase::Parked => vec![false, false],
      _ => vec![true, true],
    };
    parts.lights = AircraftLights::all_on();
    parts.details = PartsDetails::FsdParts;
    parts
  }
}

/// Produces one batch of feed events per update period.
#[derive(Debug)]
pub struct SyntheticFeed {
  aircraft: Vec<SyntheticAircraft>,
  jitter_ms: i64,
  out_of_order_probability: f64,
  rng: StdRng,
  /// withheld event emitted behind newer ones to fake late delivery
  held_back: Option<FeedEvent>,
  ticks: u64,
}

impl SyntheticFeed {
  pub fn new(cfg: &Feed, seed: u64) -> Self {
    let mut rng = StdRng::seed_from_u64(seed);
    let origin = Point::new(cfg.origin_lat, cfg.origin_lng);
    let aircraft = (0..cfg.aircraft)
      .map(|n| SyntheticAircraft {
        callsign: Callsign::new(&format!("SYN{n:03}")),
        position: origin.destination(rng.gen_range(0.0..360.0), rng.gen_range(0.0..2.0)),
        heading_deg: rng.gen_range(0.0..360.0),
        agl_ft: 0.0,
        ground_speed_kt: 0.0,
        pitch_deg: 0.0,
        field_elevation_ft: cfg.field_elevation_ft,
        phase_offset_s: n as f64 * 15.0,
        elapsed_s: 0.0,
      })
      .collect();
    Self {
      aircraft,
      jitter_ms: cfg.jitter.as_millis() as i64,
      out_of_order_probability: cfg.out_of_order_probability,
      rng,
      held_back: None,
      ticks: 0,
    }
  }

  pub fn callsigns(&self) -> Vec<Callsign> {
    self.aircraft.iter().map(|a| a.callsign.clone()).collect()
  }

  /// Advance all aircraft by `dt_s` and emit their updates stamped around
  /// `now_ms`. Parts go out every other tick, situations every tick.
  pub fn tick(&mut self, now_ms: i64, dt_s: f64) -> Vec<FeedEvent> {
    self.ticks += 1;
    let mut events = vec![];

    for aircraft in self.aircraft.iter_mut() {
      aircraft.advance(dt_s);
      let jitter = if self.jitter_ms > 0 {
        self.rng.gen_range(-self.jitter_ms..=self.jitter_ms)
      } else {
        0
      };
      events.push(FeedEvent::Situation(
        aircraft.situation(now_ms + jitter, &mut self.rng),
      ));
      if self.ticks % 2 == 0 {
        events.push(FeedEvent::Parts(
          aircraft.callsign.clone(),
          aircraft.parts(now_ms + jitter),
        ));
      }
    }

    // late-delivery simulation: occasionally withhold one event and append
    // it after the next batch, where it arrives older than its neighbors
    if let Some(held) = self.held_back.take() {
      events.push(held);
    }
    if self.out_of_order_probability > 0.0
      && !events.is_empty()
      && self.rng.gen_bool(self.out_of_order_probability.clamp(0.0, 1.0))
    {
      self.held_back = Some(events.remove(0));
    }

    events
  }
}

#[cfg(test)]
pub mod tests {
  use super::*;

  fn cfg(aircraft: usize, out_of_order: f64) -> Feed {
    Feed {
      aircraft,
      out_of_order_probability: out_of_order,
      ..Default::default()
    }
  }

  #[test]
  fn test_phase_progression() {
    assert_eq!(FlightPhase::at(0.0), FlightPhase::Parked);
    assert_eq!(FlightPhase::at(30.0), FlightPhase::Pushback);
    assert_eq!(FlightPhase::at(120.0), FlightPhase::TakeoffRoll);
    assert_eq!(FlightPhase::at(200.0), FlightPhase::Climb);
    assert_eq!(FlightPhase::at(1000.0), FlightPhase::Cruise);
    assert!(FlightPhase::TakeoffRoll.on_ground());
    assert!(!FlightPhase::Climb.on_ground());
  }

  #[test]
  fn test_feed_produces_all_aircraft() {
    let mut feed = SyntheticFeed::new(&cfg(3, 0.0), 42);
    let events = feed.tick(1_000_000, 5.0);
    let situations = events
      .iter()
      .filter(|e| matches!(e, FeedEvent::Situation(_)))
      .count();
    assert_eq!(situations, 3);
    assert_eq!(feed.callsigns().len(), 3);
  }

  #[test]
  fn test_aircraft_eventually_airborne() {
    let mut feed = SyntheticFeed::new(&cfg(1, 0.0), 42);
    let mut last_situation = None;
    for tick in 0..60 {
      for event in feed.tick(1_000_000 + tick * 5000, 5.0) {
        if let FeedEvent::Situation(s) = event {
          last_situation = Some(s);
        }
      }
    }
    // 300s in the aircraft is climbing
    let s = last_situation.unwrap();
    assert!(!s.is_on_ground());
    assert!(s.altitude_ft > 1000.0, "altitude {}", s.altitude_ft);
  }

  #[test]
  fn test_out_of_order_delivery() {
    let mut feed = SyntheticFeed::new(&cfg(2, 1.0), 42);
    // with probability 1 every batch withholds its first event
    let first = feed.tick(1_000_000, 5.0);
    // one of the two situations was withheld
    assert_eq!(first.len(), 1);
    let second = feed.tick(1_005_000, 5.0);
    // the withheld event surfaces in batch two with an older timestamp
    // than its neighbors
    let held = second.last().unwrap();
    assert!(held.timestamp_ms() < second[0].timestamp_ms());
  }

  #[test]
  fn test_parked_aircraft_stay_put() {
    let mut feed = SyntheticFeed::new(&cfg(1, 0.0), 7);
    let a = feed.tick(1_000_000, 5.0);
    let b = feed.tick(1_005_000, 5.0);
    let pos = |events: &Vec<FeedEvent>| match &events[0] {
      FeedEvent::Situation(s) => s.position,
      _ => panic!("expected situation"),
    };
    // first aircraft has no phase offset and is still parked after 10s
    let d = pos(&a).distance_nm(&pos(&b));
    assert!(d < 0.01, "moved {d}nm while parked");
  }
}
