pub mod scenario;
pub mod synth;

use crate::{
  aircraft::{parts::AircraftParts, situation::AircraftSituation},
  types::Callsign,
};

/// One unit of feed output, exactly what the network layer would push.
#[derive(Debug, Clone)]
pub enum FeedEvent {
  Situation(AircraftSituation),
  Parts(Callsign, AircraftParts),
}

impl FeedEvent {
  pub fn callsign(&self) -> &Callsign {
    match self {
      FeedEvent::Situation(s) => &s.callsign,
      FeedEvent::Parts(cs, _) => cs,
    }
  }

  pub fn timestamp_ms(&self) -> i64 {
    match self {
      FeedEvent::Situation(s) => s.timestamp_ms,
      FeedEvent::Parts(_, p) => p.timestamp_ms,
    }
  }
}
