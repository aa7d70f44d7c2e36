pub mod change;
pub mod parts;
pub mod simulated;
pub mod situation;

/// Everything stored per callsign lives on the epoch-ms time axis and
/// carries the per-aircraft offset used to shift render time.
pub trait Timestamped {
  fn timestamp_ms(&self) -> i64;
  fn time_offset_ms(&self) -> i64;

  fn adjusted_timestamp_ms(&self) -> i64 {
    self.timestamp_ms() + self.time_offset_ms()
  }
}
