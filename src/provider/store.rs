use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{aircraft::Timestamped, types::Callsign, util::epoch_millis_now};

/// Situations and parts keep at most this much history per callsign.
pub const DEFAULT_CAP: usize = 50;
/// Parts older than this relative to the newest entry are pruned.
pub const PARTS_MAX_AGE_MS: i64 = 60_000;

/// Bounded most-recent-first history per callsign. DashMap shards give each
/// callsign effectively independent locking, a busy network feed on one
/// aircraft does not stall reads on another.
#[derive(Debug)]
pub struct CallsignKeyedStore<T> {
  entries: DashMap<Callsign, Vec<T>>,
  last_modified: DashMap<Callsign, i64>,
  cap: usize,
  max_age_ms: Option<i64>,
  total_inserted: AtomicU64,
}

impl<T: Timestamped + Clone> CallsignKeyedStore<T> {
  pub fn new(cap: usize, max_age_ms: Option<i64>) -> Self {
    Self {
      entries: DashMap::new(),
      last_modified: DashMap::new(),
      cap,
      max_age_ms,
      total_inserted: AtomicU64::new(0),
    }
  }

  /// Insert keeping reverse-chronological order. New entries are normally
  /// the newest but out-of-order delivery lands at the correct sorted slot.
  /// Returns the index the entry ended up at.
  pub fn insert(&self, callsign: &Callsign, item: T, remove_outdated: bool) -> usize {
    let mut list = self.entries.entry(callsign.clone()).or_default();
    let pos = list
      .iter()
      .position(|e| e.timestamp_ms() <= item.timestamp_ms())
      .unwrap_or(list.len());
    list.insert(pos, item);
    list.truncate(self.cap);

    if remove_outdated {
      if let Some(max_age) = self.max_age_ms {
        if let Some(newest) = list.first().map(|e| e.timestamp_ms()) {
          let cutoff = newest - max_age;
          let mut idx = 0;
          // index 0 is the newest and survives regardless of age
          list.retain(|e| {
            let keep = idx == 0 || e.timestamp_ms() >= cutoff;
            idx += 1;
            keep
          });
        }
      }
    }
    drop(list);

    self.last_modified.insert(callsign.clone(), epoch_millis_now());
    self.total_inserted.fetch_add(1, Ordering::Relaxed);
    pos.min(self.cap - 1)
  }

  /// Full history for a callsign, newest first. Unknown callsigns yield an
  /// empty vec, never an error.
  pub fn all(&self, callsign: &Callsign) -> Vec<T> {
    self
      .entries
      .get(callsign)
      .map(|l| l.clone())
      .unwrap_or_default()
  }

  pub fn latest(&self, callsign: &Callsign) -> Option<T> {
    self.at(callsign, 0)
  }

  /// Entry at `index`, 0 being the latest. Out of range is a miss, not an
  /// error.
  pub fn at(&self, callsign: &Callsign, index: usize) -> Option<T> {
    self
      .entries
      .get(callsign)
      .and_then(|l| l.get(index).cloned())
  }

  pub fn count(&self, callsign: &Callsign) -> usize {
    self.entries.get(callsign).map(|l| l.len()).unwrap_or(0)
  }

  pub fn callsigns(&self) -> Vec<Callsign> {
    self.entries.iter().map(|e| e.key().clone()).collect()
  }

  pub fn remove_callsign(&self, callsign: &Callsign) -> bool {
    self.last_modified.remove(callsign);
    self.entries.remove(callsign).is_some()
  }

  pub fn clear(&self) {
    self.entries.clear();
    self.last_modified.clear();
  }

  /// In-place rewrite of one callsign's history under its shard lock. Used
  /// for elevation backfill, which legitimately mutates stored entries.
  /// Returns whatever the closure counted.
  pub fn modify(&self, callsign: &Callsign, f: impl FnOnce(&mut Vec<T>) -> usize) -> usize {
    let changed = match self.entries.get_mut(callsign) {
      Some(mut list) => f(&mut list),
      None => 0,
    };
    if changed > 0 {
      self.last_modified.insert(callsign.clone(), epoch_millis_now());
    }
    changed
  }

  pub fn last_modified_ms(&self, callsign: &Callsign) -> Option<i64> {
    self.last_modified.get(callsign).map(|v| *v)
  }

  pub fn total_inserted(&self) -> u64 {
    self.total_inserted.load(Ordering::Relaxed)
  }
}
