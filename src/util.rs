use std::{collections::HashMap, hash::Hash, ops::Deref};

use chrono::{DateTime, Utc};

pub struct Counter<T: Hash + Eq> {
  inner: HashMap<T, usize>,
}

impl<T: Hash + Eq> Counter<T> {
  pub fn new() -> Self {
    Self {
      inner: HashMap::new(),
    }
  }

  pub fn inc(&mut self, key: T) {
    let value = self.inner.entry(key).or_insert(0);
    *value += 1;
  }
}

impl<T: Hash + Eq> Deref for Counter<T> {
  type Target = HashMap<T, usize>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl<T: Hash + Eq> Default for Counter<T> {
  fn default() -> Self {
    Self::new()
  }
}

pub fn seconds_since(t: DateTime<Utc>) -> f32 {
  let t2 = Utc::now();
  let d = (t2 - t).to_std();
  if let Ok(d) = d {
    d.as_secs_f32()
  } else {
    0.0
  }
}

/// Current wall clock as epoch milliseconds, the time axis every
/// situation/parts record lives on.
pub fn epoch_millis_now() -> i64 {
  Utc::now().timestamp_millis()
}

/// Population mean and standard deviation. Returns `None` for fewer than
/// two samples, the analysis windows guarantee at least two.
pub fn mean_and_stddev(values: &[f64]) -> Option<(f64, f64)> {
  if values.len() < 2 {
    return None;
  }
  let n = values.len() as f64;
  let mean = values.iter().sum::<f64>() / n;
  let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
  Some((mean, var.sqrt()))
}

#[cfg(test)]
pub mod tests {
  use super::*;

  #[test]
  fn test_counter() {
    let mut counter = Counter::new();
    counter.inc("abc");
    counter.inc("abc");
    let keys: Vec<&&str> = counter.keys().collect();
    assert_eq!(keys.len(), 1);
    assert_eq!(*keys[0], "abc");
    assert_eq!(counter.get("abc").unwrap(), &2);
  }

  #[test]
  fn test_mean_and_stddev() {
    assert!(mean_and_stddev(&[1.0]).is_none());

    let (mean, dev) = mean_and_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
    assert!((mean - 5.0).abs() < 1e-9);
    assert!((dev - 2.0).abs() < 1e-9);
  }

  #[test]
  fn test_mean_and_stddev_constant() {
    let (mean, dev) = mean_and_stddev(&[3.0, 3.0, 3.0]).unwrap();
    assert!((mean - 3.0).abs() < 1e-9);
    assert!(dev.abs() < 1e-9);
  }
}
