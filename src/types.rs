use geo::{HaversineDestination, HaversineDistance};
use geo_types::{Coord, Point as GeoPoint};
use lazy_static::lazy_static;
use regex::Regex;
use rstar::AABB;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

const MAX_LNG: f64 = 179.9999;
const MIN_LNG: f64 = -179.9999;

pub const METERS_PER_NM: f64 = 1852.0;
pub const FEET_PER_METER: f64 = 3.28084;

lazy_static! {
  // network callsigns: "DLH123", "N123AB", "EDDF_TWR" style identifiers
  static ref CALLSIGN_RE: Regex = Regex::new(r"^[A-Z0-9][A-Z0-9_-]{0,9}$").unwrap();
}

/// Aircraft network identifier, normalized to uppercase on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Callsign(String);

impl Callsign {
  pub fn new(cs: &str) -> Self {
    Self(cs.trim().to_uppercase())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn is_valid(&self) -> bool {
    CALLSIGN_RE.is_match(&self.0)
  }
}

impl Display for Callsign {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for Callsign {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Point {
  pub lat: f64,
  pub lng: f64,
}

impl From<Point> for GeoPoint {
  fn from(val: Point) -> Self {
    Self(Coord {
      x: val.lng,
      y: val.lat,
    })
  }
}

impl Point {
  pub fn new(lat: f64, lng: f64) -> Self {
    Self { lat, lng }
  }

  pub fn clamp(&self) -> Self {
    Self {
      lat: self.lat.clamp(-90.0, 90.0), // don't wrap lat, just clamp
      lng: (self.lng + 180.0).rem_euclid(360.0) - 180.0, // make sure lng is wrapped to stay within -180..180
    }
  }

  pub fn is_valid(&self) -> bool {
    self.lat.is_finite()
      && self.lng.is_finite()
      && (-90.0..=90.0).contains(&self.lat)
      && (-180.0..=180.0).contains(&self.lng)
  }

  pub fn envelope(self) -> AABB<Point> {
    AABB::from_point(self)
  }

  /// Great-circle distance in nautical miles.
  pub fn distance_nm(&self, other: &Point) -> f64 {
    let a: GeoPoint = (*self).into();
    let b: GeoPoint = (*other).into();
    a.haversine_distance(&b) / METERS_PER_NM
  }

  /// Point reached by travelling `distance_nm` along `bearing_deg`.
  pub fn destination(&self, bearing_deg: f64, distance_nm: f64) -> Point {
    let origin: GeoPoint = (*self).into();
    let dest = origin.haversine_destination(bearing_deg, distance_nm * METERS_PER_NM);
    Point {
      lat: dest.y(),
      lng: dest.x(),
    }
    .clamp()
  }

  /// Coarse bounding rect for range queries against the rtree. Candidates
  /// still need a precise haversine check, the box errs on the large side.
  pub fn range_rect(&self, radius_nm: f64) -> Rect {
    let lat_pad = radius_nm / 60.0;
    // one minute of longitude shrinks with latitude
    let cos_lat = self.lat.to_radians().cos().abs().max(0.01);
    let lng_pad = radius_nm / (60.0 * cos_lat);
    Rect {
      south_west: Point {
        lat: self.lat - lat_pad,
        lng: self.lng - lng_pad,
      }
      .clamp(),
      north_east: Point {
        lat: self.lat + lat_pad,
        lng: self.lng + lng_pad,
      }
      .clamp(),
    }
  }
}

impl rstar::Point for Point {
  type Scalar = f64;
  const DIMENSIONS: usize = 2;

  fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
    let lng = generator(0);
    let lat = generator(1);
    Self { lat, lng }
  }

  fn nth(&self, index: usize) -> Self::Scalar {
    match index {
      0 => self.lng,
      1 => self.lat,
      _ => unreachable!(),
    }
  }

  fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
    match index {
      0 => &mut self.lng,
      1 => &mut self.lat,
      _ => unreachable!(),
    }
  }
}

#[derive(Debug, Serialize, Clone, Copy)]
pub struct Rect {
  pub south_west: Point,
  pub north_east: Point,
}

impl Rect {
  pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
    Self {
      south_west: Point {
        lng: min_lng,
        lat: min_lat,
      },
      north_east: Point {
        lng: max_lng,
        lat: max_lat,
      },
    }
  }

  pub fn envelopes(&self) -> Vec<AABB<Point>> {
    // AABB does silly things when the leftmost point has a positive longitude
    // and the rightmost one has a negative one. AABB simply swaps them in constructor,
    // that's not the behaviour we need.
    if self.south_west.lng > 0.0 && self.north_east.lng < 0.0 {
      vec![
        AABB::from_corners(
          Point {
            lat: self.south_west.lat,
            lng: self.south_west.lng,
          },
          Point {
            lat: self.north_east.lat,
            lng: MAX_LNG,
          },
        ),
        AABB::from_corners(
          Point {
            lat: self.south_west.lat,
            lng: MIN_LNG,
          },
          Point {
            lat: self.north_east.lat,
            lng: self.north_east.lng,
          },
        ),
      ]
    } else {
      vec![AABB::from_corners(self.south_west, self.north_east)]
    }
  }
}
