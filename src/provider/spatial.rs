use rstar::{RTreeObject, AABB};

use crate::{
  aircraft::simulated::SimulatedAircraft,
  types::{Callsign, Point},
};

/// rtree payload for one aircraft. Kept in a map alongside the tree because
/// rstar cannot search by id: removal looks the object up in the map, then
/// the tree finds it by coords and matches it with PartialEq.
#[derive(Debug, Clone)]
pub struct PointObject {
  pub id: Callsign,
  pub point: Point,
}

impl RTreeObject for PointObject {
  type Envelope = AABB<Point>;

  fn envelope(&self) -> Self::Envelope {
    AABB::from_point(self.point)
  }
}

impl From<&SimulatedAircraft> for PointObject {
  fn from(aircraft: &SimulatedAircraft) -> Self {
    Self {
      id: aircraft.callsign.clone(),
      point: aircraft.situation.position,
    }
  }
}

impl PartialEq for PointObject {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstar::RTree;

  #[test]
  fn test_locate_and_remove_by_id() {
    let mut tree = RTree::new();
    let po = PointObject {
      id: Callsign::new("DLH123"),
      point: Point::new(50.0, 8.0),
    };
    tree.insert(po.clone());

    let env = Point::new(50.0, 8.0).range_rect(10.0).envelopes();
    let found: Vec<_> = tree.locate_in_envelope(&env[0]).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, Callsign::new("DLH123"));

    assert!(tree.remove(&po).is_some());
    assert_eq!(tree.size(), 0);
  }
}
