use serde::Serialize;

use crate::{
  aircraft::{
    change::{AircraftSituationChange, SceneryDeviation},
    situation::{AircraftSituation, ElevationInfo, OnGroundDetails, OnGroundInfo, OnGroundState},
  },
  types::Point,
};

/// Gear point within this of the terrain counts as on ground.
pub const DELTA_NEAR_GROUND_FT: f64 = 3.0;

/// Terrain elevation around a coordinate, valid within `radius_nm` of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElevationPlane {
  pub position: Point,
  pub altitude_ft: f64,
  pub radius_nm: f64,
  pub info: ElevationInfo,
}

impl ElevationPlane {
  pub fn new(position: Point, altitude_ft: f64, radius_nm: f64, info: ElevationInfo) -> Self {
    Self {
      position,
      altitude_ft,
      radius_nm,
      info,
    }
  }

  pub fn covers(&self, point: &Point) -> bool {
    self.position.is_valid()
      && point.is_valid()
      && self.position.distance_nm(point) <= self.radius_nm
  }
}

/// Terrain probe seam. The simulator driver implements this in production,
/// the implementations below stand in for it in tests and the replay binary.
pub trait ElevationProvider: Send + Sync {
  fn elevation_at(&self, position: Point) -> Option<ElevationPlane>;
}

/// Uniform terrain height everywhere. Good enough around one airfield.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain {
  pub elevation_ft: f64,
}

impl ElevationProvider for FlatTerrain {
  fn elevation_at(&self, position: Point) -> Option<ElevationPlane> {
    Some(ElevationPlane::new(
      position,
      self.elevation_ft,
      1.0,
      ElevationInfo::Test,
    ))
  }
}

/// Fixed list of elevation planes, the nearest one covering the query point
/// wins.
#[derive(Debug, Clone, Default)]
pub struct TerrainTable {
  planes: Vec<ElevationPlane>,
}

impl TerrainTable {
  pub fn new(planes: Vec<ElevationPlane>) -> Self {
    Self { planes }
  }

  pub fn add(&mut self, plane: ElevationPlane) {
    self.planes.push(plane);
  }
}

impl ElevationProvider for TerrainTable {
  fn elevation_at(&self, position: Point) -> Option<ElevationPlane> {
    self
      .planes
      .iter()
      .filter(|p| p.covers(&position))
      .min_by(|a, b| {
        let da = a.position.distance_nm(&position);
        let db = b.position.distance_nm(&position);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
      })
      .copied()
  }
}

/// No terrain information at all, every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTerrain;

impl ElevationProvider for NoTerrain {
  fn elevation_at(&self, _position: Point) -> Option<ElevationPlane> {
    None
  }
}

/// Whether a stored classification may be replaced by a later, stronger one.
/// Authoritative network/parts flags are never touched.
pub fn can_upgrade(current: OnGroundDetails, candidate: OnGroundDetails) -> bool {
  !current.is_authoritative() && candidate.strength() > current.strength()
}

/// On-ground state from elevation + CG alone.
pub fn on_ground_by_elevation(situation: &AircraftSituation, cg_ft: f64) -> Option<OnGroundInfo> {
  let gd = situation.ground_distance_ft(cg_ft)?;
  let state = if gd <= DELTA_NEAR_GROUND_FT {
    OnGroundState::OnGround
  } else {
    OnGroundState::NotOnGround
  };
  Some(OnGroundInfo::resolved(
    state,
    OnGroundDetails::OnGroundByElevationAndCg,
  ))
}

/// Decide the on-ground state of a situation that lacks an authoritative
/// flag. Precedence: network/parts flag, then elevation + CG, then the
/// change detector's guess, then honestly unknown.
pub fn resolve_on_ground(
  situation: &mut AircraftSituation,
  change: &AircraftSituationChange,
  cg_ft: f64,
  provider: &dyn ElevationProvider,
) {
  if situation.on_ground.details.is_authoritative() {
    return;
  }

  if situation.ground_elevation_ft.is_none() {
    if let Some(plane) = provider.elevation_at(situation.position) {
      if plane.covers(&situation.position) {
        situation.set_ground_elevation(plane.altitude_ft, plane.info);
      }
    }
  }

  if let Some(info) = on_ground_by_elevation(situation, cg_ft) {
    situation.on_ground = info;
    return;
  }

  situation.on_ground = guess_on_ground(change);
}

/// Last resort, based on what the change detector saw. Inconclusive input
/// yields `Unknown`, never a silent default to one polarity.
pub fn guess_on_ground(change: &AircraftSituationChange) -> OnGroundInfo {
  if change.is_null() {
    return OnGroundInfo::resolved(OnGroundState::Unknown, OnGroundDetails::NotSet);
  }
  match change.scenery_deviation {
    SceneryDeviation::AllOnGround | SceneryDeviation::WasOnGround => {
      OnGroundInfo::resolved(OnGroundState::OnGround, OnGroundDetails::OnGroundByGuessing)
    }
    _ => {
      if change.const_not_on_ground && (change.const_ascending || change.const_descending) {
        OnGroundInfo::resolved(
          OnGroundState::NotOnGround,
          OnGroundDetails::OnGroundByGuessing,
        )
      } else if change.contains_push_back || change.rotating_up {
        OnGroundInfo::resolved(OnGroundState::OnGround, OnGroundDetails::OnGroundByGuessing)
      } else {
        OnGroundInfo::resolved(OnGroundState::Unknown, OnGroundDetails::NotSet)
      }
    }
  }
}
