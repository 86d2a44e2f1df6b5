//! Sparse lattice store.
//!
//! Voxels live in a hash map keyed by canonical (in-range) coordinate, with a
//! secondary id index for partner lookups. Any coordinate handed to the store
//! is first resolved through the [`BoundaryMode`], so callers never see a
//! silent no-op for an out-of-range address: toroidal and reflective lattices
//! map it back inside, absorbing lattices report it as outside.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use trilattice_data::{Coord, Extent, Vec3, Voxel, VoxelState};
use uuid::Uuid;

use crate::error::{ConfigError, SimulationError};

/// How the lattice treats coordinates outside `[0, extent)`.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[archive(check_bytes)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryMode {
    /// Wrap modulo the extent.
    #[default]
    Toroidal,
    /// Everything outside is permanently Void with zero flux.
    Absorbing,
    /// Mirror across the boundary face: -1 reads cell 0, n reads cell n-1.
    Reflective,
}

impl BoundaryMode {
    /// Resolves one axis. `None` only for absorbing lattices.
    #[must_use]
    pub fn resolve_axis(self, c: i32, n: i32) -> Option<i32> {
        if (0..n).contains(&c) {
            return Some(c);
        }
        match self {
            BoundaryMode::Toroidal => Some(c.rem_euclid(n)),
            BoundaryMode::Absorbing => None,
            BoundaryMode::Reflective => {
                let period = 2 * i64::from(n);
                let m = i64::from(c).rem_euclid(period);
                let folded = if m < i64::from(n) { m } else { period - 1 - m };
                // folded is in [0, n) so it fits back into i32
                Some(folded as i32)
            }
        }
    }

    #[must_use]
    pub fn resolve(self, extent: Extent, c: Coord) -> Option<Coord> {
        Some(Coord::new(
            self.resolve_axis(c.x, extent.x)?,
            self.resolve_axis(c.y, extent.y)?,
            self.resolve_axis(c.z, extent.z)?,
        ))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BoundaryMode::Toroidal => "toroidal",
            BoundaryMode::Absorbing => "absorbing",
            BoundaryMode::Reflective => "reflective",
        }
    }
}

impl FromStr for BoundaryMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toroidal" | "periodic" => Ok(BoundaryMode::Toroidal),
            "absorbing" => Ok(BoundaryMode::Absorbing),
            "reflective" => Ok(BoundaryMode::Reflective),
            _ => Err(ConfigError::UnknownBoundaryMode(s.to_string())),
        }
    }
}

impl fmt::Display for BoundaryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash-indexed sparse voxel store.
#[derive(Debug, Clone, Default)]
pub struct LatticeStore {
    extent: Extent,
    boundary: BoundaryMode,
    cells: HashMap<Coord, Voxel>,
    ids: HashMap<Uuid, Coord>,
}

impl LatticeStore {
    #[must_use]
    pub fn new(extent: Extent, boundary: BoundaryMode) -> Self {
        Self {
            extent,
            boundary,
            cells: HashMap::new(),
            ids: HashMap::new(),
        }
    }

    #[must_use]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[must_use]
    pub fn boundary(&self) -> BoundaryMode {
        self.boundary
    }

    #[must_use]
    pub fn resolve(&self, c: Coord) -> Option<Coord> {
        self.boundary.resolve(self.extent, c)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn get(&self, c: Coord) -> Option<&Voxel> {
        self.resolve(c).and_then(|r| self.cells.get(&r))
    }

    /// Mutable access for field and motion updates.
    ///
    /// Identity (`id`) must not be changed through this handle; use
    /// [`LatticeStore::set`], [`LatticeStore::dissolve`] or
    /// [`LatticeStore::remove`] so the id index stays in step.
    pub fn get_mut(&mut self, c: Coord) -> Option<&mut Voxel> {
        let r = self.resolve(c)?;
        self.cells.get_mut(&r)
    }

    /// Stores `voxel` at `c`, returning what was there. Elidable Void records
    /// remove the site instead of being stored.
    pub fn set(&mut self, c: Coord, mut voxel: Voxel) -> Result<Option<Voxel>, SimulationError> {
        let r = self.resolve(c).ok_or(SimulationError::OutOfBounds(c))?;
        voxel.coord = r;
        if voxel.is_elidable() {
            return Ok(self.remove(r));
        }
        if !voxel.id.is_nil() {
            if let Some(old) = self.ids.get(&voxel.id) {
                if *old != r {
                    return Err(SimulationError::invalid(format!(
                        "voxel id {} is already stored at {}",
                        voxel.id, old
                    )));
                }
            }
        }
        let previous = self.cells.insert(r, voxel);
        if let Some(prev) = &previous {
            self.unindex(prev);
        }
        if let Some(v) = self.cells.get(&r) {
            if !v.id.is_nil() {
                self.ids.insert(v.id, r);
            }
        }
        Ok(previous)
    }

    pub fn remove(&mut self, c: Coord) -> Option<Voxel> {
        let r = self.resolve(c)?;
        let removed = self.cells.remove(&r)?;
        self.unindex(&removed);
        Some(removed)
    }

    /// Turns a manifested voxel back into a field carrier in place.
    pub fn dissolve(&mut self, c: Coord) -> Option<Uuid> {
        let r = self.resolve(c)?;
        let voxel = self.cells.get_mut(&r)?;
        let id = voxel.id;
        voxel.dissolve();
        let elidable = voxel.is_elidable();
        if !id.is_nil() && self.ids.get(&id) == Some(&r) {
            self.ids.remove(&id);
        }
        if elidable {
            self.cells.remove(&r);
        }
        Some(id)
    }

    fn unindex(&mut self, voxel: &Voxel) {
        if !voxel.id.is_nil() && self.ids.get(&voxel.id) == Some(&voxel.coord) {
            self.ids.remove(&voxel.id);
        }
    }

    /// Canonical coordinates in sorted order.
    #[must_use]
    pub fn sorted_coords(&self) -> Vec<Coord> {
        let mut coords: Vec<Coord> = self.cells.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    /// Voxels in coordinate-sorted order.
    #[must_use]
    pub fn iter_sorted(&self) -> Vec<&Voxel> {
        let mut voxels: Vec<&Voxel> = self.cells.values().collect();
        voxels.sort_unstable_by_key(|v| v.coord);
        voxels
    }

    /// Sorted coordinates of every manifested voxel.
    #[must_use]
    pub fn manifested_coords(&self) -> Vec<Coord> {
        let mut coords: Vec<Coord> = self
            .cells
            .values()
            .filter(|v| v.is_manifested())
            .map(|v| v.coord)
            .collect();
        coords.sort_unstable();
        coords
    }

    #[must_use]
    pub fn coord_of(&self, id: Uuid) -> Option<Coord> {
        self.ids.get(&id).copied()
    }

    #[must_use]
    pub fn find_by_id(&self, id: Uuid) -> Option<&Voxel> {
        self.coord_of(id).and_then(|c| self.cells.get(&c))
    }

    /// Flux at any coordinate; unresolved or absent sites read as zero.
    #[must_use]
    pub fn flux_at(&self, c: Coord) -> Vec3 {
        self.get(c).map_or(Vec3::ZERO, |v| v.flux)
    }

    #[must_use]
    pub fn flux_rate_at(&self, c: Coord) -> Vec3 {
        self.get(c).map_or(Vec3::ZERO, |v| v.flux_rate)
    }

    #[must_use]
    pub fn density_at(&self, c: Coord) -> f64 {
        self.get(c).map_or(0.0, Voxel::density)
    }

    #[must_use]
    pub fn charge_at(&self, c: Coord) -> f64 {
        self.get(c).map_or(0.0, |v| v.charge)
    }

    #[must_use]
    pub fn state_at(&self, c: Coord) -> VoxelState {
        self.get(c).map_or(VoxelState::Void, |v| v.state)
    }

    /// Drops every elidable Void record. Returns how many were removed.
    pub fn prune_elidable(&mut self) -> usize {
        let before = self.cells.len();
        self.cells.retain(|_, v| !v.is_elidable());
        before - self.cells.len()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.ids.clear();
    }
}
