use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use trilattice_data::Voxel;

use crate::binding::TriadRecord;
use crate::config::SimConfig;
use crate::error::SimulationError;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Position of the world's ChaCha stream.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct RngState {
    pub seed: u64,
    pub word_pos: u128,
}

/// Everything needed to resume a world bit-for-bit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorldSnapshot {
    pub version: u32,
    pub config: SimConfig,
    /// `SimConfig::fingerprint` at capture time.
    pub fingerprint: String,
    pub tick: u64,
    pub rng: RngState,
    /// Stored records in coordinate order.
    pub voxels: Vec<Voxel>,
    pub triads: Vec<TriadRecord>,
}

impl WorldSnapshot {
    /// Structural checks run before a snapshot is turned back into a world.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SimulationError::invalid(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        self.config.validate()?;
        if self.fingerprint != self.config.fingerprint() {
            return Err(SimulationError::invalid(
                "snapshot fingerprint does not match its configuration",
            ));
        }

        let extent = self.config.lattice.extent;
        let mut coords = HashSet::with_capacity(self.voxels.len());
        let mut ids = HashSet::new();
        for v in &self.voxels {
            if !extent.contains(v.coord) {
                return Err(SimulationError::OutOfBounds(v.coord));
            }
            if !coords.insert(v.coord) {
                return Err(SimulationError::Occupied(v.coord));
            }
            if v.is_manifested() == v.id.is_nil() {
                return Err(SimulationError::invalid(format!(
                    "record at {} has state {:?} with id {}",
                    v.coord, v.state, v.id
                )));
            }
            if !v.id.is_nil() && !ids.insert(v.id) {
                return Err(SimulationError::invalid(format!("duplicate voxel id {}", v.id)));
            }
            if !(v.flux.is_finite() && v.flux_rate.is_finite() && v.velocity.is_finite()) {
                return Err(SimulationError::invalid(format!(
                    "record at {} holds non-finite values",
                    v.coord
                )));
            }
        }
        Ok(())
    }
}
