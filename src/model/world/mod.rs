use crate::model::binding::BindingTracker;
use crate::model::config::SimConfig;
use crate::model::forces::FieldSample;
use crate::model::lattice::LatticeStore;
use crate::model::metrics::Metrics;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeSet, HashMap};
use trilattice_data::{Coord, Vec3};

pub mod init;
pub mod logic;
pub mod state;
pub mod update;

pub use init::initialize;

/// Per-tick working data. Cleared by the gating phase and never persisted.
#[derive(Debug, Default)]
pub(crate) struct TickScratch {
    /// Voxels whose clock fired this tick; only these move.
    pub gated: BTreeSet<Coord>,
    pub fields: Vec<(Coord, FieldSample)>,
    pub forces: HashMap<Coord, Vec3>,
}

impl TickScratch {
    pub fn clear(&mut self) {
        self.gated.clear();
        self.fields.clear();
        self.forces.clear();
    }
}

/// The owned simulation state. All mutation goes through `step`, `run_phase`
/// and the between-tick editing methods (`set_voxel`, `create_pair`,
/// `unbind`, `sanitize_non_finite`).
#[derive(Debug)]
pub struct World {
    pub(crate) config: SimConfig,
    pub tick: u64,
    pub(crate) lattice: LatticeStore,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) bindings: BindingTracker,
    pub(crate) scratch: TickScratch,
    pub metrics: Metrics,
}
