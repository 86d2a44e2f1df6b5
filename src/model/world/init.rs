use crate::model::binding::BindingTracker;
use crate::model::config::{ForceCoefficients, SimConfig};
use crate::model::error::ConfigError;
use crate::model::lattice::{BoundaryMode, LatticeStore};
use crate::model::metrics::Metrics;
use crate::model::world::{TickScratch, World};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use trilattice_data::Extent;

/// Creates an empty world with default coefficients for everything not
/// named here.
pub fn initialize(
    extent: Extent,
    boundary: BoundaryMode,
    seed: u64,
    k_b: f64,
    forces: ForceCoefficients,
) -> Result<World, ConfigError> {
    let mut config = SimConfig::default();
    config.lattice.extent = extent;
    config.lattice.boundary = boundary;
    config.lattice.seed = seed;
    config.manifestation.threshold = k_b;
    config.forces = forces;
    World::new(config)
}

impl World {
    /// Validates `config` and builds an empty lattice with a freshly seeded
    /// random stream.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if !config.is_wave_stable() {
            tracing::warn!(
                wave_speed_sq = config.flux.wave_speed_sq,
                "Wave speed is above the stability limit; propagation may diverge"
            );
        }

        let lattice = LatticeStore::new(config.lattice.extent, config.lattice.boundary);
        let rng = ChaCha8Rng::seed_from_u64(config.lattice.seed);
        tracing::debug!(
            extent = %config.lattice.extent,
            boundary = %config.lattice.boundary,
            seed = config.lattice.seed,
            "World initialized"
        );

        Ok(Self {
            config,
            tick: 0,
            lattice,
            rng,
            bindings: BindingTracker::new(),
            scratch: TickScratch::default(),
            metrics: Metrics::new(),
        })
    }

    /// Parses and validates a `trilattice.toml` document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::new(SimConfig::from_toml(content)?)
    }
}
