#![allow(dead_code)]

use trilattice_lib::model::config::{ForceCoefficients, SimConfig};
use trilattice_lib::model::lattice::BoundaryMode;
use trilattice_lib::model::world::World;
use trilattice_data::{Coord, Extent, InitialState, Vec3};

pub mod macros;

/// Builds small worlds for integration tests. Edits are applied in the order
/// they were added, after the world has been created.
pub struct WorldBuilder {
    config: SimConfig,
    voxels: Vec<(Coord, InitialState)>,
    pairs: Vec<(Coord, Coord, Vec3, Vec3)>,
}

impl WorldBuilder {
    pub fn new() -> Self {
        let mut config = SimConfig::default();
        config.lattice.extent = Extent::cube(8);
        config.lattice.seed = 42;
        Self {
            config,
            voxels: Vec::new(),
            pairs: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.lattice.seed = seed;
        self
    }

    pub fn with_extent(mut self, n: i32) -> Self {
        self.config.lattice.extent = Extent::cube(n);
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryMode) -> Self {
        self.config.lattice.boundary = boundary;
        self
    }

    pub fn with_threshold(mut self, k_b: f64) -> Self {
        self.config.manifestation.threshold = k_b;
        self
    }

    /// No forces, no transmutation and no decay: matter only moves if it
    /// was given a velocity.
    pub fn quiet(mut self) -> Self {
        self.config.forces = ForceCoefficients::inert();
        self.config.manifestation.decay_factor = 1.0;
        self
    }

    pub fn with_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut SimConfig),
    {
        f(&mut self.config);
        self
    }

    pub fn with_voxel(mut self, coord: Coord, init: InitialState) -> Self {
        self.voxels.push((coord, init));
        self
    }

    pub fn with_field(self, coord: Coord, flux: Vec3) -> Self {
        self.with_voxel(coord, InitialState::field(flux))
    }

    pub fn with_pair(mut self, a: Coord, b: Coord, flux_a: Vec3, flux_b: Vec3) -> Self {
        self.pairs.push((a, b, flux_a, flux_b));
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn build(self) -> World {
        let mut world = World::new(self.config).expect("Failed to create world in test builder");
        for (coord, init) in self.voxels {
            world
                .set_voxel(coord, init)
                .unwrap_or_else(|e| panic!("set_voxel({coord}) failed: {e}"));
        }
        for (a, b, fa, fb) in self.pairs {
            world
                .create_pair(a, b, fa, fb)
                .unwrap_or_else(|e| panic!("create_pair({a}, {b}) failed: {e}"));
        }
        world
    }
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A dense Void pulse with a radial field around it. Dense enough that
/// genesis fires within a few ticks.
pub fn radial_pulse(builder: WorldBuilder, center: Coord, k_b: f64) -> WorldBuilder {
    let mut builder = builder.with_field(center, Vec3::new(0.0, 0.0, 4.0 * k_b));
    for axis in 0..3 {
        for sign in [-1, 1] {
            let mut flux = Vec3::ZERO;
            flux.set_component(axis, f64::from(sign) * 2.0 * k_b);
            builder = builder.with_field(center + Coord::unit(axis, sign), flux);
        }
    }
    builder
}

/// Runs `ticks` steps, failing the test on any error.
pub fn run(world: &mut World, ticks: u64) {
    for _ in 0..ticks {
        world
            .step()
            .unwrap_or_else(|e| panic!("step {} failed: {e}", world.tick));
    }
}
