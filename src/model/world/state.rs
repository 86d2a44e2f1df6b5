use crate::model::binding::BindingTracker;
use crate::model::error::SimulationError;
use crate::model::snapshot::{RngState, WorldSnapshot, SNAPSHOT_VERSION};
use crate::model::world::World;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

impl World {
    /// Captures everything needed to continue this world elsewhere with
    /// bit-identical results. Only valid between ticks.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            fingerprint: self.config.fingerprint(),
            tick: self.tick,
            rng: RngState {
                seed: self.config.lattice.seed,
                word_pos: self.rng.get_word_pos(),
            },
            voxels: self.lattice.iter_sorted().into_iter().cloned().collect(),
            triads: self.bindings.records(),
        }
    }

    /// Rebuilds a world from a snapshot after validating it.
    pub fn restore(snapshot: WorldSnapshot) -> Result<World, SimulationError> {
        snapshot.validate()?;
        let WorldSnapshot {
            config,
            tick,
            rng,
            voxels,
            triads,
            ..
        } = snapshot;

        let mut world = World::new(config)?;
        world.tick = tick;
        let mut stream = ChaCha8Rng::seed_from_u64(rng.seed);
        stream.set_word_pos(rng.word_pos);
        world.rng = stream;
        for voxel in voxels {
            let c = voxel.coord;
            world.lattice.set(c, voxel)?;
        }
        world.bindings = BindingTracker::from_records(triads);
        tracing::debug!(tick, stored = world.lattice.len(), "World restored");
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::config::SimConfig;
    use crate::model::error::SimulationError;
    use crate::model::world::World;
    use trilattice_data::{Coord, Extent, InitialState, Vec3};

    #[test]
    fn test_snapshot_restore_preserves_hash() {
        let mut config = SimConfig::default();
        config.lattice.extent = Extent::cube(6);
        config.lattice.seed = 11;
        let mut world = World::new(config).unwrap();
        world
            .set_voxel(Coord::new(3, 3, 3), InitialState::positive(Vec3::new(2.0, 1.0, 0.0)))
            .unwrap();
        world.step().unwrap();

        let restored = World::restore(world.snapshot()).unwrap();
        assert_eq!(restored.tick, world.tick);
        assert_eq!(restored.deterministic_hash(), world.deterministic_hash());
    }

    #[test]
    fn test_restore_rejects_out_of_range_record() {
        let mut config = SimConfig::default();
        config.lattice.extent = Extent::cube(4);
        let world = World::new(config).unwrap();
        let mut snapshot = world.snapshot();
        snapshot
            .voxels
            .push(trilattice_data::Voxel::field(Coord::new(9, 0, 0), Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(
            World::restore(snapshot).unwrap_err(),
            SimulationError::OutOfBounds(Coord::new(9, 0, 0))
        );
    }
}
