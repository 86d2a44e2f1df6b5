use crate::model::config::SimConfig;
use crate::model::error::SimulationError;
use crate::model::flux::find_non_finite;
use crate::model::lattice::LatticeStore;
use crate::model::metrics::{diagnose, LatticeDiagnostics};
use crate::model::world::World;
use rand::Rng;
use sha2::{Digest, Sha256};
use trilattice_data::{Coord, InitialState, Vec3, Voxel, VoxelState, VoxelView};
use uuid::Uuid;

impl World {
    /// The validated configuration. Fixed for the lifetime of the world;
    /// use `snapshot`/`restore` to continue under different settings.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Read-only access to the lattice.
    #[must_use]
    pub fn lattice(&self) -> &LatticeStore {
        &self.lattice
    }

    /// Total read: every coordinate yields a view. Absent, elided and
    /// absorbing out-of-range coordinates read as zero-field Void.
    #[must_use]
    pub fn get_voxel(&self, coord: Coord) -> VoxelView {
        match self.lattice.resolve(coord) {
            Some(r) => self
                .lattice
                .get(r)
                .map_or_else(|| VoxelView::void(r), Voxel::view),
            None => VoxelView::void(coord),
        }
    }

    /// Writes a site between ticks, replacing whatever was there.
    ///
    /// Manifested states receive a fresh id from the world's random stream and
    /// a charge of `±unit_charge` unless one is given. A replaced voxel loses
    /// its bindings and its partner's back-link.
    pub fn set_voxel(&mut self, coord: Coord, init: InitialState) -> Result<(), SimulationError> {
        let r = self
            .lattice
            .resolve(coord)
            .ok_or(SimulationError::OutOfBounds(coord))?;
        self.check_initial(&init)?;
        self.vacate(r);

        let voxel = if init.state.is_manifested() {
            let id = self.fresh_id();
            let charge = init
                .charge
                .unwrap_or(f64::from(init.state.sign()) * self.config.manifestation.unit_charge);
            let mut v = Voxel::manifested(r, id, init.state, init.flux, charge);
            v.velocity = init.velocity;
            v.locked = init.locked;
            v
        } else {
            Voxel::field(r, init.flux)
        };
        self.lattice.set(r, voxel)?;
        Ok(())
    }

    /// Creates a Positive voxel at `a` and a Negative voxel at `b` with linked
    /// partner ids and opposite unit charges. Returns `(positive_id,
    /// negative_id)`.
    pub fn create_pair(
        &mut self,
        a: Coord,
        b: Coord,
        flux_a: Vec3,
        flux_b: Vec3,
    ) -> Result<(Uuid, Uuid), SimulationError> {
        let ra = self.lattice.resolve(a).ok_or(SimulationError::OutOfBounds(a))?;
        let rb = self.lattice.resolve(b).ok_or(SimulationError::OutOfBounds(b))?;
        if ra == rb {
            return Err(SimulationError::invalid(format!(
                "pair members resolve to the same site {ra}"
            )));
        }
        for r in [ra, rb] {
            if self.lattice.state_at(r).is_manifested() {
                return Err(SimulationError::Occupied(r));
            }
        }
        for flux in [flux_a, flux_b] {
            if !flux.is_finite() {
                return Err(SimulationError::invalid("pair flux must be finite"));
            }
        }

        let q = self.config.manifestation.unit_charge;
        let id_a = self.fresh_id();
        let id_b = self.fresh_id();
        let mut pos = Voxel::manifested(ra, id_a, VoxelState::Positive, flux_a, q);
        pos.partner_id = Some(id_b);
        let mut neg = Voxel::manifested(rb, id_b, VoxelState::Negative, flux_b, -q);
        neg.partner_id = Some(id_a);
        self.lattice.set(ra, pos)?;
        self.lattice.set(rb, neg)?;
        tracing::debug!(positive = %ra, negative = %rb, "Pair created");
        Ok((id_a, id_b))
    }

    /// Where the partner of the voxel at `coord` currently is.
    #[must_use]
    pub fn partner_of(&self, coord: Coord) -> Option<Coord> {
        let partner = self.lattice.get(coord)?.partner_id?;
        self.lattice.coord_of(partner)
    }

    /// Releases every triad containing the voxel at `coord`. Returns the
    /// number of bound triads that were released.
    pub fn unbind(&mut self, coord: Coord) -> usize {
        self.bindings.unbind(&mut self.lattice, coord)
    }

    #[must_use]
    pub fn diagnostics(&self) -> LatticeDiagnostics {
        diagnose(&self.lattice)
    }

    /// SHA-256 over the tick, the random stream position, every stored record
    /// in coordinate order (floats by bit pattern) and the triad records.
    #[must_use]
    pub fn deterministic_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.tick.to_le_bytes());
        hasher.update(self.rng.get_word_pos().to_le_bytes());
        for v in self.lattice.iter_sorted() {
            for axis in 0..3 {
                hasher.update(v.coord.axis(axis).to_le_bytes());
            }
            hasher.update(v.id.as_bytes());
            hasher.update(v.partner_id.unwrap_or_else(Uuid::nil).as_bytes());
            hasher.update(v.state.sign().to_le_bytes());
            for vector in [v.flux, v.flux_rate, v.velocity, v.remainder] {
                for bits in vector.to_bits() {
                    hasher.update(bits.to_le_bytes());
                }
            }
            hasher.update(v.charge.to_bits().to_le_bytes());
            hasher.update(v.clock.to_bits().to_le_bytes());
            hasher.update([u8::from(v.locked)]);
        }
        for record in self.bindings.records() {
            for (c, id) in record.members {
                hasher.update(format!("{c}").as_bytes());
                hasher.update(id.as_bytes());
            }
            hasher.update(record.streak.to_le_bytes());
            hasher.update([u8::from(record.bound)]);
        }
        hex::encode(hasher.finalize())
    }

    /// Zeroes every non-finite flux, rate or velocity so a diverged world can
    /// keep running. Returns the number of records touched.
    pub fn sanitize_non_finite(&mut self) -> usize {
        let offending = find_non_finite(&self.lattice);
        for c in &offending {
            if let Some(v) = self.lattice.get_mut(*c) {
                for vector in [&mut v.flux, &mut v.flux_rate, &mut v.velocity, &mut v.remainder] {
                    if !vector.is_finite() {
                        *vector = Vec3::ZERO;
                    }
                }
            }
        }
        self.lattice.prune_elidable();
        if !offending.is_empty() {
            tracing::warn!(count = offending.len(), "Non-finite values zeroed");
        }
        offending.len()
    }

    fn fresh_id(&mut self) -> Uuid {
        loop {
            let id = Uuid::from_u128(self.rng.gen());
            if !id.is_nil() && self.lattice.coord_of(id).is_none() {
                return id;
            }
        }
    }

    fn check_initial(&self, init: &InitialState) -> Result<(), SimulationError> {
        if !init.flux.is_finite() || !init.velocity.is_finite() {
            return Err(SimulationError::invalid("flux and velocity must be finite"));
        }
        if init.charge.is_some_and(|q| !q.is_finite()) {
            return Err(SimulationError::invalid("charge must be finite"));
        }
        let limit = self.config.motion.speed_limit;
        if init.velocity.norm() > limit {
            return Err(SimulationError::invalid(format!(
                "speed {} exceeds the limit {limit}",
                init.velocity.norm()
            )));
        }
        if !init.state.is_manifested()
            && (!init.velocity.is_zero() || init.locked || init.charge.is_some())
        {
            return Err(SimulationError::invalid(
                "Void sites carry only flux: velocity, charge and lock must be unset",
            ));
        }
        Ok(())
    }

    /// Removes the record at `r`, detaching it from bindings and partners.
    fn vacate(&mut self, r: Coord) {
        if self.lattice.state_at(r).is_manifested() {
            self.bindings.unbind(&mut self.lattice, r);
        }
        if let Some(old) = self.lattice.remove(r) {
            if let Some(pid) = old.partner_id {
                self.clear_partner(pid);
            }
        }
    }

    pub(crate) fn clear_partner(&mut self, partner: Uuid) {
        if let Some(c) = self.lattice.coord_of(partner) {
            if let Some(v) = self.lattice.get_mut(c) {
                v.partner_id = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::SimConfig;
    use crate::model::lattice::BoundaryMode;
    use trilattice_data::Extent;

    fn world(boundary: BoundaryMode) -> World {
        let mut config = SimConfig::default();
        config.lattice.extent = Extent::cube(6);
        config.lattice.boundary = boundary;
        World::new(config).unwrap()
    }

    #[test]
    fn test_get_voxel_is_total() {
        let w = world(BoundaryMode::Absorbing);
        let outside = w.get_voxel(Coord::new(-3, 0, 99));
        assert_eq!(outside, VoxelView::void(Coord::new(-3, 0, 99)));
        let inside = w.get_voxel(Coord::new(1, 1, 1));
        assert_eq!(inside.state, VoxelState::Void);
        assert_eq!(inside.flux, Vec3::ZERO);
    }

    #[test]
    fn test_set_voxel_out_of_bounds() {
        let mut w = world(BoundaryMode::Absorbing);
        let err = w
            .set_voxel(Coord::new(6, 0, 0), InitialState::field(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap_err();
        assert_eq!(err, SimulationError::OutOfBounds(Coord::new(6, 0, 0)));
    }

    #[test]
    fn test_set_voxel_wraps_on_torus() {
        let mut w = world(BoundaryMode::Toroidal);
        w.set_voxel(Coord::new(-1, 0, 0), InitialState::positive(Vec3::new(2.0, 0.0, 0.0)))
            .unwrap();
        let view = w.get_voxel(Coord::new(5, 0, 0));
        assert_eq!(view.state, VoxelState::Positive);
        assert!(view.id.is_some());
        assert_eq!(w.lattice().get(Coord::new(5, 0, 0)).unwrap().charge, 1.0);
    }

    #[test]
    fn test_set_voxel_rejects_bad_input() {
        let mut w = world(BoundaryMode::Toroidal);
        let c = Coord::new(1, 1, 1);
        assert!(w
            .set_voxel(c, InitialState::field(Vec3::new(f64::NAN, 0.0, 0.0)))
            .is_err());
        assert!(w
            .set_voxel(
                c,
                InitialState::positive(Vec3::new(2.0, 0.0, 0.0)).with_velocity(Vec3::new(2.0, 0.0, 0.0))
            )
            .is_err());
        assert!(w
            .set_voxel(c, InitialState::field(Vec3::new(1.0, 0.0, 0.0)).with_velocity(Vec3::new(0.1, 0.0, 0.0)))
            .is_err());
        assert!(w.lattice().is_empty());
    }

    #[test]
    fn test_setting_void_with_zero_field_elides() {
        let mut w = world(BoundaryMode::Toroidal);
        let c = Coord::new(2, 2, 2);
        w.set_voxel(c, InitialState::negative(Vec3::new(3.0, 0.0, 0.0))).unwrap();
        w.set_voxel(c, InitialState::void()).unwrap();
        assert!(w.lattice().is_empty());
        assert_eq!(w.get_voxel(c), VoxelView::void(c));
    }

    #[test]
    fn test_create_pair_links_partners() {
        let mut w = world(BoundaryMode::Toroidal);
        let a = Coord::new(1, 1, 1);
        let b = Coord::new(3, 1, 1);
        let (pid, nid) = w
            .create_pair(a, b, Vec3::new(2.0, 0.0, 0.0), Vec3::new(-2.0, 0.0, 0.0))
            .unwrap();
        assert_ne!(pid, nid);
        assert_eq!(w.partner_of(a), Some(b));
        assert_eq!(w.partner_of(b), Some(a));
        assert_eq!(w.get_voxel(a).partner_id, Some(nid));
        assert_eq!(w.diagnostics().net_charge, 0.0);

        assert_eq!(
            w.create_pair(a, Coord::new(4, 4, 4), Vec3::ZERO, Vec3::ZERO),
            Err(SimulationError::Occupied(a))
        );
        assert!(w.create_pair(Coord::new(0, 0, 0), Coord::new(6, 6, 6), Vec3::ZERO, Vec3::ZERO).is_err());
    }

    #[test]
    fn test_replacing_partner_clears_back_link() {
        let mut w = world(BoundaryMode::Toroidal);
        let a = Coord::new(1, 1, 1);
        let b = Coord::new(3, 1, 1);
        w.create_pair(a, b, Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0))
            .unwrap();
        w.set_voxel(a, InitialState::field(Vec3::new(0.5, 0.0, 0.0))).unwrap();
        assert_eq!(w.partner_of(b), None);
        assert_eq!(w.get_voxel(b).partner_id, None);
    }

    #[test]
    fn test_hash_tracks_state() {
        let mut a = world(BoundaryMode::Toroidal);
        let mut b = world(BoundaryMode::Toroidal);
        assert_eq!(a.deterministic_hash(), b.deterministic_hash());
        a.set_voxel(Coord::new(1, 2, 3), InitialState::field(Vec3::new(0.25, 0.0, 0.0)))
            .unwrap();
        assert_ne!(a.deterministic_hash(), b.deterministic_hash());
        b.set_voxel(Coord::new(1, 2, 3), InitialState::field(Vec3::new(0.25, 0.0, 0.0)))
            .unwrap();
        assert_eq!(a.deterministic_hash(), b.deterministic_hash());
    }

    #[test]
    fn test_sanitize_zeroes_non_finite() {
        let mut w = world(BoundaryMode::Toroidal);
        let c = Coord::new(1, 1, 1);
        w.set_voxel(c, InitialState::field(Vec3::new(1.0, 0.0, 0.0))).unwrap();
        if let Some(v) = w.lattice.get_mut(c) {
            v.flux = Vec3::new(f64::INFINITY, 0.0, 0.0);
        }
        assert_eq!(w.sanitize_non_finite(), 1);
        assert!(w.lattice().is_empty());
        assert_eq!(w.sanitize_non_finite(), 0);
    }
}
