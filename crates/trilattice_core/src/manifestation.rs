//! Manifestation state machine.
//!
//! Void ↔ Positive / Negative transitions, evaluated once per tick against
//! the post-decay snapshot:
//! - annihilation of face-adjacent opposite pairs, with their combined flux
//!   magnitude spread over the surviving face neighbours,
//! - evaporation of unlocked matter whose density fell below K_B,
//! - genesis of matter in dense Void field, polarity from the divergence.
//!
//! There is no rule that turns Positive into Negative directly.

use rand::Rng;
use std::collections::BTreeSet;
use trilattice_data::{Coord, Vec3, Voxel, VoxelState};
use uuid::Uuid;

use crate::config::ManifestationConfig;
use crate::lattice::LatticeStore;
use crate::neighborhood::{divergence, FACE_OFFSETS};

/// p = clamp(1 − exp(−(ρ − K_B)/K_B), 0, 1)
#[must_use]
pub fn genesis_probability(density: f64, threshold: f64) -> f64 {
    if !(density > threshold) {
        return 0.0;
    }
    let p = 1.0 - (-(density - threshold) / threshold).exp();
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Multiplies the flux of every unlocked manifested voxel by `factor`.
pub fn decay(store: &mut LatticeStore, factor: f64) -> usize {
    let mut decayed = 0;
    for c in store.manifested_coords() {
        if let Some(v) = store.get_mut(c) {
            if !v.locked {
                v.flux *= factor;
                decayed += 1;
            }
        }
    }
    decayed
}

/// An annihilating pair. `offset` is `negative - positive` before wrapping,
/// so the redistribution geometry is the same on every boundary mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnihilationPair {
    pub positive: Coord,
    pub negative: Coord,
    pub offset: Coord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnihilationRecord {
    pub positive: Coord,
    pub negative: Coord,
    /// |J_p| + |J_n| before the event.
    pub magnitude: f64,
    /// Measured rise in the recipients' total |J|.
    pub deposited: f64,
    pub recipients: Vec<Coord>,
}

impl AnnihilationRecord {
    /// Whether the redistribution matched the consumed magnitude.
    #[must_use]
    pub fn is_conserved(&self, tolerance: f64) -> bool {
        (self.deposited - self.magnitude).abs() <= tolerance * self.magnitude.max(1.0)
    }
}

/// Greedy face-adjacent pairing in canonical order: Positive voxels sorted,
/// neighbours checked -x, +x, -y, +y, -z, +z, first unpaired Negative wins.
#[must_use]
pub fn find_annihilation_pairs(store: &LatticeStore) -> Vec<AnnihilationPair> {
    let mut taken: BTreeSet<Coord> = BTreeSet::new();
    let mut pairs = Vec::new();
    for p in store.manifested_coords() {
        if store.state_at(p) != VoxelState::Positive || taken.contains(&p) {
            continue;
        }
        for d in &FACE_OFFSETS {
            let Some(n) = store.resolve(p + *d) else {
                continue;
            };
            if n == p || taken.contains(&n) || store.state_at(n) != VoxelState::Negative {
                continue;
            }
            taken.insert(p);
            taken.insert(n);
            pairs.push(AnnihilationPair {
                positive: p,
                negative: n,
                offset: *d,
            });
            break;
        }
    }
    pairs
}

/// Recipients of a pair's flux with their outward unit directions.
fn recipients(
    store: &LatticeStore,
    pair: &AnnihilationPair,
    excluded: &BTreeSet<Coord>,
) -> Vec<(Coord, Vec3)> {
    let a = pair.positive;
    let midpoint = pair.offset.to_vec3() * 0.5;
    let mut out: Vec<(Coord, Vec3)> = Vec::new();
    for base in [Coord::ORIGIN, pair.offset] {
        for d in &FACE_OFFSETS {
            let raw = base + *d;
            if raw == Coord::ORIGIN || raw == pair.offset {
                continue;
            }
            let Some(r) = store.resolve(a + raw) else {
                continue;
            };
            if excluded.contains(&r) || out.iter().any(|(c, _)| *c == r) {
                continue;
            }
            out.push((r, (raw.to_vec3() - midpoint).unit_or_zero()));
        }
    }
    out
}

/// Clears every pair and spreads each pair's combined magnitude equally over
/// its surviving face neighbours. An empty recipient takes its share along the
/// outward direction from the pair's midpoint; one that already carries flux
/// has its |J| grown by the share without turning. Members of any pair in
/// `pairs` never receive flux. Partners of annihilated voxels lose their
/// partner link.
pub fn annihilate(store: &mut LatticeStore, pairs: &[AnnihilationPair]) -> Vec<AnnihilationRecord> {
    let excluded: BTreeSet<Coord> = pairs
        .iter()
        .flat_map(|p| [p.positive, p.negative])
        .collect();

    let mut records = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let targets = recipients(store, pair, &excluded);
        let mut magnitude = 0.0;
        let mut partners = Vec::new();
        for c in [pair.positive, pair.negative] {
            if let Some(v) = store.remove(c) {
                magnitude += v.density();
                partners.extend(v.partner_id);
            }
        }
        for pid in partners {
            release_partner(store, Some(pid));
        }

        let held = |store: &LatticeStore| -> f64 {
            targets.iter().map(|(c, _)| store.density_at(*c)).sum()
        };
        let before = held(store);
        if !targets.is_empty() && magnitude > 0.0 {
            let share = magnitude / targets.len() as f64;
            for (c, outward) in &targets {
                match store.get_mut(*c) {
                    Some(v) => {
                        // Existing flux grows along its own direction.
                        let own = v.flux.unit_or_zero();
                        let dir = if own == Vec3::ZERO { *outward } else { own };
                        v.flux += dir * share;
                    }
                    None => {
                        let _ = store.set(*c, Voxel::field(*c, *outward * share));
                    }
                }
            }
        }
        let deposited = held(store) - before;

        records.push(AnnihilationRecord {
            positive: pair.positive,
            negative: pair.negative,
            magnitude,
            deposited,
            recipients: targets.into_iter().map(|(c, _)| c).collect(),
        });
    }
    records
}

/// Clears the back-link held by the voxel whose id is `partner`.
fn release_partner(store: &mut LatticeStore, partner: Option<Uuid>) {
    if let Some(pid) = partner {
        if let Some(pc) = store.coord_of(pid) {
            if let Some(v) = store.get_mut(pc) {
                v.partner_id = None;
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistenceOutcome {
    pub annihilations: Vec<AnnihilationRecord>,
    /// (coordinate, id the voxel had)
    pub evaporated: Vec<(Coord, Uuid)>,
    pub genesis: Vec<(Coord, VoxelState, Uuid)>,
}

/// Runs annihilation, evaporation and genesis for one tick.
///
/// Genesis candidates and their divergence are taken from the store as it
/// was on entry, before any of this phase's writes. Random draws are taken
/// in coordinate order, one per eligible candidate plus one id per success.
pub fn resolve_existence<R: Rng>(
    store: &mut LatticeStore,
    config: &ManifestationConfig,
    rng: &mut R,
) -> ExistenceOutcome {
    let k_b = config.threshold;

    let candidates: Vec<(Coord, f64, f64)> = store
        .iter_sorted()
        .into_iter()
        .filter(|v| v.state == VoxelState::Void)
        .filter_map(|v| {
            let rho = v.density();
            if !(rho > k_b) {
                return None;
            }
            let div = divergence(v.coord, |u| store.flux_at(u));
            Some((v.coord, rho, div))
        })
        .collect();

    let pairs = find_annihilation_pairs(store);
    let annihilations = annihilate(store, &pairs);

    let mut evaporated = Vec::new();
    for c in store.manifested_coords() {
        let Some(v) = store.get(c) else { continue };
        if v.locked || v.density() >= k_b {
            continue;
        }
        let partner = v.partner_id;
        if let Some(id) = store.dissolve(c) {
            evaporated.push((c, id));
        }
        release_partner(store, partner);
    }

    let mut genesis = Vec::new();
    for (c, rho, div) in candidates {
        let state = VoxelState::from_divergence(div);
        if state == VoxelState::Void || !div.is_finite() {
            continue;
        }
        let p = genesis_probability(rho, k_b);
        let draw: f64 = rng.gen();
        if draw >= p {
            continue;
        }
        let id = Uuid::from_u128(rng.gen());
        let Some(current) = store.get(c).cloned() else {
            continue;
        };
        let charge = f64::from(state.sign()) * config.unit_charge;
        let mut born = Voxel::manifested(c, id, state, current.flux, charge);
        born.flux_rate = current.flux_rate;
        if store.set(c, born).is_ok() {
            genesis.push((c, state, id));
        }
    }

    tracing::debug!(
        annihilations = annihilations.len(),
        evaporated = evaporated.len(),
        genesis = genesis.len(),
        "Existence resolved"
    );
    ExistenceOutcome {
        annihilations,
        evaporated,
        genesis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::BoundaryMode;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use trilattice_data::Extent;

    fn matter(store: &mut LatticeStore, c: Coord, state: VoxelState, flux: Vec3, id: u128) {
        let charge = f64::from(state.sign());
        store
            .set(c, Voxel::manifested(c, Uuid::from_u128(id), state, flux, charge))
            .unwrap();
    }

    #[test]
    fn test_genesis_probability_shape() {
        assert_eq!(genesis_probability(0.5, 1.0), 0.0);
        assert_eq!(genesis_probability(1.0, 1.0), 0.0);
        let p = genesis_probability(2.0, 1.0);
        assert!((p - (1.0 - (-1.0f64).exp())).abs() < 1e-15);
        assert_eq!(genesis_probability(f64::INFINITY, 1.0), 1.0);
        assert!(genesis_probability(1e6, 1.0) <= 1.0);
    }

    #[test]
    fn test_locked_voxels_skip_decay() {
        let mut store = LatticeStore::new(Extent::cube(4), BoundaryMode::Toroidal);
        matter(&mut store, Coord::new(1, 1, 1), VoxelState::Positive, Vec3::new(2.0, 0.0, 0.0), 1);
        matter(&mut store, Coord::new(2, 2, 2), VoxelState::Positive, Vec3::new(2.0, 0.0, 0.0), 2);
        if let Some(v) = store.get_mut(Coord::new(2, 2, 2)) {
            v.locked = true;
        }
        assert_eq!(decay(&mut store, 0.5), 1);
        assert_eq!(store.flux_at(Coord::new(1, 1, 1)), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(store.flux_at(Coord::new(2, 2, 2)), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_annihilation_conserves_magnitude() {
        let mut store = LatticeStore::new(Extent::cube(7), BoundaryMode::Absorbing);
        let p = Coord::new(3, 3, 3);
        let n = Coord::new(4, 3, 3);
        matter(&mut store, p, VoxelState::Positive, Vec3::new(0.0, 2.0, 0.0), 1);
        matter(&mut store, n, VoxelState::Negative, Vec3::new(0.0, 0.0, -3.0), 2);

        let pairs = find_annihilation_pairs(&store);
        assert_eq!(pairs.len(), 1);
        let records = annihilate(&mut store, &pairs);
        let record = &records[0];

        assert_eq!(record.recipients.len(), 10);
        assert!((record.magnitude - 5.0).abs() < 1e-12);
        assert!(record.is_conserved(1e-9));
        assert_eq!(store.state_at(p), VoxelState::Void);
        assert_eq!(store.state_at(n), VoxelState::Void);
        assert_eq!(store.flux_at(p), Vec3::ZERO);

        let spread: f64 = record.recipients.iter().map(|c| store.density_at(*c)).sum();
        assert!((spread - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_redistribution_points_outward() {
        let mut store = LatticeStore::new(Extent::cube(7), BoundaryMode::Toroidal);
        let p = Coord::new(3, 3, 3);
        matter(&mut store, p, VoxelState::Positive, Vec3::new(1.0, 0.0, 0.0), 1);
        matter(&mut store, Coord::new(3, 3, 4), VoxelState::Negative, Vec3::new(1.0, 0.0, 0.0), 2);
        let pairs = find_annihilation_pairs(&store);
        annihilate(&mut store, &pairs);

        let below = store.flux_at(Coord::new(3, 3, 2));
        assert!(below.z < 0.0 && below.x == 0.0 && below.y == 0.0);
        let above = store.flux_at(Coord::new(3, 3, 5));
        assert!(above.z > 0.0);
        let side = store.flux_at(Coord::new(4, 3, 3));
        assert!(side.x > 0.0 && side.z < 0.0);
    }

    #[test]
    fn test_opposing_recipient_flux_keeps_magnitude() {
        let mut store = LatticeStore::new(Extent::cube(7), BoundaryMode::Absorbing);
        let p = Coord::new(3, 3, 3);
        let n = Coord::new(4, 3, 3);
        matter(&mut store, p, VoxelState::Positive, Vec3::new(2.0, 0.0, 0.0), 1);
        matter(&mut store, n, VoxelState::Negative, Vec3::new(2.0, 0.0, 0.0), 2);
        // Outward from the pair at (3,3,2) is mostly -z; this field opposes it.
        let below = Coord::new(3, 3, 2);
        store.set(below, Voxel::field(below, Vec3::new(0.0, 0.0, 0.5))).unwrap();

        let pairs = find_annihilation_pairs(&store);
        let records = annihilate(&mut store, &pairs);
        let record = &records[0];

        assert!(record.is_conserved(1e-9));
        assert!((record.deposited - 4.0).abs() < 1e-9);
        let grown = store.flux_at(below);
        assert_eq!(grown.x, 0.0);
        assert_eq!(grown.y, 0.0);
        assert!((grown.z - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_pairing_is_one_to_one() {
        let mut store = LatticeStore::new(Extent::cube(7), BoundaryMode::Toroidal);
        matter(&mut store, Coord::new(2, 3, 3), VoxelState::Positive, Vec3::new(5.0, 0.0, 0.0), 1);
        matter(&mut store, Coord::new(3, 3, 3), VoxelState::Negative, Vec3::new(5.0, 0.0, 0.0), 2);
        matter(&mut store, Coord::new(4, 3, 3), VoxelState::Positive, Vec3::new(5.0, 0.0, 0.0), 3);

        let pairs = find_annihilation_pairs(&store);
        assert_eq!(
            pairs,
            vec![AnnihilationPair {
                positive: Coord::new(2, 3, 3),
                negative: Coord::new(3, 3, 3),
                offset: Coord::new(1, 0, 0),
            }]
        );
    }

    #[test]
    fn test_evaporation_below_threshold() {
        let mut store = LatticeStore::new(Extent::cube(5), BoundaryMode::Absorbing);
        let weak = Coord::new(1, 1, 1);
        let held = Coord::new(3, 3, 3);
        matter(&mut store, weak, VoxelState::Positive, Vec3::new(0.5, 0.0, 0.0), 1);
        matter(&mut store, held, VoxelState::Negative, Vec3::new(0.5, 0.0, 0.0), 2);
        if let Some(v) = store.get_mut(held) {
            v.locked = true;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = resolve_existence(&mut store, &ManifestationConfig::default(), &mut rng);

        assert_eq!(outcome.evaporated, vec![(weak, Uuid::from_u128(1))]);
        assert_eq!(store.state_at(weak), VoxelState::Void);
        assert_eq!(store.flux_at(weak), Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(store.state_at(held), VoxelState::Negative);
    }

    #[test]
    fn test_genesis_takes_divergence_sign() {
        // A source-like field around `c`: outward flux on the +x and -x faces.
        let mut store = LatticeStore::new(Extent::cube(7), BoundaryMode::Absorbing);
        let c = Coord::new(3, 3, 3);
        store.set(c, Voxel::field(c, Vec3::new(0.0, 50.0, 0.0))).unwrap();
        let right = Coord::new(4, 3, 3);
        let left = Coord::new(2, 3, 3);
        store.set(right, Voxel::field(right, Vec3::new(0.5, 0.0, 0.0))).unwrap();
        store.set(left, Voxel::field(left, Vec3::new(-0.5, 0.0, 0.0))).unwrap();

        let config = ManifestationConfig {
            threshold: 1.0,
            ..Default::default()
        };
        // p = 1 - e^-49, so any draw manifests.
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let outcome = resolve_existence(&mut store, &config, &mut rng);

        assert_eq!(outcome.genesis.len(), 1);
        assert_eq!(outcome.genesis[0].0, c);
        assert_eq!(outcome.genesis[0].1, VoxelState::Positive);
        let born = store.get(c).unwrap();
        assert_eq!(born.charge, 1.0);
        assert_eq!(store.coord_of(born.id), Some(c));
    }

    #[test]
    fn test_zero_divergence_never_manifests() {
        let mut store = LatticeStore::new(Extent::cube(5), BoundaryMode::Absorbing);
        let c = Coord::new(2, 2, 2);
        store.set(c, Voxel::field(c, Vec3::new(100.0, 0.0, 0.0))).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let outcome = resolve_existence(&mut store, &ManifestationConfig::default(), &mut rng);
        assert!(outcome.genesis.is_empty());
        assert_eq!(store.state_at(c), VoxelState::Void);
    }
}
