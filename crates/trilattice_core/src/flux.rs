//! Flux propagation.
//!
//! The flux field obeys a damped discrete wave equation, integrated with the
//! position-first symplectic Euler scheme:
//!
//! ```text
//! J(t+1) = J(t) + Ĵ(t)
//! Ĵ(t+1) = (1 − γ)·Ĵ(t) + c²·∇²J(t+1)
//! ```
//!
//! A field with zero rate is left untouched by its first propagation, and a
//! perturbation reaches at most one cell further per tick. On closed
//! lattices `Σ∇²J = 0`, so `ΣJ` is conserved whenever `ΣĴ` starts at zero.

use rayon::prelude::*;
use std::collections::HashMap;
use trilattice_data::{Coord, Vec3, Voxel};

use crate::config::FluxConfig;
use crate::lattice::LatticeStore;
use crate::neighborhood::{vector_laplacian, FACE_OFFSETS};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagationOutcome {
    /// Sites evaluated this tick.
    pub active: usize,
    /// Field carriers dropped because flux and rate both reached zero.
    pub pruned: usize,
    /// Sorted coordinates holding non-finite flux, rate or velocity.
    pub non_finite: Vec<Coord>,
}

/// Stored sites plus their in-range face neighbours, sorted.
#[must_use]
pub fn active_sites(store: &LatticeStore) -> Vec<Coord> {
    let stored = store.sorted_coords();
    let mut active = Vec::with_capacity(stored.len() * 7);
    for c in &stored {
        active.push(*c);
        for d in &FACE_OFFSETS {
            if let Some(r) = store.resolve(*c + *d) {
                active.push(r);
            }
        }
    }
    active.sort_unstable();
    active.dedup();
    active
}

/// Advances the flux field by one tick.
pub fn propagate(store: &mut LatticeStore, config: &FluxConfig) -> PropagationOutcome {
    let active = active_sites(store);

    let next_flux: HashMap<Coord, Vec3> = store
        .iter_sorted()
        .into_iter()
        .map(|v| (v.coord, v.flux + v.flux_rate))
        .collect();

    let c2 = config.wave_speed_sq;
    let keep = 1.0 - config.wave_damping;
    let reader: &LatticeStore = store;
    let updates: Vec<(Coord, Vec3, Vec3)> = active
        .par_iter()
        .map(|&c| {
            let sample = |u: Coord| {
                reader
                    .resolve(u)
                    .and_then(|r| next_flux.get(&r).copied())
                    .unwrap_or(Vec3::ZERO)
            };
            let flux = next_flux.get(&c).copied().unwrap_or(Vec3::ZERO);
            let rate = reader.flux_rate_at(c) * keep + vector_laplacian(c, sample) * c2;
            (c, flux, rate)
        })
        .collect();

    for (c, flux, rate) in updates {
        match store.get_mut(c) {
            Some(v) => {
                v.flux = flux;
                v.flux_rate = rate;
            }
            None => {
                if flux.is_zero() && rate.is_zero() {
                    continue;
                }
                let mut carrier = Voxel::field(c, flux);
                carrier.flux_rate = rate;
                // c came from resolve(), so the write cannot fall outside
                let _ = store.set(c, carrier);
            }
        }
    }

    let non_finite = find_non_finite(store);
    let pruned = store.prune_elidable();
    tracing::debug!(
        active = active.len(),
        pruned,
        non_finite = non_finite.len(),
        "Flux propagated"
    );
    PropagationOutcome {
        active: active.len(),
        pruned,
        non_finite,
    }
}

/// Coordinates of every stored voxel with a non-finite flux, rate or velocity.
#[must_use]
pub fn find_non_finite(store: &LatticeStore) -> Vec<Coord> {
    store
        .iter_sorted()
        .into_iter()
        .filter(|v| !(v.flux.is_finite() && v.flux_rate.is_finite() && v.velocity.is_finite()))
        .map(|v| v.coord)
        .collect()
}

/// Net flux ΣJ over the store.
#[must_use]
pub fn net_flux(store: &LatticeStore) -> Vec3 {
    store.iter_sorted().into_iter().map(|v| v.flux).sum()
}

/// Σ|J| over the store.
#[must_use]
pub fn total_flux_magnitude(store: &LatticeStore) -> f64 {
    store.iter_sorted().into_iter().map(Voxel::density).sum()
}
