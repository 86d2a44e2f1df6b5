//! Force accumulation.
//!
//! Forces are pure functions of the field snapshot taken after propagation.
//! The set of force terms is closed: every [`ForceKind`] is evaluated the same
//! way and summed into a per-voxel accumulator.

use rayon::prelude::*;
use std::collections::HashMap;
use trilattice_data::{Coord, Vec3, Voxel, VoxelState};
use uuid::Uuid;

use crate::config::ForceCoefficients;
use crate::lattice::LatticeStore;
use crate::neighborhood::{curl, divergence, face_average, gradient, moore_offsets};

/// Local field quantities around one voxel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldSample {
    pub density: f64,
    /// ∇ of the face-averaged density ρ̄.
    pub smoothed_density_gradient: Vec3,
    /// ∇ of the face-averaged charge.
    pub charge_gradient: Vec3,
    pub divergence: f64,
    pub curl: Vec3,
    /// ∇ρ without smoothing, used for stress.
    pub density_gradient: Vec3,
}

impl FieldSample {
    /// stress(v) = |∇·J| + |∇×J| + |∇ρ|
    #[must_use]
    pub fn stress(&self) -> f64 {
        self.divergence.abs() + self.curl.norm() + self.density_gradient.norm()
    }
}

/// Reads cells up to two steps from `at`: the smoothed gradients difference
/// face averages taken one step out. Matter therefore responds to a change
/// two cells away within the tick it happens.
#[must_use]
pub fn sample_fields(store: &LatticeStore, at: Coord) -> FieldSample {
    let density = |c: Coord| store.density_at(c);
    let charge = |c: Coord| store.charge_at(c);
    let flux = |c: Coord| store.flux_at(c);
    FieldSample {
        density: store.density_at(at),
        smoothed_density_gradient: gradient(at, |c| face_average(c, density)),
        charge_gradient: gradient(at, |c| face_average(c, charge)),
        divergence: divergence(at, flux),
        curl: curl(at, flux),
        density_gradient: gradient(at, density),
    }
}

/// Samples every coordinate in `coords` in parallel, preserving order.
#[must_use]
pub fn sample_all(store: &LatticeStore, coords: &[Coord]) -> Vec<(Coord, FieldSample)> {
    coords
        .par_iter()
        .map(|&c| (c, sample_fields(store, c)))
        .collect()
}

/// g² · e^{−m r} / r² · (1 + m r)
#[must_use]
pub fn yukawa(coupling: f64, mass: f64, r: f64) -> f64 {
    coupling * coupling * (-mass * r).exp() / (r * r) * (1.0 + mass * r)
}

/// Everything a force term may read.
pub struct ForceContext<'a> {
    pub store: &'a LatticeStore,
    pub voxel: &'a Voxel,
    pub fields: &'a FieldSample,
    pub coefficients: &'a ForceCoefficients,
}

/// The closed set of vector force terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForceKind {
    DensityGradient,
    ChargeGradient,
    Curl,
    ShortRange,
}

impl ForceKind {
    pub const ALL: [ForceKind; 4] = [
        ForceKind::DensityGradient,
        ForceKind::ChargeGradient,
        ForceKind::Curl,
        ForceKind::ShortRange,
    ];

    #[must_use]
    pub fn evaluate(self, ctx: &ForceContext<'_>) -> Vec3 {
        let k = ctx.coefficients;
        match self {
            ForceKind::DensityGradient => ctx.fields.smoothed_density_gradient * k.density,
            ForceKind::ChargeGradient => ctx.fields.charge_gradient * (-k.charge * ctx.voxel.charge),
            ForceKind::Curl => {
                let dir = ctx.voxel.flux.unit_or_zero();
                if dir.is_zero() {
                    return Vec3::ZERO;
                }
                ctx.fields.curl.cross(dir) * k.curl
            }
            ForceKind::ShortRange => {
                if k.short_range_coupling == 0.0 {
                    return Vec3::ZERO;
                }
                let mut total = Vec3::ZERO;
                for d in moore_offsets() {
                    let Some(other) = ctx.store.get(ctx.voxel.coord + d) else {
                        continue;
                    };
                    if other.coord == ctx.voxel.coord || other.state != ctx.voxel.state {
                        continue;
                    }
                    let offset = d.to_vec3();
                    let r = offset.norm();
                    let magnitude = yukawa(k.short_range_coupling, k.short_range_mass, r);
                    total += offset * (magnitude / r);
                }
                total
            }
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ForceKind::DensityGradient => "density_gradient",
            ForceKind::ChargeGradient => "charge_gradient",
            ForceKind::Curl => "curl",
            ForceKind::ShortRange => "short_range",
        }
    }
}

/// Net force on one voxel.
#[must_use]
pub fn net_force(ctx: &ForceContext<'_>) -> Vec3 {
    ForceKind::ALL.iter().map(|kind| kind.evaluate(ctx)).sum()
}

/// Force on every sampled manifested voxel, in sample order.
#[must_use]
pub fn accumulate(
    store: &LatticeStore,
    samples: &[(Coord, FieldSample)],
    coefficients: &ForceCoefficients,
) -> HashMap<Coord, Vec3> {
    samples
        .par_iter()
        .filter_map(|(c, fields)| {
            let voxel = store.get(*c)?;
            if !voxel.is_manifested() {
                return None;
            }
            let ctx = ForceContext {
                store,
                voxel,
                fields,
                coefficients,
            };
            Some((*c, net_force(&ctx)))
        })
        .collect()
}

/// A polarity flip driven by field stress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transmutation {
    pub coord: Coord,
    pub id: Uuid,
    pub from: VoxelState,
    pub to: VoxelState,
    pub stress: f64,
}

/// Flips every unlocked manifested voxel whose stress exceeds `threshold`,
/// negating its charge. All stresses are sampled before the first flip.
pub fn transmute(store: &mut LatticeStore, threshold: f64) -> Vec<Transmutation> {
    let coords: Vec<Coord> = store
        .manifested_coords()
        .into_iter()
        .filter(|c| store.get(*c).is_some_and(|v| !v.locked))
        .collect();
    let stressed: Vec<(Coord, f64)> = sample_all(store, &coords)
        .into_iter()
        .map(|(c, s)| (c, s.stress()))
        .filter(|(_, stress)| *stress > threshold)
        .collect();

    let mut flipped = Vec::with_capacity(stressed.len());
    for (c, stress) in stressed {
        let Some(v) = store.get_mut(c) else { continue };
        let from = v.state;
        v.state = from.opposite();
        v.charge = -v.charge;
        flipped.push(Transmutation {
            coord: c,
            id: v.id,
            from,
            to: v.state,
            stress,
        });
    }
    flipped
}
