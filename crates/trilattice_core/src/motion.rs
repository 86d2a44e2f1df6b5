//! Motion and collision resolution.
//!
//! Velocity integration is per voxel. Integer movement is planned against
//! pre-move occupancy and resolved in canonical order:
//! 1. opposite-sign targets annihilate,
//! 2. same-sign targets collide elastically (the pair swaps velocities),
//! 3. moves into empty or field-only sites go to the lowest source coordinate.
//!
//! The plan is data; the world applies it.

use std::collections::{BTreeMap, BTreeSet};
use trilattice_data::{Coord, Vec3, VoxelState};

use crate::lattice::{BoundaryMode, LatticeStore};
use crate::manifestation::AnnihilationPair;

/// `v + F/m`, rescaled so that `|v| <= speed_limit`.
#[must_use]
pub fn integrate_velocity(velocity: Vec3, force: Vec3, mass_proxy: f64, speed_limit: f64) -> Vec3 {
    let v = velocity + force / mass_proxy;
    let speed = v.norm();
    if !(speed > speed_limit) {
        return v;
    }
    let mut scaled = v * (speed_limit / speed);
    // rounding in the rescale can land a few ulps above the limit
    while scaled.norm() > speed_limit {
        scaled *= 1.0 - f64::EPSILON;
    }
    scaled
}

/// Integer step implied by a remainder: ±1 on every axis whose component
/// reached ±1.
#[must_use]
pub fn step_of(remainder: Vec3) -> Coord {
    let mut step = Coord::ORIGIN;
    for axis in 0..3 {
        let r = remainder.component(axis);
        if r >= 1.0 {
            step.set_axis(axis, 1);
        } else if r <= -1.0 {
            step.set_axis(axis, -1);
        }
    }
    step
}

/// Subtracts a taken step from the remainder.
#[must_use]
pub fn consume_step(remainder: Vec3, step: Coord) -> Vec3 {
    remainder - step.to_vec3()
}

/// Zeroes the components of `v` on every axis the step touches.
pub fn zero_axes(v: &mut Vec3, step: Coord) {
    for axis in 0..3 {
        if step.axis(axis) != 0 {
            v.set_component(axis, 0.0);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOrder {
    pub source: Coord,
    pub target: Coord,
    pub step: Coord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub mover: Coord,
    pub target: Coord,
    pub step: Coord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reflection {
    pub coord: Coord,
    pub axes: [bool; 3],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovePlan {
    pub moves: Vec<MoveOrder>,
    pub elastic: Vec<Collision>,
    pub annihilations: Vec<AnnihilationPair>,
    /// Contention losers: velocity and remainder zeroed on the step axes.
    pub blocked: Vec<(Coord, Coord)>,
    /// Movers held back by another collision: remainder zeroed on the step axes.
    pub stalled: Vec<(Coord, Coord)>,
    /// Voxels leaving an absorbing lattice.
    pub exits: Vec<Coord>,
    pub reflections: Vec<Reflection>,
}

impl MovePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
            && self.elastic.is_empty()
            && self.annihilations.is_empty()
            && self.blocked.is_empty()
            && self.stalled.is_empty()
            && self.exits.is_empty()
            && self.reflections.is_empty()
    }
}

/// Cancels the step on axes that would cross a reflective face.
fn reflect(store: &LatticeStore, source: Coord, step: &mut Coord) -> Option<Reflection> {
    let extent = store.extent();
    let raw = source + *step;
    let mut axes = [false; 3];
    for (axis, flag) in axes.iter_mut().enumerate() {
        let c = raw.axis(axis);
        if step.axis(axis) != 0 && !(0..extent.axis(axis)).contains(&c) {
            step.set_axis(axis, 0);
            *flag = true;
        }
    }
    axes.iter().any(|a| *a).then_some(Reflection {
        coord: source,
        axes,
    })
}

/// Plans integer movement for `movers` (sorted, manifested).
#[must_use]
pub fn plan_moves(store: &LatticeStore, movers: &[Coord]) -> MovePlan {
    let mut plan = MovePlan::default();
    let mut opposite: Vec<Collision> = Vec::new();
    let mut same: Vec<Collision> = Vec::new();
    let mut into_empty: Vec<MoveOrder> = Vec::new();

    for &source in movers {
        let Some(voxel) = store.get(source) else {
            continue;
        };
        if !voxel.is_manifested() {
            continue;
        }
        let mut step = step_of(voxel.remainder);
        if step == Coord::ORIGIN {
            continue;
        }
        if store.boundary() == BoundaryMode::Reflective {
            if let Some(reflection) = reflect(store, source, &mut step) {
                plan.reflections.push(reflection);
            }
            if step == Coord::ORIGIN {
                continue;
            }
        }
        let Some(target) = store.resolve(source + step) else {
            plan.exits.push(source);
            continue;
        };
        if target == source {
            continue;
        }
        let occupant = store.state_at(target);
        let collision = Collision {
            mover: source,
            target,
            step,
        };
        if voxel.state.is_opposite(occupant) {
            opposite.push(collision);
        } else if occupant == voxel.state {
            same.push(collision);
        } else {
            into_empty.push(MoveOrder {
                source,
                target,
                step,
            });
        }
    }

    let mut consumed: BTreeSet<Coord> = BTreeSet::new();
    for c in opposite {
        if consumed.contains(&c.mover) || consumed.contains(&c.target) {
            plan.stalled.push((c.mover, c.step));
            continue;
        }
        consumed.insert(c.mover);
        consumed.insert(c.target);
        let mover_positive = store.state_at(c.mover) == VoxelState::Positive;
        plan.annihilations.push(if mover_positive {
            AnnihilationPair {
                positive: c.mover,
                negative: c.target,
                offset: c.step,
            }
        } else {
            AnnihilationPair {
                positive: c.target,
                negative: c.mover,
                offset: Coord::ORIGIN - c.step,
            }
        });
    }

    let mut involved: BTreeSet<Coord> = BTreeSet::new();
    for c in same {
        let busy = |x: &Coord| consumed.contains(x) || involved.contains(x);
        if busy(&c.mover) || busy(&c.target) {
            if !consumed.contains(&c.mover) {
                plan.stalled.push((c.mover, c.step));
            }
            continue;
        }
        involved.insert(c.mover);
        involved.insert(c.target);
        plan.elastic.push(c);
    }

    let mut by_target: BTreeMap<Coord, Vec<MoveOrder>> = BTreeMap::new();
    for order in into_empty {
        if consumed.contains(&order.source) {
            continue;
        }
        if involved.contains(&order.source) {
            plan.stalled.push((order.source, order.step));
            continue;
        }
        by_target.entry(order.target).or_default().push(order);
    }
    for (_, mut contenders) in by_target {
        contenders.sort_by_key(|o| o.source);
        let mut it = contenders.into_iter();
        if let Some(winner) = it.next() {
            plan.moves.push(winner);
        }
        plan.blocked.extend(it.map(|o| (o.source, o.step)));
    }
    plan.moves.sort_by_key(|o| o.source);

    audit(&mut plan);
    plan
}

/// Checks that no site is written twice. A violation means the tie-break
/// rules above are broken: it panics in debug builds and in release it is
/// logged and resolved by keeping the lowest source.
fn audit(plan: &mut MovePlan) {
    let mut claimed: BTreeSet<Coord> = BTreeSet::new();
    for pair in &plan.annihilations {
        claimed.insert(pair.positive);
        claimed.insert(pair.negative);
    }
    for c in &plan.elastic {
        claimed.insert(c.mover);
        claimed.insert(c.target);
    }

    let mut targets: BTreeSet<Coord> = BTreeSet::new();
    let mut conflicts: Vec<MoveOrder> = Vec::new();
    plan.moves.retain(|o| {
        let clash = claimed.contains(&o.source)
            || claimed.contains(&o.target)
            || !targets.insert(o.target);
        if clash {
            conflicts.push(*o);
        }
        !clash
    });

    if !conflicts.is_empty() {
        debug_assert!(
            conflicts.is_empty(),
            "collision resolution produced conflicting writes: {conflicts:?}"
        );
        tracing::error!(
            conflicts = conflicts.len(),
            "Collision tie-break failure; dropping conflicting moves"
        );
        plan.blocked
            .extend(conflicts.into_iter().map(|o| (o.source, o.step)));
    }
}
