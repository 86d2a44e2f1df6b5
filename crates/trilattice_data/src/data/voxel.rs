use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coord::Coord;
use super::vector::Vec3;

/// Tri-valued manifestation state of a lattice site.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, PartialEq, Eq, Hash))]
pub enum VoxelState {
    /// Empty site, possibly carrying field.
    #[default]
    Void,
    /// Matter.
    Positive,
    /// Antimatter.
    Negative,
}

impl VoxelState {
    #[must_use]
    pub fn is_manifested(self) -> bool {
        !matches!(self, VoxelState::Void)
    }

    /// +1, -1 or 0. Used for net charge bookkeeping and genesis polarity.
    #[must_use]
    pub fn sign(self) -> i32 {
        match self {
            VoxelState::Void => 0,
            VoxelState::Positive => 1,
            VoxelState::Negative => -1,
        }
    }

    #[must_use]
    pub fn opposite(self) -> VoxelState {
        match self {
            VoxelState::Void => VoxelState::Void,
            VoxelState::Positive => VoxelState::Negative,
            VoxelState::Negative => VoxelState::Positive,
        }
    }

    /// Polarity picked by a divergence value; zero (or NaN) gives `Void`.
    #[must_use]
    pub fn from_divergence(div: f64) -> VoxelState {
        if div > 0.0 {
            VoxelState::Positive
        } else if div < 0.0 {
            VoxelState::Negative
        } else {
            VoxelState::Void
        }
    }

    #[must_use]
    pub fn is_opposite(self, other: VoxelState) -> bool {
        self.is_manifested() && other == self.opposite()
    }
}

/// A stored lattice record.
///
/// Void records are field carriers: they hold flux and flux rate but no
/// identity, and use the nil id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct Voxel {
    pub coord: Coord,
    pub id: Uuid,
    pub partner_id: Option<Uuid>,
    pub state: VoxelState,
    pub flux: Vec3,
    /// Time derivative of `flux` carried by the wave integrator.
    pub flux_rate: Vec3,
    pub velocity: Vec3,
    /// Sub-cell position offset, each component strictly inside (-1, 1).
    pub remainder: Vec3,
    pub charge: f64,
    pub locked: bool,
    /// Proper-time accumulator used by activity gating.
    pub clock: f64,
}

impl Voxel {
    /// Void field carrier with the given flux and no rate.
    #[must_use]
    pub fn field(coord: Coord, flux: Vec3) -> Self {
        Self {
            coord,
            id: Uuid::nil(),
            partner_id: None,
            state: VoxelState::Void,
            flux,
            flux_rate: Vec3::ZERO,
            velocity: Vec3::ZERO,
            remainder: Vec3::ZERO,
            charge: 0.0,
            locked: false,
            clock: 0.0,
        }
    }

    #[must_use]
    pub fn manifested(coord: Coord, id: Uuid, state: VoxelState, flux: Vec3, charge: f64) -> Self {
        Self {
            id,
            state,
            charge,
            ..Self::field(coord, flux)
        }
    }

    /// ρ = |J|.
    #[must_use]
    pub fn density(&self) -> f64 {
        self.flux.norm()
    }

    #[must_use]
    pub fn is_manifested(&self) -> bool {
        self.state.is_manifested()
    }

    /// A Void record with no field at all can be dropped from the store.
    #[must_use]
    pub fn is_elidable(&self) -> bool {
        self.state == VoxelState::Void && self.flux.is_zero() && self.flux_rate.is_zero()
    }

    /// Strips identity and motion, keeping the field in place.
    pub fn dissolve(&mut self) {
        self.state = VoxelState::Void;
        self.id = Uuid::nil();
        self.partner_id = None;
        self.velocity = Vec3::ZERO;
        self.remainder = Vec3::ZERO;
        self.charge = 0.0;
        self.locked = false;
        self.clock = 0.0;
    }

    #[must_use]
    pub fn view(&self) -> VoxelView {
        VoxelView {
            coord: self.coord,
            state: self.state,
            flux: self.flux,
            velocity: self.velocity,
            locked: self.locked,
            id: (!self.id.is_nil()).then_some(self.id),
            partner_id: self.partner_id,
        }
    }
}

/// Read-only view handed out by `get_voxel`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VoxelView {
    pub coord: Coord,
    pub state: VoxelState,
    pub flux: Vec3,
    pub velocity: Vec3,
    pub locked: bool,
    pub id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
}

impl VoxelView {
    /// Zero-field Void at `coord`; what every absent coordinate reads as.
    #[must_use]
    pub fn void(coord: Coord) -> Self {
        Self {
            coord,
            state: VoxelState::Void,
            flux: Vec3::ZERO,
            velocity: Vec3::ZERO,
            locked: false,
            id: None,
            partner_id: None,
        }
    }

    #[must_use]
    pub fn density(&self) -> f64 {
        self.flux.norm()
    }
}

/// Caller-supplied content for `set_voxel`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct InitialState {
    pub state: VoxelState,
    pub flux: Vec3,
    pub velocity: Vec3,
    /// Defaults to the configured unit charge times the state sign.
    pub charge: Option<f64>,
    pub locked: bool,
}

impl InitialState {
    #[must_use]
    pub fn void() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(flux: Vec3) -> Self {
        Self {
            flux,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn positive(flux: Vec3) -> Self {
        Self {
            state: VoxelState::Positive,
            flux,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn negative(flux: Vec3) -> Self {
        Self {
            state: VoxelState::Negative,
            flux,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    #[must_use]
    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = Some(charge);
        self
    }

    #[must_use]
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}
