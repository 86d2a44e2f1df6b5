//! Error types for the trilattice engine.
//!
//! Configuration problems are caught once, up front, by [`ConfigError`].
//! Everything that can go wrong while the world is running is a
//! [`SimulationError`].

use thiserror::Error;
use trilattice_data::{Coord, Extent};

/// Rejected configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// K_B must be strictly positive (it is also a divisor).
    #[error("manifestation threshold K_B must be strictly positive, got {0}")]
    NonPositiveThreshold(f64),

    #[error("lattice extent must be positive on every axis, got {0}")]
    NonPositiveExtent(Extent),

    #[error("unknown boundary mode `{0}` (expected toroidal, absorbing or reflective)")]
    UnknownBoundaryMode(String),

    #[error("{field} out of range: {value} (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("config parse error: {0}")]
    Parse(String),
}

/// Errors raised while stepping or editing a world.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// The wave integrator produced non-finite values. The tick did not
    /// complete; callers may restore a snapshot, or sanitize and continue.
    #[error("flux propagation diverged at tick {tick}: {} non-finite voxel(s)", .coords.len())]
    Instability { tick: u64, coords: Vec<Coord> },

    #[error("coordinate {0} is outside an absorbing lattice")]
    OutOfBounds(Coord),

    #[error("coordinate {0} already holds a manifested voxel")]
    Occupied(Coord),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SimulationError {
    #[must_use]
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Coordinates reported by an instability, empty for every other kind.
    #[must_use]
    pub fn offending_coords(&self) -> &[Coord] {
        match self {
            Self::Instability { coords, .. } => coords,
            _ => &[],
        }
    }
}
