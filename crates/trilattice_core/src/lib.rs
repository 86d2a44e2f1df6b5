//! # Trilattice Core
//!
//! The engine components of the trilattice simulation: a sparse 3D lattice
//! whose sites carry a tri-valued state (Void, Positive, Negative) and a
//! continuous flux vector.
//!
//! This crate contains:
//! - The sparse lattice store and its boundary modes
//! - Discrete neighborhood operators (gradient, divergence, curl, Laplacian)
//! - The damped wave flux propagator
//! - The manifestation state machine (genesis, evaporation, annihilation)
//! - Force accumulation, motion and collision resolution
//! - Triad binding detection
//! - Configuration, errors, metrics and structured logging
//!
//! The tick scheduler that strings these together lives in the root crate
//! (`trilattice_lib::model::world`).
//!
//! ## Example
//!
//! ```
//! use trilattice_core::lattice::{BoundaryMode, LatticeStore};
//! use trilattice_data::{Coord, Extent, Vec3, Voxel};
//!
//! let mut store = LatticeStore::new(Extent::cube(8), BoundaryMode::Toroidal);
//! store
//!     .set(Coord::new(-1, 0, 0), Voxel::field(Coord::ORIGIN, Vec3::new(1.0, 0.0, 0.0)))
//!     .unwrap();
//! assert!(store.get(Coord::new(7, 0, 0)).is_some());
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod events;
pub mod flux;
pub mod forces;
pub mod lattice;
pub mod manifestation;
pub mod metrics;
pub mod motion;
pub mod neighborhood;
pub mod phase;
pub mod snapshot;

pub use config::SimConfig;
pub use error::{ConfigError, SimulationError};
pub use lattice::{BoundaryMode, LatticeStore};
