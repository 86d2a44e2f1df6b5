//! # Trilattice
//!
//! A sparse three-dimensional lattice whose sites are Void, Positive or
//! Negative and carry a continuous flux vector. The [`model::world::World`]
//! owns the lattice and advances it one tick at a time through a fixed
//! twelve-phase schedule.
//!
//! ```
//! use trilattice_lib::model::world::{initialize, World};
//! use trilattice_lib::model::config::ForceCoefficients;
//! use trilattice_lib::model::lattice::BoundaryMode;
//! use trilattice_data::{Coord, Extent, InitialState, Vec3};
//!
//! let mut world = initialize(Extent::cube(8), BoundaryMode::Toroidal, 7, 1.0, ForceCoefficients::default())
//!     .unwrap();
//! world
//!     .set_voxel(Coord::new(4, 4, 4), InitialState::field(Vec3::new(0.5, 0.0, 0.0)))
//!     .unwrap();
//! let report = world.step().unwrap();
//! assert_eq!(report.tick, 0);
//! assert_eq!(world.tick, 1);
//! ```

pub mod model;
