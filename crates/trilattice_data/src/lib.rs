//! Plain data types shared by every trilattice crate.
//!
//! Nothing in here knows about ticks or phases. The types carry serde and
//! rkyv derives so that snapshots can be written as JSON or as validated
//! zero-copy archives.

pub mod data;

pub use data::coord::{Coord, Extent};
pub use data::vector::Vec3;
pub use data::voxel::{InitialState, Voxel, VoxelState, VoxelView};
