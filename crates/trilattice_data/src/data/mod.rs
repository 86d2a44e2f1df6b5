pub mod coord;
pub mod vector;
pub mod voxel;
