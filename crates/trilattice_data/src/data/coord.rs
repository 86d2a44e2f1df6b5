use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

use super::vector::Vec3;

/// Integer lattice coordinate.
///
/// The derived ordering is lexicographic on `(x, y, z)`. Every phase of the
/// engine walks voxels in this order, which is what makes PRNG consumption
/// and write application reproducible.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, PartialEq, Eq, Hash))]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const ORIGIN: Coord = Coord { x: 0, y: 0, z: 0 };

    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Unit step along `axis` (0 = x, 1 = y, 2 = z) with the given sign.
    #[must_use]
    pub const fn unit(axis: usize, sign: i32) -> Self {
        match axis {
            0 => Self::new(sign, 0, 0),
            1 => Self::new(0, sign, 0),
            _ => Self::new(0, 0, sign),
        }
    }

    #[must_use]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }

    #[must_use]
    pub fn axis(self, axis: usize) -> i32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn set_axis(&mut self, axis: usize, value: i32) {
        match axis {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
    }

    /// Squared Euclidean length of the coordinate read as an offset.
    #[must_use]
    pub fn length_sq(self) -> i64 {
        let (x, y, z) = (i64::from(self.x), i64::from(self.y), i64::from(self.z));
        x * x + y * y + z * z
    }

    /// Chebyshev (king-move) distance, without any boundary wrapping.
    #[must_use]
    pub fn chebyshev(self, other: Coord) -> i64 {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).abs();
        dx.max(dy).max(dz)
    }

    #[must_use]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }
}

impl Add for Coord {
    type Output = Coord;

    fn add(self, rhs: Coord) -> Coord {
        self.offset(rhs.x, rhs.y, rhs.z)
    }
}

impl Sub for Coord {
    type Output = Coord;

    fn sub(self, rhs: Coord) -> Coord {
        Coord {
            x: self.x.saturating_sub(rhs.x),
            y: self.y.saturating_sub(rhs.y),
            z: self.z.saturating_sub(rhs.z),
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Number of cells along each axis.
///
/// Signed so that a bad configuration (zero or negative) can be represented
/// and rejected by validation instead of wrapping silently.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct Extent {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Extent {
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn cube(n: i32) -> Self {
        Self { x: n, y: n, z: n }
    }

    #[must_use]
    pub fn axis(self, axis: usize) -> i32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.x > 0 && self.y > 0 && self.z > 0
    }

    #[must_use]
    pub fn volume(self) -> u64 {
        if !self.is_positive() {
            return 0;
        }
        self.x as u64 * self.y as u64 * self.z as u64
    }

    #[must_use]
    pub fn contains(self, c: Coord) -> bool {
        (0..self.x).contains(&c.x) && (0..self.y).contains(&c.y) && (0..self.z).contains(&c.z)
    }

    #[must_use]
    pub fn center(self) -> Coord {
        Coord::new(self.x / 2, self.y / 2, self.z / 2)
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::cube(32)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}
