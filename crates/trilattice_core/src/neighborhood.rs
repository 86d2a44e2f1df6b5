//! Neighborhood enumeration and discrete field operators.
//!
//! The operators are stencils over raw (unresolved) coordinates. They take a
//! sampler closure and never look at boundaries themselves; samplers built on
//! [`LatticeStore`] resolve boundaries and read absent sites as zero.

use trilattice_data::{Coord, Vec3};

use crate::lattice::LatticeStore;

/// Face offsets in the fixed order -x, +x, -y, +y, -z, +z.
pub const FACE_OFFSETS: [Coord; 6] = [
    Coord::new(-1, 0, 0),
    Coord::new(1, 0, 0),
    Coord::new(0, -1, 0),
    Coord::new(0, 1, 0),
    Coord::new(0, 0, -1),
    Coord::new(0, 0, 1),
];

/// The 26 Moore offsets in coordinate order.
#[must_use]
pub fn moore_offsets() -> Vec<Coord> {
    let mut offsets = Vec::with_capacity(26);
    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                if dx != 0 || dy != 0 || dz != 0 {
                    offsets.push(Coord::new(dx, dy, dz));
                }
            }
        }
    }
    offsets
}

/// The 12 offsets of length √2 (two axes changed by one).
#[must_use]
pub fn diagonal_offsets() -> Vec<Coord> {
    moore_offsets()
        .into_iter()
        .filter(|d| d.length_sq() == 2)
        .collect()
}

fn resolve_distinct(store: &LatticeStore, v: Coord, offsets: &[Coord]) -> Vec<Coord> {
    let Some(center) = store.resolve(v) else {
        return Vec::new();
    };
    let mut out: Vec<Coord> = Vec::with_capacity(offsets.len());
    for d in offsets {
        if let Some(r) = store.resolve(v + *d) {
            if r != center && !out.contains(&r) {
                out.push(r);
            }
        }
    }
    out
}

/// N26(v): resolved Moore neighbours, deduplicated, excluding v itself.
/// Fewer than 26 near absorbing or reflective faces and on tiny tori.
#[must_use]
pub fn n26(store: &LatticeStore, v: Coord) -> Vec<Coord> {
    resolve_distinct(store, v, &moore_offsets())
}

/// N6(v): resolved face neighbours in [`FACE_OFFSETS`] order.
#[must_use]
pub fn n6(store: &LatticeStore, v: Coord) -> Vec<Coord> {
    resolve_distinct(store, v, &FACE_OFFSETS)
}

/// (∇f)ᵢ(v) = (f(v+eᵢ) − f(v−eᵢ)) / 2
pub fn gradient<F: Fn(Coord) -> f64>(at: Coord, f: F) -> Vec3 {
    let mut g = Vec3::ZERO;
    for axis in 0..3 {
        let plus = f(at + Coord::unit(axis, 1));
        let minus = f(at + Coord::unit(axis, -1));
        g.set_component(axis, (plus - minus) / 2.0);
    }
    g
}

/// Central-difference Jacobian: `d[a][b]` = ∂J_b/∂x_a.
fn jacobian<F: Fn(Coord) -> Vec3>(at: Coord, f: &F) -> [[f64; 3]; 3] {
    let mut d = [[0.0; 3]; 3];
    for (axis, row) in d.iter_mut().enumerate() {
        let plus = f(at + Coord::unit(axis, 1));
        let minus = f(at + Coord::unit(axis, -1));
        for (b, cell) in row.iter_mut().enumerate() {
            *cell = (plus.component(b) - minus.component(b)) / 2.0;
        }
    }
    d
}

/// ∇·J(v) = Σᵢ (Jᵢ(v+eᵢ) − Jᵢ(v−eᵢ)) / 2
pub fn divergence<F: Fn(Coord) -> Vec3>(at: Coord, f: F) -> f64 {
    let d = jacobian(at, &f);
    d[0][0] + d[1][1] + d[2][2]
}

/// ∇×J(v), the Levi-Civita contraction of the same partials.
pub fn curl<F: Fn(Coord) -> Vec3>(at: Coord, f: F) -> Vec3 {
    let d = jacobian(at, &f);
    Vec3::new(d[1][2] - d[2][1], d[2][0] - d[0][2], d[0][1] - d[1][0])
}

/// Σ_{u∈N6(v)} f(u) − 6 f(v)
pub fn laplacian<F: Fn(Coord) -> f64>(at: Coord, f: F) -> f64 {
    let sum: f64 = FACE_OFFSETS.iter().map(|d| f(at + *d)).sum();
    sum - 6.0 * f(at)
}

/// Component-wise Laplacian of a vector field.
pub fn vector_laplacian<F: Fn(Coord) -> Vec3>(at: Coord, f: F) -> Vec3 {
    let mut sum = Vec3::ZERO;
    for d in &FACE_OFFSETS {
        sum += f(at + *d);
    }
    sum - f(at) * 6.0
}

/// Mean of f over v and its six face neighbours.
pub fn face_average<F: Fn(Coord) -> f64>(at: Coord, f: F) -> f64 {
    let sum: f64 = FACE_OFFSETS.iter().map(|d| f(at + *d)).sum::<f64>() + f(at);
    sum / 7.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::BoundaryMode;
    use trilattice_data::Extent;

    #[test]
    fn test_neighbour_counts_interior() {
        let store = LatticeStore::new(Extent::cube(5), BoundaryMode::Absorbing);
        assert_eq!(n26(&store, Coord::new(2, 2, 2)).len(), 26);
        assert_eq!(n6(&store, Coord::new(2, 2, 2)).len(), 6);
    }

    #[test]
    fn test_neighbour_counts_at_corner() {
        let absorbing = LatticeStore::new(Extent::cube(5), BoundaryMode::Absorbing);
        assert_eq!(n26(&absorbing, Coord::ORIGIN).len(), 7);
        assert_eq!(n6(&absorbing, Coord::ORIGIN).len(), 3);

        let toroidal = LatticeStore::new(Extent::cube(5), BoundaryMode::Toroidal);
        assert_eq!(n26(&toroidal, Coord::ORIGIN).len(), 26);

        // Mirrored offsets fold back onto the corner or onto each other.
        let reflective = LatticeStore::new(Extent::cube(5), BoundaryMode::Reflective);
        assert_eq!(n26(&reflective, Coord::ORIGIN).len(), 7);
    }

    #[test]
    fn test_gradient_of_linear_field() {
        let g = gradient(Coord::new(3, 3, 3), |c| {
            2.0 * f64::from(c.x) - f64::from(c.y) + 0.5 * f64::from(c.z)
        });
        assert_eq!(g, Vec3::new(2.0, -1.0, 0.5));
    }

    #[test]
    fn test_divergence_and_curl_of_rotation() {
        // J = (-y, x, 0): divergence-free, curl = (0, 0, 2).
        let field = |c: Coord| Vec3::new(-f64::from(c.y), f64::from(c.x), 0.0);
        assert_eq!(divergence(Coord::new(1, 2, 3), field), 0.0);
        assert_eq!(curl(Coord::new(1, 2, 3), field), Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_divergence_of_radial_field() {
        let field = |c: Coord| c.to_vec3();
        assert_eq!(divergence(Coord::new(4, -2, 1), field), 3.0);
        assert_eq!(curl(Coord::new(4, -2, 1), field), Vec3::ZERO);
    }

    #[test]
    fn test_laplacian_of_point_source() {
        let center = Coord::new(2, 2, 2);
        let f = |c: Coord| if c == center { 1.0 } else { 0.0 };
        assert_eq!(laplacian(center, f), -6.0);
        assert_eq!(laplacian(Coord::new(3, 2, 2), f), 1.0);
        assert_eq!(laplacian(Coord::new(3, 3, 2), f), 0.0);
    }

    #[test]
    fn test_face_average() {
        let center = Coord::ORIGIN;
        let f = |c: Coord| if c == center { 7.0 } else { 0.0 };
        assert_eq!(face_average(center, f), 1.0);
        assert_eq!(face_average(Coord::new(1, 0, 0), f), 1.0);
    }

    #[test]
    fn test_diagonal_offsets() {
        let d = diagonal_offsets();
        assert_eq!(d.len(), 12);
        assert!(d.iter().all(|o| o.length_sq() == 2));
    }
}
