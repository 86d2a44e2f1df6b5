use proptest::prelude::*;
use trilattice_data::{Coord, Extent, InitialState, Vec3};
use trilattice_lib::model::config::SimConfig;
use trilattice_lib::model::lattice::BoundaryMode;
use trilattice_lib::model::motion::{integrate_velocity, step_of};
use trilattice_lib::model::world::World;

prop_compose! {
    fn arb_vec3(bound: f64)(
        x in -bound..bound,
        y in -bound..bound,
        z in -bound..bound
    ) -> Vec3 {
        Vec3::new(x, y, z)
    }
}

fn arb_boundary() -> impl Strategy<Value = BoundaryMode> {
    prop_oneof![
        Just(BoundaryMode::Toroidal),
        Just(BoundaryMode::Absorbing),
        Just(BoundaryMode::Reflective),
    ]
}

fn arb_initial() -> impl Strategy<Value = InitialState> {
    (arb_vec3(4.0), arb_vec3(0.5), 0..3u8).prop_map(|(flux, velocity, kind)| match kind {
        0 => InitialState::field(flux),
        1 => InitialState::positive(flux).with_velocity(velocity),
        _ => InitialState::negative(flux).with_velocity(velocity),
    })
}

fn build(seed: u64, boundary: BoundaryMode, sites: &[((i32, i32, i32), InitialState)]) -> World {
    let mut config = SimConfig::default();
    config.lattice.extent = Extent::cube(6);
    config.lattice.boundary = boundary;
    config.lattice.seed = seed;
    let mut world = World::new(config).unwrap();
    for ((x, y, z), init) in sites {
        world.set_voxel(Coord::new(*x, *y, *z), *init).unwrap();
    }
    world
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_integrated_speed_is_bounded(
        v in arb_vec3(1.0),
        f in arb_vec3(1e6),
        mass in 0.01f64..100.0,
        limit in 0.01f64..5.0
    ) {
        let start = if v.norm() > limit { v * (limit / v.norm()) * 0.5 } else { v };
        let out = integrate_velocity(start, f, mass, limit);
        prop_assert!(out.is_finite());
        prop_assert!(out.norm() <= limit, "{} > {}", out.norm(), limit);
    }

    #[test]
    fn test_step_only_on_saturated_axes(r in arb_vec3(2.0)) {
        let step = step_of(r);
        for axis in 0..3 {
            let s = step.axis(axis);
            let c = r.component(axis);
            prop_assert!(s.abs() <= 1);
            prop_assert_eq!(s != 0, c.abs() >= 1.0);
            if s != 0 {
                prop_assert_eq!(f64::from(s).signum(), c.signum());
            }
        }
    }

    #[test]
    fn test_world_invariants_hold(
        seed in any::<u64>(),
        boundary in arb_boundary(),
        sites in prop::collection::vec(((0..6i32, 0..6i32, 0..6i32), arb_initial()), 1..12)
    ) {
        let mut world = build(seed, boundary, &sites);
        let limit = world.config().motion.speed_limit;
        for _ in 0..8 {
            world.step().unwrap();
            for v in world.lattice().iter_sorted() {
                prop_assert!(world.config().lattice.extent.contains(v.coord));
                prop_assert!(v.velocity.norm() <= limit);
                for axis in 0..3 {
                    prop_assert!(v.remainder.component(axis).abs() < 2.0);
                }
                prop_assert_eq!(v.is_manifested(), !v.id.is_nil());
            }
        }
    }

    #[test]
    fn test_replay_is_bit_identical(
        seed in any::<u64>(),
        boundary in arb_boundary(),
        sites in prop::collection::vec(((0..6i32, 0..6i32, 0..6i32), arb_initial()), 1..10)
    ) {
        let mut a = build(seed, boundary, &sites);
        let mut b = build(seed, boundary, &sites);
        for _ in 0..6 {
            let ra = a.step().unwrap();
            let rb = b.step().unwrap();
            prop_assert_eq!(ra.events, rb.events);
        }
        prop_assert_eq!(a.deterministic_hash(), b.deterministic_hash());
        prop_assert_eq!(a.snapshot(), b.snapshot());
    }
}
