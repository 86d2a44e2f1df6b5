mod common;

use common::{run, WorldBuilder};
use trilattice_data::{Coord, InitialState, Vec3, VoxelState};
use trilattice_lib::model::events::LatticeEvent;
use trilattice_lib::model::lattice::BoundaryMode;
use trilattice_lib::model::world::World;

const A: Coord = Coord::new(2, 2, 2);
const B: Coord = Coord::new(3, 3, 2);
const C: Coord = Coord::new(3, 2, 3);

fn triad_builder(state: VoxelState, persistence: u32) -> WorldBuilder {
    let flux = Vec3::new(0.0, 4.0, 0.0);
    let init = match state {
        VoxelState::Negative => InitialState::negative(flux),
        _ => InitialState::positive(flux),
    };
    WorldBuilder::new()
        .with_extent(6)
        .with_boundary(BoundaryMode::Absorbing)
        .quiet()
        .with_config(|c| {
            c.flux.wave_speed_sq = 0.001;
            c.binding.persistence_ticks = persistence;
        })
        .with_voxel(A, init)
        .with_voxel(B, init)
        .with_voxel(C, init)
}

fn triad_world(state: VoxelState, persistence: u32) -> World {
    triad_builder(state, persistence).build()
}

#[test]
fn test_triad_binds_after_persistence() {
    let mut world = triad_world(VoxelState::Positive, 3);

    for _ in 0..2 {
        let report = world.step().unwrap();
        assert_eq!(report.count("binding_formed"), 0);
        assert!(!world.get_voxel(A).locked);
    }
    let report = world.step().unwrap();
    assert_eq!(report.count("binding_formed"), 1);
    for c in [A, B, C] {
        assert!(world.get_voxel(c).locked, "{c} not locked");
    }
    assert_eq!(world.diagnostics().locked, 3);
}

#[test]
fn test_bound_members_stop_decaying() {
    let mut world = triad_builder(VoxelState::Negative, 1)
        .with_config(|c| {
            c.manifestation.decay_factor = 0.5;
            c.flux.wave_speed_sq = 0.0;
        })
        .build();
    assert_eq!(world.config().manifestation.decay_factor, 0.5);

    world.step().unwrap();
    let held = world.get_voxel(A).flux;
    assert!(world.get_voxel(A).locked);
    run(&mut world, 5);
    assert_eq!(world.get_voxel(A).flux, held);
}

#[test]
fn test_unbind_releases_members() {
    let mut world = triad_world(VoxelState::Positive, 1);
    world.step().unwrap();
    assert!(world.get_voxel(B).locked);

    assert_eq!(world.unbind(B), 1);
    for c in [A, B, C] {
        assert!(!world.get_voxel(c).locked);
    }
    assert_eq!(world.unbind(Coord::new(0, 0, 0)), 0);
}

#[test]
fn test_annihilated_member_breaks_binding() {
    let mut world = triad_world(VoxelState::Positive, 1);
    world.step().unwrap();
    let ids: Vec<_> = [A, B, C].iter().filter_map(|c| world.get_voxel(*c).id).collect();
    assert_eq!(ids.len(), 3);

    world
        .set_voxel(C + Coord::new(0, 0, 1), InitialState::negative(Vec3::new(0.0, 4.0, 0.0)))
        .unwrap();
    let report = world.step().unwrap();

    assert_eq!(report.count("annihilation"), 1);
    let broken = report
        .events
        .iter()
        .find_map(|e| match e {
            LatticeEvent::BindingBroken { members, .. } => Some(*members),
            _ => None,
        })
        .expect("binding should break");
    let mut expected = ids.clone();
    expected.sort();
    let mut got = broken.to_vec();
    got.sort();
    assert_eq!(got, expected);
    assert_void!(world, C);
    assert!(!world.get_voxel(A).locked);
    assert!(!world.get_voxel(B).locked);
}

#[test]
fn test_mixed_polarity_never_binds() {
    let mut world = WorldBuilder::new()
        .with_extent(6)
        .quiet()
        .with_config(|c| {
            c.flux.wave_speed_sq = 0.0;
            c.binding.persistence_ticks = 1;
        })
        .with_voxel(A, InitialState::positive(Vec3::new(0.0, 4.0, 0.0)))
        .with_voxel(B, InitialState::positive(Vec3::new(0.0, 4.0, 0.0)))
        .with_voxel(C, InitialState::negative(Vec3::new(0.0, 4.0, 0.0)))
        .build();
    run(&mut world, 4);
    assert_eq!(world.diagnostics().locked, 0);
}
