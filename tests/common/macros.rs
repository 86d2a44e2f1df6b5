/// Asserts the state read at a coordinate.
#[macro_export]
macro_rules! assert_state {
    ($world:expr, $coord:expr, $state:expr) => {
        let view = $world.get_voxel($coord);
        assert_eq!(
            view.state, $state,
            "expected {:?} at {}, found {:?}",
            $state, $coord, view.state
        );
    };
}

/// Asserts that a coordinate reads as Void.
#[macro_export]
macro_rules! assert_void {
    ($world:expr, $coord:expr) => {
        $crate::assert_state!($world, $coord, trilattice_data::VoxelState::Void);
    };
}

/// Asserts that two floats agree within a relative tolerance.
#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr, $tol:expr) => {
        let (l, r): (f64, f64) = ($left, $right);
        assert!(
            (l - r).abs() <= $tol * r.abs().max(1.0),
            "{} and {} differ by more than {}",
            l,
            r,
            $tol
        );
    };
}
