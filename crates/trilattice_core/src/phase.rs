use serde::{Deserialize, Serialize};
use std::fmt;

/// The twelve phases of one tick, in execution order.
///
/// The order is fixed. Running phases in a different order changes the
/// emergent behaviour of the lattice.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Gating,
    Decay,
    Existence,
    Propagation,
    Fields,
    Forces,
    Velocity,
    Remainder,
    Movement,
    Transmutation,
    Binding,
    Advance,
}

impl Phase {
    pub const ORDER: [Phase; 12] = [
        Phase::Gating,
        Phase::Decay,
        Phase::Existence,
        Phase::Propagation,
        Phase::Fields,
        Phase::Forces,
        Phase::Velocity,
        Phase::Remainder,
        Phase::Movement,
        Phase::Transmutation,
        Phase::Binding,
        Phase::Advance,
    ];

    /// 1-based position in [`Phase::ORDER`].
    #[must_use]
    pub fn number(self) -> usize {
        self as usize + 1
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Phase::Gating => "gating",
            Phase::Decay => "decay",
            Phase::Existence => "existence",
            Phase::Propagation => "propagation",
            Phase::Fields => "fields",
            Phase::Forces => "forces",
            Phase::Velocity => "velocity",
            Phase::Remainder => "remainder",
            Phase::Movement => "movement",
            Phase::Transmutation => "transmutation",
            Phase::Binding => "binding",
            Phase::Advance => "advance",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}
