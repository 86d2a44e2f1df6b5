//! Events emitted while a tick runs.

use serde::{Deserialize, Serialize};
use trilattice_data::{Coord, VoxelState};
use uuid::Uuid;

use crate::phase::Phase;

/// Tagged union of everything that changed the lattice during a tick.
///
/// Serialised with `#[serde(tag = "event")]` for JSON-lines output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event")]
pub enum LatticeEvent {
    /// A Void site manifested.
    Genesis {
        coord: Coord,
        id: Uuid,
        state: VoxelState,
        tick: u64,
    },
    /// A manifested voxel fell below K_B and returned to Void.
    Evaporation { coord: Coord, id: Uuid, tick: u64 },
    /// An opposite pair cleared and its flux went to the neighbours.
    Annihilation {
        positive: Coord,
        negative: Coord,
        magnitude: f64,
        recipients: usize,
        phase: Phase,
        tick: u64,
    },
    Moved {
        id: Uuid,
        from: Coord,
        to: Coord,
        tick: u64,
    },
    /// Two same-sign voxels exchanged velocities.
    ElasticCollision { mover: Coord, target: Coord, tick: u64 },
    /// A move lost its target to a lower source coordinate.
    Blocked { coord: Coord, target: Coord, tick: u64 },
    /// A voxel left an absorbing lattice.
    Exited { id: Uuid, coord: Coord, tick: u64 },
    Reflected { coord: Coord, axes: [bool; 3], tick: u64 },
    Transmuted {
        coord: Coord,
        id: Uuid,
        from: VoxelState,
        to: VoxelState,
        stress: f64,
        tick: u64,
    },
    BindingFormed { members: [Uuid; 3], tick: u64 },
    BindingBroken { members: [Uuid; 3], tick: u64 },
}

impl LatticeEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            LatticeEvent::Genesis { .. } => "genesis",
            LatticeEvent::Evaporation { .. } => "evaporation",
            LatticeEvent::Annihilation { .. } => "annihilation",
            LatticeEvent::Moved { .. } => "moved",
            LatticeEvent::ElasticCollision { .. } => "elastic_collision",
            LatticeEvent::Blocked { .. } => "blocked",
            LatticeEvent::Exited { .. } => "exited",
            LatticeEvent::Reflected { .. } => "reflected",
            LatticeEvent::Transmuted { .. } => "transmuted",
            LatticeEvent::BindingFormed { .. } => "binding_formed",
            LatticeEvent::BindingBroken { .. } => "binding_broken",
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A redistribution that did not hand out the magnitude it consumed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConservationWarning {
    pub phase: Phase,
    pub positive: Coord,
    pub negative: Coord,
    pub expected: f64,
    pub deposited: f64,
}

/// What `World::step` hands back.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Tick number this report describes (the counter before increment).
    pub tick: u64,
    pub events: Vec<LatticeEvent>,
    pub conservation_warnings: Vec<ConservationWarning>,
    /// Voxels that took part in motion this tick.
    pub gated: usize,
    pub stored: usize,
    pub manifested: usize,
}

impl TickReport {
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    pub fn push(&mut self, event: LatticeEvent) {
        self.events.push(event);
    }

    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = LatticeEvent::Exited {
            id: Uuid::from_u128(7),
            coord: Coord::new(1, 2, 3),
            tick: 4,
        };
        let json = event.to_json().unwrap();
        assert!(json.contains("\"event\":\"Exited\""));
        let back: LatticeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_report_counts_by_kind() {
        let mut report = TickReport::new(3);
        report.push(LatticeEvent::BindingFormed {
            members: [Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)],
            tick: 3,
        });
        report.push(LatticeEvent::Blocked {
            coord: Coord::ORIGIN,
            target: Coord::new(1, 0, 0),
            tick: 3,
        });
        assert_eq!(report.count("binding_formed"), 1);
        assert_eq!(report.count("genesis"), 0);
    }
}
