//! Triad binding detection.
//!
//! A triad is three same-sign manifested voxels whose pairwise offsets all
//! have squared length 2. A triad that stays unchanged (same members at the
//! same coordinates) for `persistence_ticks` consecutive evaluations becomes
//! bound and locks its members.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use trilattice_data::{Coord, VoxelState};
use uuid::Uuid;

use crate::lattice::{BoundaryMode, LatticeStore};
use crate::neighborhood::diagonal_offsets;

/// Sorted `(coord, id)` members identifying one triad.
pub type TriadKey = [(Coord, Uuid); 3];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct TriadRecord {
    pub members: TriadKey,
    pub state: VoxelState,
    /// Consecutive evaluations the triad has been seen unchanged.
    pub streak: u32,
    pub bound: bool,
}

impl TriadRecord {
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.members.iter().any(|(_, m)| *m == id)
    }

    #[must_use]
    pub fn coords(&self) -> [Coord; 3] {
        [self.members[0].0, self.members[1].0, self.members[2].0]
    }
}

/// Neighbour at a diagonal offset. Toroidal lattices wrap; elsewhere the raw
/// coordinate must already be inside, so mirrored images never form triads.
fn diagonal_neighbour(store: &LatticeStore, c: Coord, d: Coord) -> Option<Coord> {
    let raw = c + d;
    match store.boundary() {
        BoundaryMode::Toroidal => store.resolve(raw),
        BoundaryMode::Absorbing | BoundaryMode::Reflective => {
            store.extent().contains(raw).then_some(raw)
        }
    }
}

/// Every triad present in the store, sorted by key.
#[must_use]
pub fn find_triads(store: &LatticeStore) -> Vec<(TriadKey, VoxelState)> {
    let offsets = diagonal_offsets();
    let mut seen: BTreeSet<TriadKey> = BTreeSet::new();
    let mut found = Vec::new();

    for a in store.manifested_coords() {
        let Some(va) = store.get(a) else { continue };
        let state = va.state;
        for (i, d1) in offsets.iter().enumerate() {
            for d2 in &offsets[i + 1..] {
                if (*d2 - *d1).length_sq() != 2 {
                    continue;
                }
                let (Some(b), Some(c)) = (
                    diagonal_neighbour(store, a, *d1),
                    diagonal_neighbour(store, a, *d2),
                ) else {
                    continue;
                };
                if a == b || a == c || b == c {
                    continue;
                }
                let (Some(vb), Some(vc)) = (store.get(b), store.get(c)) else {
                    continue;
                };
                if vb.state != state || vc.state != state {
                    continue;
                }
                let mut key = [(a, va.id), (b, vb.id), (c, vc.id)];
                key.sort_unstable();
                if seen.insert(key) {
                    found.push((key, state));
                }
            }
        }
    }
    found.sort_unstable_by_key(|(k, _)| *k);
    found
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingOutcome {
    pub observed: usize,
    pub formed: Vec<TriadKey>,
    pub broken: Vec<TriadKey>,
}

/// Streak bookkeeping for every triad currently on the lattice.
#[derive(Debug, Clone, Default)]
pub struct BindingTracker {
    records: BTreeMap<TriadKey, TriadRecord>,
}

impl BindingTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_records(records: Vec<TriadRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.members, r)).collect(),
        }
    }

    /// Records in key order.
    #[must_use]
    pub fn records(&self) -> Vec<TriadRecord> {
        self.records.values().cloned().collect()
    }

    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.records.values().filter(|r| r.bound).count()
    }

    #[must_use]
    pub fn is_bound(&self, id: Uuid) -> bool {
        self.records.values().any(|r| r.bound && r.contains(id))
    }

    /// Evaluates the post-move lattice once.
    pub fn update(&mut self, store: &mut LatticeStore, persistence_ticks: u32) -> BindingOutcome {
        let present = find_triads(store);
        let mut outcome = BindingOutcome {
            observed: present.len(),
            ..Default::default()
        };

        let mut next: BTreeMap<TriadKey, TriadRecord> = BTreeMap::new();
        for (key, state) in present {
            let mut record = self.records.remove(&key).unwrap_or(TriadRecord {
                members: key,
                state,
                streak: 0,
                bound: false,
            });
            record.streak = record.streak.saturating_add(1);
            if !record.bound && record.streak >= persistence_ticks {
                record.bound = true;
                outcome.formed.push(key);
            }
            next.insert(key, record);
        }

        let gone = std::mem::replace(&mut self.records, next);
        outcome.broken = gone
            .into_values()
            .filter(|r| r.bound)
            .map(|r| r.members)
            .collect();

        for key in &outcome.formed {
            for (c, _) in key {
                if let Some(v) = store.get_mut(*c) {
                    v.locked = true;
                }
            }
        }
        for key in &outcome.broken {
            self.release(store, key);
        }

        if !outcome.formed.is_empty() || !outcome.broken.is_empty() {
            tracing::debug!(
                observed = outcome.observed,
                formed = outcome.formed.len(),
                broken = outcome.broken.len(),
                "Bindings updated"
            );
        }
        outcome
    }

    /// Drops every triad containing the voxel at `coord` and unlocks members
    /// no longer held by another bound triad. Returns the number of bound
    /// triads released.
    pub fn unbind(&mut self, store: &mut LatticeStore, coord: Coord) -> usize {
        let Some(id) = store.get(coord).filter(|v| v.is_manifested()).map(|v| v.id) else {
            return 0;
        };
        let (dropped, kept): (Vec<TriadRecord>, Vec<TriadRecord>) = std::mem::take(&mut self.records)
            .into_values()
            .partition(|r| r.contains(id));
        self.records = kept.into_iter().map(|r| (r.members, r)).collect();

        let mut released = 0;
        for record in dropped.iter().filter(|r| r.bound) {
            self.release(store, &record.members);
            released += 1;
        }
        released
    }

    /// Unlocks the members of `key` that no remaining bound triad holds.
    fn release(&self, store: &mut LatticeStore, key: &TriadKey) {
        for (_, id) in key {
            if self.is_bound(*id) {
                continue;
            }
            if let Some(c) = store.coord_of(*id) {
                if let Some(v) = store.get_mut(c) {
                    v.locked = false;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
