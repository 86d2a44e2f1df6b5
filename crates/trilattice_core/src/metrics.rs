//! Metrics and diagnostics for the lattice.
//!
//! Provides structured logging, run counters and whole-lattice diagnostics
//! for monitoring simulation health.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use trilattice_data::{Vec3, VoxelState};

use crate::lattice::LatticeStore;

/// Run counters for one world.
pub struct Metrics {
    tick_count: AtomicU64,
    stored_count: AtomicU64,
    manifested_count: AtomicU64,
    pub counters: Mutex<HashMap<String, AtomicU64>>,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("tick_count", &self.tick_count())
            .field("stored_count", &self.stored_count())
            .field("manifested_count", &self.manifested_count())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tick_count: AtomicU64::new(0),
            stored_count: AtomicU64::new(0),
            manifested_count: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records a completed tick. Logs at info level every `interval` ticks.
    pub fn record_tick(&self, duration: Duration, stored: usize, manifested: usize, interval: u64) {
        let tick = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.stored_count.store(stored as u64, Ordering::Relaxed);
        self.manifested_count.store(manifested as u64, Ordering::Relaxed);

        if interval > 0 && tick % interval == 0 {
            tracing::info!(
                tick = tick,
                stored = stored,
                manifested = manifested,
                duration_us = duration.as_micros() as u64,
                "Simulation tick"
            );
        }
    }

    /// Adds `by` to a named counter.
    pub fn increment_counter(&self, name: &str, by: u64) {
        if by == 0 {
            return;
        }
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(by, Ordering::Relaxed);
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn stored_count(&self) -> u64 {
        self.stored_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn manifested_count(&self) -> u64 {
        self.manifested_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Whole-lattice summary quantities.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct LatticeDiagnostics {
    /// Σ|J|
    pub total_flux_magnitude: f64,
    /// ΣJ
    pub net_flux: Vec3,
    pub net_charge: f64,
    /// Σv over manifested voxels (unit mass proxy).
    pub momentum: Vec3,
    /// Σ|v|²/2 over manifested voxels.
    pub kinetic_energy: f64,
    pub stored: usize,
    pub positive: usize,
    pub negative: usize,
    pub void_carriers: usize,
    pub locked: usize,
}

impl LatticeDiagnostics {
    #[must_use]
    pub fn manifested(&self) -> usize {
        self.positive + self.negative
    }
}

/// Sums the diagnostics in coordinate order so repeated calls agree bit for bit.
#[must_use]
pub fn diagnose(store: &LatticeStore) -> LatticeDiagnostics {
    let mut d = LatticeDiagnostics {
        stored: store.len(),
        ..Default::default()
    };
    for v in store.iter_sorted() {
        d.total_flux_magnitude += v.density();
        d.net_flux += v.flux;
        d.net_charge += v.charge;
        match v.state {
            VoxelState::Void => d.void_carriers += 1,
            VoxelState::Positive => d.positive += 1,
            VoxelState::Negative => d.negative += 1,
        }
        if v.is_manifested() {
            d.momentum += v.velocity;
            d.kinetic_energy += 0.5 * v.velocity.norm_sq();
            if v.locked {
                d.locked += 1;
            }
        }
    }
    d
}

/// Installs an `EnvFilter`-driven subscriber. `RUST_LOG` overrides the
/// default `info` level. Calling it twice is harmless.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .finish(),
    )
    .ok();
}
