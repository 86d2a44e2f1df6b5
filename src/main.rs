use anyhow::{Context, Result};
use std::path::Path;
use trilattice_data::{Coord, InitialState, Vec3};
use trilattice_lib::model::config::SimConfig;
use trilattice_lib::model::error::SimulationError;
use trilattice_lib::model::metrics::init_logging;
use trilattice_lib::model::persistence::save_snapshot;
use trilattice_lib::model::world::World;

const CONFIG_PATH: &str = "trilattice.toml";

fn load_config() -> Result<SimConfig> {
    if !Path::new(CONFIG_PATH).exists() {
        tracing::info!("No {CONFIG_PATH} found, using defaults");
        return Ok(SimConfig::default());
    }
    let content = std::fs::read_to_string(CONFIG_PATH)
        .with_context(|| format!("reading {CONFIG_PATH}"))?;
    SimConfig::from_toml(&content).with_context(|| format!("parsing {CONFIG_PATH}"))
}

/// A dense pulse at the centre with a radial field around it, enough to
/// seed genesis on the first few ticks.
fn seed_pulse(world: &mut World) -> Result<()> {
    let center = world.config().lattice.extent.center();
    let k_b = world.config().manifestation.threshold;
    world.set_voxel(center, InitialState::field(Vec3::new(0.0, 0.0, 4.0 * k_b)))?;
    for axis in 0..3 {
        for sign in [-1, 1] {
            let mut flux = Vec3::ZERO;
            flux.set_component(axis, f64::from(sign) * 2.0 * k_b);
            world.set_voxel(center + Coord::unit(axis, sign), InitialState::field(flux))?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let config = load_config()?;
    let ticks = config.run.ticks;
    let snapshot_path = config.run.snapshot_path.clone();

    let mut world = World::new(config)?;
    seed_pulse(&mut world)?;
    tracing::info!(ticks, extent = %world.config().lattice.extent, "Running headless");

    for _ in 0..ticks {
        match world.step() {
            Ok(report) => {
                for warning in &report.conservation_warnings {
                    tracing::warn!(?warning, "Conservation check failed");
                }
            }
            Err(SimulationError::Instability { tick, coords }) => {
                tracing::error!(tick, count = coords.len(), "Propagation diverged; stopping");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let diagnostics = world.diagnostics();
    tracing::info!(
        tick = world.tick,
        stored = diagnostics.stored,
        positive = diagnostics.positive,
        negative = diagnostics.negative,
        locked = diagnostics.locked,
        total_flux = diagnostics.total_flux_magnitude,
        hash = %world.deterministic_hash(),
        "Run finished"
    );
    println!("{}", serde_json::to_string_pretty(&diagnostics)?);

    if let Some(path) = snapshot_path {
        save_snapshot(&world.snapshot(), &path).with_context(|| format!("saving snapshot to {path}"))?;
    }
    Ok(())
}
