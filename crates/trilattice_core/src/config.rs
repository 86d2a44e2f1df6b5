//! Configuration for a trilattice world.
//!
//! Every physical coefficient the engine uses lives here. Sections map
//! one-to-one onto tables of a `trilattice.toml` file; missing tables and
//! keys fall back to the `Default` values.
//!
//! ## Example `trilattice.toml`
//!
//! ```toml
//! [lattice]
//! extent = { x = 32, y = 32, z = 32 }
//! boundary = "toroidal"
//! seed = 42
//!
//! [manifestation]
//! threshold = 1.0
//! decay_factor = 0.99
//!
//! [flux]
//! wave_speed_sq = 0.1
//! wave_damping = 0.01
//! ```

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use trilattice_data::Extent;

use crate::error::ConfigError;
use crate::lattice::BoundaryMode;

/// Largest `c²` for which the symplectic wave integrator stays bounded on a
/// 6-neighbour Laplacian.
pub const WAVE_STABILITY_LIMIT: f64 = 1.0 / 3.0;

/// Geometry and seeding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[serde(default)]
pub struct LatticeConfig {
    pub extent: Extent,
    pub boundary: BoundaryMode,
    pub seed: u64,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            extent: Extent::cube(32),
            boundary: BoundaryMode::Toroidal,
            seed: 0,
        }
    }
}

/// Genesis, evaporation and decay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[serde(default)]
pub struct ManifestationConfig {
    /// K_B, the density at which matter can appear and below which it evaporates.
    pub threshold: f64,
    /// Per-tick multiplier applied to the flux of unlocked manifested voxels.
    pub decay_factor: f64,
    /// Magnitude of the charge given to newly manifested voxels.
    pub unit_charge: f64,
}

impl Default for ManifestationConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            decay_factor: 0.99,
            unit_charge: 1.0,
        }
    }
}

/// Damped wave propagation of the flux field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[serde(default)]
pub struct FluxConfig {
    /// c², the squared wave speed in cells per tick.
    pub wave_speed_sq: f64,
    /// γ, the fraction of flux rate lost per tick.
    pub wave_damping: f64,
}

impl Default for FluxConfig {
    fn default() -> Self {
        Self {
            wave_speed_sq: 0.1,
            wave_damping: 0.01,
        }
    }
}

/// Force term coefficients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[serde(default)]
pub struct ForceCoefficients {
    pub density: f64,
    pub charge: f64,
    pub curl: f64,
    /// g in g² · e^{-m r} / r² · (1 + m r).
    pub short_range_coupling: f64,
    /// m in the same expression.
    pub short_range_mass: f64,
    /// Stress above which a voxel flips polarity. `None` disables transmutation.
    pub stress_threshold: Option<f64>,
}

impl Default for ForceCoefficients {
    fn default() -> Self {
        Self {
            density: 0.05,
            charge: 1.0,
            curl: 0.01,
            short_range_coupling: 0.3,
            short_range_mass: 1.0,
            stress_threshold: Some(25.0),
        }
    }
}

impl ForceCoefficients {
    /// All terms off, transmutation disabled.
    #[must_use]
    pub fn inert() -> Self {
        Self {
            density: 0.0,
            charge: 0.0,
            curl: 0.0,
            short_range_coupling: 0.0,
            short_range_mass: 0.0,
            stress_threshold: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[serde(default)]
pub struct MotionConfig {
    pub mass_proxy: f64,
    /// Upper bound on |velocity|, in cells per tick.
    pub speed_limit: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            mass_proxy: 1.0,
            speed_limit: 1.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[serde(default)]
pub struct BindingConfig {
    /// Consecutive ticks a triad must hold before it locks.
    pub persistence_ticks: u32,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            persistence_ticks: 3,
        }
    }
}

/// Time gating. A coupling of zero gates every manifested voxel every tick.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[serde(default)]
pub struct GatingConfig {
    pub clock_coupling: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Relative tolerance used by conservation checks.
    pub conservation_tolerance: f64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            conservation_tolerance: 1e-9,
        }
    }
}

/// Settings for the headless runner. Ignored by the engine itself.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[serde(default)]
pub struct RunConfig {
    pub ticks: u64,
    pub report_interval: u64,
    pub snapshot_path: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ticks: 1000,
            report_interval: 100,
            snapshot_path: None,
        }
    }
}

/// Complete world configuration.
#[derive(
    Serialize, Deserialize, Debug, Clone, PartialEq, Default, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
#[serde(default)]
pub struct SimConfig {
    pub lattice: LatticeConfig,
    pub manifestation: ManifestationConfig,
    pub flux: FluxConfig,
    pub forces: ForceCoefficients,
    pub motion: MotionConfig,
    pub binding: BindingConfig,
    pub gating: GatingConfig,
    pub diagnostics: DiagnosticsConfig,
    pub run: RunConfig,
}

fn ensure_range(
    ok: bool,
    field: &'static str,
    value: f64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected,
        })
    }
}

impl SimConfig {
    /// Fails fast on the first unusable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.lattice.extent.is_positive() {
            return Err(ConfigError::NonPositiveExtent(self.lattice.extent));
        }
        let k_b = self.manifestation.threshold;
        if !(k_b > 0.0 && k_b.is_finite()) {
            return Err(ConfigError::NonPositiveThreshold(k_b));
        }

        let m = &self.manifestation;
        ensure_range(
            m.decay_factor > 0.0 && m.decay_factor <= 1.0,
            "manifestation.decay_factor",
            m.decay_factor,
            "0 < decay_factor <= 1",
        )?;
        ensure_range(
            m.unit_charge.is_finite() && m.unit_charge >= 0.0,
            "manifestation.unit_charge",
            m.unit_charge,
            "finite and non-negative",
        )?;

        let f = &self.flux;
        ensure_range(
            (0.0..=1.0).contains(&f.wave_speed_sq),
            "flux.wave_speed_sq",
            f.wave_speed_sq,
            "0 <= c² <= 1",
        )?;
        ensure_range(
            (0.0..1.0).contains(&f.wave_damping),
            "flux.wave_damping",
            f.wave_damping,
            "0 <= damping < 1",
        )?;

        let c = &self.forces;
        for (field, value) in [
            ("forces.density", c.density),
            ("forces.charge", c.charge),
            ("forces.curl", c.curl),
            ("forces.short_range_coupling", c.short_range_coupling),
        ] {
            ensure_range(value.is_finite(), field, value, "finite")?;
        }
        ensure_range(
            c.short_range_mass.is_finite() && c.short_range_mass >= 0.0,
            "forces.short_range_mass",
            c.short_range_mass,
            "finite and non-negative",
        )?;
        if let Some(threshold) = c.stress_threshold {
            ensure_range(
                threshold > 0.0,
                "forces.stress_threshold",
                threshold,
                "strictly positive",
            )?;
        }

        let mo = &self.motion;
        ensure_range(
            mo.mass_proxy > 0.0 && mo.mass_proxy.is_finite(),
            "motion.mass_proxy",
            mo.mass_proxy,
            "strictly positive",
        )?;
        ensure_range(
            mo.speed_limit > 0.0 && mo.speed_limit <= 1.0,
            "motion.speed_limit",
            mo.speed_limit,
            "0 < speed_limit <= 1",
        )?;

        ensure_range(
            self.binding.persistence_ticks >= 1,
            "binding.persistence_ticks",
            f64::from(self.binding.persistence_ticks),
            "at least 1",
        )?;
        ensure_range(
            self.gating.clock_coupling.is_finite() && self.gating.clock_coupling >= 0.0,
            "gating.clock_coupling",
            self.gating.clock_coupling,
            "finite and non-negative",
        )?;
        ensure_range(
            self.diagnostics.conservation_tolerance > 0.0,
            "diagnostics.conservation_tolerance",
            self.diagnostics.conservation_tolerance,
            "strictly positive",
        )?;

        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config =
            toml::from_str::<Self>(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Whether the wave integrator is inside its stability bound.
    #[must_use]
    pub fn is_wave_stable(&self) -> bool {
        self.flux.wave_speed_sq <= WAVE_STABILITY_LIMIT
    }

    /// SHA-256 over the sections that influence physics. Runner settings
    /// are excluded so a snapshot can move between runners.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.lattice).as_bytes());
        hasher.update(format!("{:?}", self.manifestation).as_bytes());
        hasher.update(format!("{:?}", self.flux).as_bytes());
        hasher.update(format!("{:?}", self.forces).as_bytes());
        hasher.update(format!("{:?}", self.motion).as_bytes());
        hasher.update(format!("{:?}", self.binding).as_bytes());
        hasher.update(format!("{:?}", self.gating).as_bytes());
        hex::encode(hasher.finalize())
    }
}
