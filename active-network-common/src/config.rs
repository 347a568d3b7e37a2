use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::box_params::BoxParams;
use std::path::Path;

// Simulation box dimensions and its cell decomposition
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UniverseConfig {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub cells_x: u32,
    pub cells_y: u32,
    pub cells_z: u32,
    #[serde(default = "default_periodic")]
    pub periodic: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub dt: f64,
    pub total_steps: u32,
    #[serde(default = "default_record_interval")]
    pub record_interval_steps: u32,
}

// Initial monomer population, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    pub num_monomers: u32,
    #[serde(default = "default_beads_per_monomer")]
    pub beads_per_monomer: u32,
    #[serde(default = "default_monomer_bond_length")]
    pub monomer_bond_length: f64,
    /// Spring constant holding the two beads of a monomer at `monomer_bond_length`.
    #[serde(default = "default_monomer_stiffness")]
    pub monomer_stiffness: f64,
    pub placement_seed: u64,
}

// Overdamped Langevin parameters for the demo driver
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ThermostatConfig {
    #[serde(default = "default_friction")]
    pub friction: f64,
    #[serde(default = "default_kt")]
    pub kt: f64,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        ThermostatConfig {
            friction: default_friction(),
            kt: default_kt(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesKind {
    Cofilin,
    Arp23,
}

impl SpeciesKind {
    /// Type name used to route commands to a network.
    pub fn type_name(&self) -> &'static str {
        match self {
            SpeciesKind::Cofilin => "cofilin",
            SpeciesKind::Arp23 => "arp23",
        }
    }
}

/// Per-species bond parameters for one active network.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NetworkConfig {
    pub species: SpeciesKind,
    /// Share (0-1] of the monomer population wrapped by this network.
    #[serde(default = "default_monomer_fraction")]
    pub monomer_fraction: f64,
    pub k2: f64,
    pub l0: f64,
    #[serde(default)]
    pub k3: f64,
    /// Preferred bend angle in degrees.
    #[serde(default)]
    pub phi0: f64,
    pub capture_range: f64,
    #[serde(default)]
    pub min_capture_range: Option<f64>,
    /// Largest angle in degrees allowed between monomer axes (arp23).
    #[serde(default)]
    pub max_axis_angle: Option<f64>,
    #[serde(default = "default_bonds_per_polymer")]
    pub active_bonds_per_polymer: u32,
    #[serde(default = "default_size_log_threshold")]
    pub size_log_threshold: usize,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_stats: bool,
    pub save_polymers: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub universe: UniverseConfig,
    pub timing: TimingConfig,
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub thermostat: ThermostatConfig,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let u = &self.universe;
        if !(u.width > 0.0 && u.height > 0.0 && u.depth > 0.0) {
            anyhow::bail!("box dimensions must be positive.");
        }
        if u.cells_x == 0 || u.cells_y == 0 || u.cells_z == 0 {
            anyhow::bail!("each axis needs at least one cell.");
        }
        if !(self.timing.dt > 0.0) {
            anyhow::bail!("dt must be positive.");
        }
        if self.initial_conditions.num_monomers == 0 {
            anyhow::bail!("num_monomers must be greater than 0.");
        }
        let ic = &self.initial_conditions;
        if !(1..=2).contains(&ic.beads_per_monomer) {
            anyhow::bail!("beads_per_monomer must be 1 or 2.");
        }
        if !(ic.monomer_bond_length >= 0.0 && ic.monomer_stiffness >= 0.0) {
            anyhow::bail!("monomer_bond_length and monomer_stiffness must be non-negative.");
        }
        if !(self.thermostat.friction > 0.0 && self.thermostat.kt >= 0.0) {
            anyhow::bail!("thermostat friction must be positive and kt non-negative.");
        }
        let total_fraction: f64 = self.networks.iter().map(|n| n.monomer_fraction).sum();
        if self.networks.iter().any(|n| !(n.monomer_fraction > 0.0)) || !(total_fraction <= 1.0 + 1e-9) {
            anyhow::bail!("network monomer fractions must be positive and sum to at most 1.");
        }
        Ok(())
    }

    /// Converts the configuration into box parameters used at runtime.
    pub fn box_params(&self) -> BoxParams {
        let u = &self.universe;
        BoxParams::new(
            [u.width, u.height, u.depth],
            [u.cells_x, u.cells_y, u.cells_z],
            u.periodic,
        )
    }
}

fn default_periodic() -> bool {
    true
}

fn default_record_interval() -> u32 {
    10
}

fn default_beads_per_monomer() -> u32 {
    1
}

fn default_monomer_bond_length() -> f64 {
    0.5
}

fn default_monomer_stiffness() -> f64 {
    100.0
}

fn default_friction() -> f64 {
    4.5
}

fn default_kt() -> f64 {
    1.0
}

fn default_monomer_fraction() -> f64 {
    1.0
}

fn default_bonds_per_polymer() -> u32 {
    2
}

fn default_size_log_threshold() -> usize {
    10
}
