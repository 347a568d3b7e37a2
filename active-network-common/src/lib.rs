pub mod box_params;
pub mod config;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use box_params::BoxParams;
pub use config::{SimulationConfig, UniverseConfig, TimingConfig, InitialConditions, ThermostatConfig, NetworkConfig, OutputConfig, SpeciesKind};
pub use snapshot::{NetworkSummary, PolymerSummary, Snapshot};
pub use vecmath::{Vec3, angle_between};
