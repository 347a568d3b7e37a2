use serde::{Serialize, Deserialize};

/// Read-only view of one active polymer at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolymerSummary {
    pub id: u32,
    pub size: usize,
    pub head_bond: u32,
    pub tail_bond: u32,
}

/// State of one active network at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSummary {
    /// Network identification string (species type name).
    pub name: String,
    pub free_bond_count: usize,
    pub free_polymer_count: usize,
    /// Number of bonds currently bound into polymers.
    pub bound_bond_count: usize,
    pub mean_polymer_size: f64,
    pub polymers: Vec<PolymerSummary>,
}

/// A snapshot of the simulation state and metrics at a specific time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub step: u32,
    pub time: f64,
    pub total_bead_count: usize,
    pub networks: Vec<NetworkSummary>,
}
