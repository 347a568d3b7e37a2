pub mod active_bond;
pub mod active_polymer;
pub mod bead_state;
pub mod error;
pub mod grid;
pub mod network;
pub mod shadow_box;
pub mod species;

// Re-export the types a driver needs to build and query networks
pub use active_bond::{ActiveBond, BondArena, BondId, BondState};
pub use active_polymer::ActivePolymer;
pub use bead_state::{BeadState, Monomer};
pub use error::{InvariantViolation, NetworkError, SpeciesError};
pub use grid::{CellGrid, SpatialCell};
pub use network::{ActiveCellNetwork, EvolveReport};
pub use shadow_box::ShadowSimBox;
pub use species::{species_from_config, Arp23Species, BondSpecies, CofilinSpecies, LinkGeometry, SpeciesParams};
