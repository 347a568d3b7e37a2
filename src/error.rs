//! Error types for the active network engine.

use thiserror::Error;

/// Rejected species parameters, reported when a network is constructed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpeciesError {
    #[error("capture range must be positive, got {0}")]
    NonPositiveRange(f64),
    #[error("minimum capture range {min} must lie in [0, {max})")]
    InvalidMinRange { min: f64, max: f64 },
    #[error("spring constant {name} must be non-negative, got {value}")]
    NegativeSpring { name: &'static str, value: f64 },
    #[error("unstretched length must be non-negative, got {0}")]
    NegativeLength(f64),
    #[error("axis angle limit must lie in (0, 180] degrees, got {0}")]
    InvalidAxisAngle(f64),
    #[error("a monomer must host at least one active bond")]
    ZeroBondsPerPolymer,
}

/// Command-level failures when manipulating networks through the shadow box.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("no active network named '{0}'")]
    UnknownNetwork(String),
    #[error("an active network named '{0}' already exists")]
    DuplicateNetwork(String),
    #[error("no monomer with id {0}")]
    UnknownMonomer(u32),
    #[error("monomer {0} is already wrapped by an active bond")]
    MonomerAlreadyWrapped(u32),
    #[error("network '{network}' has no bond with id {bond}")]
    UnknownBond { network: String, bond: u32 },
    #[error("bond {0} is bound into a polymer and cannot be removed")]
    BondNotFree(u32),
    #[error("network '{network}' has no polymer with id {polymer}")]
    UnknownPolymer { network: String, polymer: u32 },
    #[error(transparent)]
    Species(#[from] SpeciesError),
}

/// Corrupted network bookkeeping. Any of these halts the simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("bond {0} is in the free pool but not free")]
    FreeBondActivated(u32),
    #[error("bond {0} appears in the free pool and in polymer {1}")]
    BondInTwoPools(u32, u32),
    #[error("bond {bond} is reachable from polymers {first} and {second}")]
    BondSharedByPolymers { bond: u32, first: u32, second: u32 },
    #[error("polymer {polymer} reports size {reported} but its chain holds {counted} bonds")]
    SizeMismatch { polymer: u32, reported: usize, counted: usize },
    #[error("polymer {0} holds fewer than two bonds")]
    PolymerTooSmall(u32),
    #[error("polymer {0} chain links are inconsistent")]
    BrokenLinks(u32),
    #[error("bond {0} is activated but belongs to no polymer")]
    OrphanActivatedBond(u32),
    #[error("bond {0} is free but not in the free pool")]
    LostFreeBond(u32),
}
