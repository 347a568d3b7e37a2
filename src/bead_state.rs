use active_network_common::Vec3;

/// A single- or two-bead polymer reused as the monomer wrapped by one active bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monomer {
    pub id: u32,
    /// Bead that links toward the next monomer on the head side of a chain.
    pub head_bead: usize,
    /// Bead that links toward the previous monomer on the tail side of a chain.
    pub tail_bead: usize,
}

impl Monomer {
    pub fn new(id: u32, head_bead: usize, tail_bead: usize) -> Self {
        Self { id, head_bead, tail_bead }
    }

    /// Single-bead monomer: the same bead links both ways.
    pub fn single(id: u32, bead: usize) -> Self {
        Self::new(id, bead, bead)
    }
}

/// Holds the bead state vectors the active networks read and write.
#[derive(Debug, Default)]
pub struct BeadState {
    pub positions: Vec<Vec3>,
    pub velocities: Vec<Vec3>,
    /// Force accumulators, shared with every other force contributor in a step.
    pub forces: Vec<Vec3>,
}

impl BeadState {
    pub fn new(positions: Vec<Vec3>) -> Self {
        let n = positions.len();
        Self {
            positions,
            velocities: vec![Vec3::zero(); n],
            forces: vec![Vec3::zero(); n],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Adds a new bead at the end, returning its index.
    pub fn add_bead(&mut self, position: Vec3) -> usize {
        self.positions.push(position);
        self.velocities.push(Vec3::zero());
        self.forces.push(Vec3::zero());
        self.positions.len() - 1
    }

    #[inline(always)]
    pub fn position(&self, bead: usize) -> Vec3 {
        self.positions[bead]
    }

    /// Accumulates `force` on `bead`; never overwrites contributions from other sources.
    #[inline(always)]
    pub fn add_force(&mut self, bead: usize, force: Vec3) {
        self.forces[bead] += force;
    }

    pub fn clear_forces(&mut self) {
        self.forces.iter_mut().for_each(|f| *f = Vec3::zero());
    }
}
