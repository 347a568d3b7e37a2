//! One active network: the free-bond and free-polymer pools of a single bond
//! species, and the per-step kinetics that move bonds between them.
//!
//! `evolve` runs four phases in a fixed order:
//! 1. refresh cell membership of free bonds and chain ends,
//! 2. apply intra-polymer forces,
//! 3. nucleate new polymers from pairs of free bonds,
//! 4. grow (and, for species that define it, shrink) existing polymers at both ends.

use active_network_common::{BoxParams, NetworkSummary};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::active_bond::{ActiveBond, BondArena, BondId};
use crate::active_polymer::ActivePolymer;
use crate::bead_state::{BeadState, Monomer};
use crate::error::{InvariantViolation, NetworkError};
use crate::grid::CellGrid;
use crate::species::BondSpecies;

/// Topology changes produced by one `evolve` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EvolveReport {
    pub nucleated: usize,
    pub head_growth: usize,
    pub tail_growth: usize,
    pub released: usize,
    pub dissolved: usize,
}

impl EvolveReport {
    pub fn is_quiet(&self) -> bool {
        *self == EvolveReport::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainEnd {
    Head,
    Tail,
}

pub struct ActiveCellNetwork {
    name: String,
    species: Box<dyn BondSpecies>,
    params: BoxParams,
    grid: CellGrid,
    bonds: BondArena,
    free_bonds: Vec<BondId>,
    free_polymers: Vec<ActivePolymer>,
    next_polymer_id: u32,
    steps: u64,
}

impl ActiveCellNetwork {
    pub fn new(species: Box<dyn BondSpecies>, params: BoxParams) -> Self {
        let name = species.type_name().to_string();
        let reach = search_reach(species.params().capture_range, &params);
        let grid = CellGrid::with_reach(&params, reach);
        info!(
            "Created active network '{}' over {} cells (search reach {}).",
            name,
            grid.len(),
            reach
        );

        Self {
            name,
            species,
            params,
            grid,
            bonds: BondArena::new(),
            free_bonds: Vec::new(),
            free_polymers: Vec::new(),
            next_polymer_id: 0,
            steps: 0,
        }
    }

    /// Network identification string (species type name).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn species(&self) -> &dyn BondSpecies {
        self.species.as_ref()
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn bonds(&self) -> &BondArena {
        &self.bonds
    }

    pub fn bond(&self, id: BondId) -> Option<&ActiveBond> {
        self.bonds.get(id)
    }

    pub fn free_bonds(&self) -> &[BondId] {
        &self.free_bonds
    }

    pub fn free_bond_count(&self) -> usize {
        self.free_bonds.len()
    }

    pub fn free_polymers(&self) -> &[ActivePolymer] {
        &self.free_polymers
    }

    pub fn free_polymer_count(&self) -> usize {
        self.free_polymers.len()
    }

    pub fn polymer(&self, id: u32) -> Option<&ActivePolymer> {
        self.free_polymers.iter().find(|p| p.id() == id)
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Wraps `monomer` in a new free bond.
    pub fn add_bond(&mut self, monomer: Monomer) -> BondId {
        let id = self.bonds.insert(monomer);
        self.free_bonds.push(id);
        trace!("Network '{}': monomer {} wrapped as bond {}.", self.name, monomer.id, id);
        id
    }

    /// Destroys a free bond and hands back its monomer.
    pub fn remove_bond(&mut self, id: BondId) -> Result<Monomer, NetworkError> {
        let bond = self.bonds.get(id).ok_or_else(|| NetworkError::UnknownBond {
            network: self.name.clone(),
            bond: id.0,
        })?;
        if !bond.is_free() {
            return Err(NetworkError::BondNotFree(id.0));
        }
        take_from_pool(&mut self.free_bonds, id);
        self.bonds
            .remove(id)
            .map(|b| b.monomer())
            .ok_or(NetworkError::BondNotFree(id.0))
    }

    /// Disassembles one polymer, returning its bonds (tail -> head) to the free pool.
    pub fn dissolve_polymer(&mut self, polymer_id: u32) -> Result<Vec<BondId>, NetworkError> {
        let pos = self
            .free_polymers
            .iter()
            .position(|p| p.id() == polymer_id)
            .ok_or_else(|| NetworkError::UnknownPolymer {
                network: self.name.clone(),
                polymer: polymer_id,
            })?;
        let polymer = self.free_polymers.remove(pos);
        let freed = polymer.disassemble(&mut self.bonds);
        self.free_bonds.extend(freed.iter().copied());
        debug!("Network '{}': polymer {} dissolved into {} free bonds.", self.name, polymer_id, freed.len());
        Ok(freed)
    }

    /// Tears the network down, handing back every wrapped monomer in bond id order.
    pub fn release_all(mut self) -> Vec<Monomer> {
        for polymer in std::mem::take(&mut self.free_polymers) {
            polymer.disassemble(&mut self.bonds);
        }
        let monomers: Vec<Monomer> = self.bonds.iter().map(ActiveBond::monomer).collect();
        info!("Destroyed active network '{}', released {} monomers.", self.name, monomers.len());
        monomers
    }

    /// Advances the network's kinetics by one simulation step.
    pub fn evolve(&mut self, beads: &mut BeadState) -> EvolveReport {
        self.update_active_bonds_in_cells(beads);
        self.apply_polymer_forces(beads);
        let nucleated = self.nucleate(beads);
        let mut report = self.polymerise(beads);
        report.nucleated = nucleated;
        self.steps += 1;

        if !report.is_quiet() {
            debug!(
                "Network '{}' step {}: {} nucleated, {}+{} grown (head+tail), {} released, {} dissolved; {} free bonds, {} polymers.",
                self.name,
                self.steps,
                report.nucleated,
                report.head_growth,
                report.tail_growth,
                report.released,
                report.dissolved,
                self.free_bonds.len(),
                self.free_polymers.len()
            );
        }

        if cfg!(debug_assertions) {
            if let Err(violation) = self.verify() {
                panic!("Network '{}' corrupted after step {}: {}", self.name, self.steps, violation);
            }
        }

        report
    }

    /// Phase 1: recomputes the cell of every free bond and every chain end from live bead positions.
    /// Interior chain bonds cannot form new links and are not tracked.
    ///
    /// Bonds are anchored by their head bead but links are measured to the
    /// partner's tail bead, so the search reach must cover the capture range
    /// plus the widest tracked monomer. The stencil is widened when it does not.
    pub fn update_active_bonds_in_cells(&mut self, beads: &BeadState) {
        let tracked: Vec<BondId> = self
            .free_bonds
            .iter()
            .copied()
            .chain(self.free_polymers.iter().flat_map(|p| [p.tail_bond(), p.head_bond()]))
            .collect();

        // Cell lookup is read-only; registration stays serial so cell contents keep tracked order.
        let bonds = &self.bonds;
        let grid = &self.grid;
        let params = &self.params;
        let located: Vec<Option<(usize, f64)>> = tracked
            .par_iter()
            .map(|&id| {
                let cell = grid.cell_index(bonds.anchor_position(id, beads)?);
                Some((cell, bonds.monomer_extent(id, beads, params)?))
            })
            .collect();

        let widest = located.iter().flatten().map(|&(_, extent)| extent).fold(0.0, f64::max);
        let needed = search_reach(self.species.params().capture_range + widest, &self.params);
        if needed > self.grid.reach() {
            warn!(
                "Network '{}': monomers up to {:.3} wide need search reach {} (was {}); widening the stencil.",
                self.name,
                widest,
                needed,
                self.grid.reach()
            );
            self.grid.set_reach(needed);
        }

        self.grid.clear_membership();
        for (id, cell) in tracked.into_iter().zip(located) {
            let Some((cell, _)) = cell else {
                panic!("Network '{}': tracked bond {} is missing from the arena", self.name, id);
            };
            self.bonds.set_cell(id, cell);
            self.grid.cell_mut(cell).assign_bond(id);
        }
    }

    /// Phase 2: every polymer applies its internal forces once. Free monomers are untouched.
    pub fn apply_polymer_forces(&self, beads: &mut BeadState) {
        let threshold = self.species.params().size_log_threshold;
        for polymer in &self.free_polymers {
            polymer.add_force(self.species.as_ref(), &self.bonds, beads, &self.params);
            if polymer.size() >= threshold {
                debug!("Network '{}': polymer {} has reached size {}.", self.name, polymer.id(), polymer.size());
            }
        }
    }

    /// Phase 3: each free bond looks for a free partner; a match becomes a new
    /// two-bond polymer with the partner as head and the searching bond as tail.
    pub fn nucleate(&mut self, beads: &BeadState) -> usize {
        let species = self.species.as_ref();
        let mut formed = 0;
        let mut i = 0;

        while i < self.free_bonds.len() {
            let this = self.free_bonds[i];
            let partner = self.bonds[this].cell().and_then(|cell| {
                self.grid.find_nucleation_partner(cell, this, |candidate| {
                    self.bonds.is_free(candidate) && self.bonds.accepts(this, candidate, species, beads, &self.params)
                })
            });
            let Some(target) = partner else {
                i += 1;
                continue;
            };

            let linked = self.bonds.activate(this, target, species, beads, &self.params);
            assert!(linked, "bond {} accepted partner {} but activation failed", this, target);
            let polymer = ActivePolymer::new(self.next_polymer_id, target, this, &self.bonds);
            self.next_polymer_id += 1;
            trace!("Network '{}': bonds {} and {} nucleated polymer {}.", self.name, this, target, polymer.id());
            self.free_polymers.push(polymer);

            // The scan continues at the same index, which now holds the next unprocessed bond.
            self.free_bonds.remove(i);
            let j = take_from_pool(&mut self.free_bonds, target);
            if j < i {
                i -= 1;
            }
            formed += 1;
        }
        formed
    }

    /// Phase 4: every polymer independently tries to capture a free bond at its
    /// head and at its tail, both searches using the ends as they were before
    /// this phase touched the polymer. Species that release ends are checked afterwards.
    pub fn polymerise(&mut self, beads: &BeadState) -> EvolveReport {
        let mut report = EvolveReport::default();
        let Self {
            name,
            species,
            params,
            grid,
            bonds,
            free_bonds,
            free_polymers,
            ..
        } = self;
        let species: &dyn BondSpecies = &**species;
        let mut dissolved = Vec::new();

        for (idx, polymer) in free_polymers.iter_mut().enumerate() {
            let head = polymer.head_bond();
            let tail = polymer.tail_bond();

            if let Some(captured) = find_growth_partner(grid, bonds, species, beads, params, head, ChainEnd::Head) {
                take_from_pool(free_bonds, captured);
                polymer.add_head_bond(captured, bonds);
                report.head_growth += 1;
                trace!("Network '{}': polymer {} captured bond {} at its head.", name, polymer.id(), captured);
            }

            if let Some(captured) = find_growth_partner(grid, bonds, species, beads, params, tail, ChainEnd::Tail) {
                take_from_pool(free_bonds, captured);
                polymer.add_tail_bond(captured, bonds);
                report.tail_growth += 1;
                trace!("Network '{}': polymer {} captured bond {} at its tail.", name, polymer.id(), captured);
            }

            for end in [ChainEnd::Head, ChainEnd::Tail] {
                if !end_releases(bonds, species, beads, params, polymer, end) {
                    continue;
                }
                let freed = match end {
                    ChainEnd::Head => polymer.remove_head_bond(bonds),
                    ChainEnd::Tail => polymer.remove_tail_bond(bonds),
                };
                match freed {
                    Some(bond) => {
                        free_bonds.push(bond);
                        report.released += 1;
                    }
                    None => {
                        dissolved.push(idx);
                        break;
                    }
                }
            }
        }

        for idx in dissolved.into_iter().rev() {
            let polymer = free_polymers.remove(idx);
            let polymer_id = polymer.id();
            free_bonds.extend(polymer.disassemble(bonds));
            report.dissolved += 1;
            trace!("Network '{}': polymer {} fell apart.", name, polymer_id);
        }
        report
    }

    /// Checks pool exclusivity, polymer sizes, link consistency and activation symmetry.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let mut free_set = HashSet::with_capacity(self.free_bonds.len());
        for &id in &self.free_bonds {
            match self.bonds.get(id) {
                Some(bond) if bond.is_free() && bond.link_count() == 0 => {}
                _ => return Err(InvariantViolation::FreeBondActivated(id.0)),
            }
            if !free_set.insert(id) {
                return Err(InvariantViolation::FreeBondActivated(id.0));
            }
        }

        let mut owner: HashMap<BondId, u32> = HashMap::new();
        for polymer in &self.free_polymers {
            let members = polymer.bonds(&self.bonds);
            if members.last() != Some(&polymer.head_bond()) {
                return Err(InvariantViolation::BrokenLinks(polymer.id()));
            }
            if members.len() != polymer.size() {
                return Err(InvariantViolation::SizeMismatch {
                    polymer: polymer.id(),
                    reported: polymer.size(),
                    counted: members.len(),
                });
            }
            if members.len() < 2 {
                return Err(InvariantViolation::PolymerTooSmall(polymer.id()));
            }
            for (pos, &id) in members.iter().enumerate() {
                let bond = &self.bonds[id];
                let expected_tail = if pos == 0 { None } else { Some(members[pos - 1]) };
                let expected_head = members.get(pos + 1).copied();
                if bond.is_free() || bond.tail_link() != expected_tail || bond.head_link() != expected_head {
                    return Err(InvariantViolation::BrokenLinks(polymer.id()));
                }
                if free_set.contains(&id) {
                    return Err(InvariantViolation::BondInTwoPools(id.0, polymer.id()));
                }
                if let Some(first) = owner.insert(id, polymer.id()) {
                    return Err(InvariantViolation::BondSharedByPolymers {
                        bond: id.0,
                        first,
                        second: polymer.id(),
                    });
                }
            }
        }

        for bond in self.bonds.iter() {
            if bond.is_free() && !free_set.contains(&bond.id()) {
                return Err(InvariantViolation::LostFreeBond(bond.id().0));
            }
            if !bond.is_free() && !owner.contains_key(&bond.id()) {
                return Err(InvariantViolation::OrphanActivatedBond(bond.id().0));
            }
        }
        Ok(())
    }

    /// Read-only summary for logs and snapshots.
    pub fn summary(&self) -> NetworkSummary {
        let polymers: Vec<_> = self.free_polymers.iter().map(ActivePolymer::summary).collect();
        let bound: usize = polymers.iter().map(|p| p.size).sum();
        let mean = if polymers.is_empty() { 0.0 } else { bound as f64 / polymers.len() as f64 };
        NetworkSummary {
            name: self.name.clone(),
            free_bond_count: self.free_bonds.len(),
            free_polymer_count: polymers.len(),
            bound_bond_count: bound,
            mean_polymer_size: mean,
            polymers,
        }
    }
}

/// Neighbour layers needed so that any pair closer than `range` is seen from either cell.
fn search_reach(range: f64, params: &BoxParams) -> u32 {
    let narrowest = params.cell_width.iter().copied().fold(f64::INFINITY, f64::min);
    ((range / narrowest).ceil() as u32).max(1)
}

/// Removes `id` from the free pool, preserving order; returns its former position.
/// A free bond missing from the pool means the bookkeeping is corrupt.
///
/// Linear in the pool size. Pool order drives the nucleation scan, so an
/// order-preserving removal is kept over a swap-remove.
fn take_from_pool(pool: &mut Vec<BondId>, id: BondId) -> usize {
    match pool.iter().position(|&b| b == id) {
        Some(pos) => {
            pool.remove(pos);
            pos
        }
        None => panic!("{}", InvariantViolation::LostFreeBond(id.0)),
    }
}

fn find_growth_partner(
    grid: &CellGrid,
    bonds: &BondArena,
    species: &dyn BondSpecies,
    beads: &BeadState,
    params: &BoxParams,
    end_bond: BondId,
    end: ChainEnd,
) -> Option<BondId> {
    let cell = bonds.get(end_bond)?.cell()?;
    grid.find_nucleation_partner(cell, end_bond, |candidate| {
        bonds.is_free(candidate)
            && match end {
                ChainEnd::Head => bonds.accepts(end_bond, candidate, species, beads, params),
                ChainEnd::Tail => bonds.accepts(candidate, end_bond, species, beads, params),
            }
    })
}

fn end_releases(
    bonds: &BondArena,
    species: &dyn BondSpecies,
    beads: &BeadState,
    params: &BoxParams,
    polymer: &ActivePolymer,
    end: ChainEnd,
) -> bool {
    let pair = match end {
        ChainEnd::Head => {
            let head = polymer.head_bond();
            bonds[head].tail_link().map(|inner| (inner, head))
        }
        ChainEnd::Tail => {
            let tail = polymer.tail_bond();
            bonds[tail].head_link().map(|inner| (tail, inner))
        }
    };
    pair.and_then(|(tail_side, head_side)| bonds.link_geometry(tail_side, head_side, beads, params))
        .map_or(false, |geom| species.releases_end(&geom))
}
