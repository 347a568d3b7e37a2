use active_network_common::{BoxParams, PolymerSummary};

use crate::active_bond::{BondArena, BondId};
use crate::bead_state::BeadState;
use crate::species::BondSpecies;

/// An ordered chain of activated bonds, walked tail -> head through the bonds' links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePolymer {
    id: u32,
    head: BondId,
    tail: BondId,
    size: usize,
}

impl ActivePolymer {
    /// Wraps a freshly nucleated pair. `tail` must already be linked to `head`.
    pub fn new(id: u32, head: BondId, tail: BondId, bonds: &BondArena) -> Self {
        assert_eq!(
            bonds[tail].head_link(),
            Some(head),
            "nucleated bonds {} and {} are not linked",
            tail,
            head
        );
        Self { id, head, tail, size: 2 }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn head_bond(&self) -> BondId {
        self.head
    }

    pub fn tail_bond(&self) -> BondId {
        self.tail
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Bonds actually reachable from tail to head; equals `size()` unless bookkeeping is corrupt.
    pub fn chain_len(&self, bonds: &BondArena) -> usize {
        self.bonds(bonds).len()
    }

    /// Links a free bond beyond the current head and makes it the new head.
    ///
    /// The caller has already taken `bond` out of the free pool. Panics if the bond is not free.
    pub fn add_head_bond(&mut self, bond: BondId, bonds: &mut BondArena) {
        assert!(bonds.is_free(bond), "bond {} is not free and cannot join polymer {}", bond, self.id);
        bonds.link(self.head, bond);
        self.head = bond;
        self.size += 1;
        debug_assert_eq!(self.size, self.chain_len(bonds), "polymer {} size drifted", self.id);
    }

    /// Links a free bond before the current tail and makes it the new tail.
    pub fn add_tail_bond(&mut self, bond: BondId, bonds: &mut BondArena) {
        assert!(bonds.is_free(bond), "bond {} is not free and cannot join polymer {}", bond, self.id);
        bonds.link(bond, self.tail);
        self.tail = bond;
        self.size += 1;
        debug_assert_eq!(self.size, self.chain_len(bonds), "polymer {} size drifted", self.id);
    }

    /// Detaches and frees the head bond, unless that would leave fewer than two bonds.
    pub fn remove_head_bond(&mut self, bonds: &mut BondArena) -> Option<BondId> {
        if self.size <= 2 {
            return None;
        }
        let old = self.head;
        let new_head = bonds[old].tail_link()?;
        bonds.deactivate(old);
        self.head = new_head;
        self.size -= 1;
        Some(old)
    }

    /// Detaches and frees the tail bond, unless that would leave fewer than two bonds.
    pub fn remove_tail_bond(&mut self, bonds: &mut BondArena) -> Option<BondId> {
        if self.size <= 2 {
            return None;
        }
        let old = self.tail;
        let new_tail = bonds[old].head_link()?;
        bonds.deactivate(old);
        self.tail = new_tail;
        self.size -= 1;
        Some(old)
    }

    /// Frees every bond in the chain, returning them tail -> head.
    pub fn disassemble(self, bonds: &mut BondArena) -> Vec<BondId> {
        let members = self.bonds(bonds);
        for &bond in &members {
            bonds.deactivate(bond);
        }
        members
    }

    /// Member bonds, tail -> head.
    pub fn bonds(&self, bonds: &BondArena) -> Vec<BondId> {
        let mut members = Vec::with_capacity(self.size);
        let mut cursor = Some(self.tail);
        while let Some(current) = cursor {
            members.push(current);
            if current == self.head || members.len() > bonds.capacity() {
                break;
            }
            cursor = bonds.get(current).and_then(|b| b.head_link());
        }
        members
    }

    /// Applies every link's stretch force and every interior bond's bend force once.
    pub fn add_force(&self, species: &dyn BondSpecies, bonds: &BondArena, beads: &mut BeadState, params: &BoxParams) {
        let members = self.bonds(bonds);

        for pair in members.windows(2) {
            let (tail_side, head_side) = (pair[0], pair[1]);
            let Some(geom) = bonds.link_geometry(tail_side, head_side, beads, params) else {
                continue;
            };
            let force = species.stretch_force(&geom);
            beads.add_force(bonds[head_side].monomer().tail_bead, force);
            beads.add_force(bonds[tail_side].monomer().head_bead, -force);
        }

        for triple in members.windows(3) {
            let (a, b, c) = (bonds[triple[0]].monomer(), bonds[triple[1]].monomer(), bonds[triple[2]].monomer());
            let inner = params.separation(beads.position(a.head_bead), beads.position(b.tail_bead));
            let outer = params.separation(beads.position(b.head_bead), beads.position(c.tail_bead));
            if let Some([fa, fb, fc, fd]) = species.bend_forces(inner, outer) {
                beads.add_force(a.head_bead, fa);
                beads.add_force(b.tail_bead, fb);
                beads.add_force(b.head_bead, fc);
                beads.add_force(c.tail_bead, fd);
            }
        }
    }

    pub fn summary(&self) -> PolymerSummary {
        PolymerSummary {
            id: self.id,
            size: self.size,
            head_bond: self.head.0,
            tail_bond: self.tail.0,
        }
    }
}
