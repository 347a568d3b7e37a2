//! Active bonds: the reactive units that wrap one monomer each.
//!
//! Bonds live in a `BondArena` and refer to their chain neighbours by `BondId`,
//! so moving a bond between the free pool and a polymer only moves its id.

use active_network_common::{BoxParams, Vec3};
use std::fmt;

use crate::bead_state::{BeadState, Monomer};
use crate::species::{BondSpecies, LinkGeometry};

/// Stable handle of an active bond inside its network's arena. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BondId(pub u32);

impl fmt::Display for BondId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondState {
    Free,
    Activated,
}

#[derive(Debug, Clone)]
pub struct ActiveBond {
    id: BondId,
    monomer: Monomer,
    state: BondState,
    /// Neighbour toward the polymer head.
    head_link: Option<BondId>,
    /// Neighbour toward the polymer tail.
    tail_link: Option<BondId>,
    /// Cell the bond occupied at the last membership refresh.
    cell: Option<usize>,
}

impl ActiveBond {
    fn new(id: BondId, monomer: Monomer) -> Self {
        Self {
            id,
            monomer,
            state: BondState::Free,
            head_link: None,
            tail_link: None,
            cell: None,
        }
    }

    pub fn id(&self) -> BondId {
        self.id
    }

    pub fn monomer(&self) -> Monomer {
        self.monomer
    }

    pub fn state(&self) -> BondState {
        self.state
    }

    pub fn is_free(&self) -> bool {
        self.state == BondState::Free
    }

    pub fn head_link(&self) -> Option<BondId> {
        self.head_link
    }

    pub fn tail_link(&self) -> Option<BondId> {
        self.tail_link
    }

    pub fn link_count(&self) -> u32 {
        self.head_link.is_some() as u32 + self.tail_link.is_some() as u32
    }

    pub fn cell(&self) -> Option<usize> {
        self.cell
    }

    pub fn set_cell(&mut self, cell: usize) {
        self.cell = Some(cell);
    }
}

/// Contiguous storage for every bond of one network.
#[derive(Debug, Default, Clone)]
pub struct BondArena {
    slots: Vec<Option<ActiveBond>>,
    live: usize,
}

impl BondArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `monomer` in a new free bond.
    pub fn insert(&mut self, monomer: Monomer) -> BondId {
        let id = BondId(self.slots.len() as u32);
        self.slots.push(Some(ActiveBond::new(id, monomer)));
        self.live += 1;
        id
    }

    /// Destroys a bond, returning it. Linked bonds must be deactivated first.
    pub fn remove(&mut self, id: BondId) -> Option<ActiveBond> {
        let slot = self.slots.get_mut(id.0 as usize)?;
        if slot.as_ref().map_or(false, |b| b.link_count() > 0) {
            log::error!("Refusing to destroy bond {} while it is linked into a chain.", id);
            return None;
        }
        let removed = slot.take();
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    pub fn get(&self, id: BondId) -> Option<&ActiveBond> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: BondId) -> Option<&mut ActiveBond> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn set_cell(&mut self, id: BondId, cell: usize) {
        if let Some(bond) = self.get_mut(id) {
            bond.set_cell(cell);
        }
    }

    /// Live bonds in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ActiveBond> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Upper bound on ids handed out so far; bounds chain walks.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_free(&self, id: BondId) -> bool {
        self.get(id).map_or(false, ActiveBond::is_free)
    }

    /// Position of the bead that anchors the bond in the cell grid.
    pub fn anchor_position(&self, id: BondId, beads: &BeadState) -> Option<Vec3> {
        self.get(id).map(|b| beads.position(b.monomer.head_bead))
    }

    /// Distance between the anchoring head bead and the tail bead of the bond's monomer.
    pub fn monomer_extent(&self, id: BondId, beads: &BeadState, params: &BoxParams) -> Option<f64> {
        let monomer = self.get(id)?.monomer;
        if monomer.head_bead == monomer.tail_bead {
            return Some(0.0);
        }
        Some(params.separation(beads.position(monomer.head_bead), beads.position(monomer.tail_bead)).length())
    }

    /// Geometry of the link `tail_side` -> `head_side`, whether or not it exists yet.
    pub fn link_geometry(
        &self,
        tail_side: BondId,
        head_side: BondId,
        beads: &BeadState,
        params: &BoxParams,
    ) -> Option<LinkGeometry> {
        let tail = self.get(tail_side)?.monomer;
        let head = self.get(head_side)?.monomer;
        Some(LinkGeometry {
            separation: params.separation(beads.position(tail.head_bead), beads.position(head.tail_bead)),
            tail_axis: monomer_axis(tail, beads, params),
            head_axis: monomer_axis(head, beads, params),
        })
    }

    /// Bookkeeping half of activation: both link slots are open, neither bond is
    /// saturated, and at least the captured bond is free. Two bonds that are
    /// both already activated are never joined.
    pub fn can_link(&self, tail_side: BondId, head_side: BondId, max_links: u32) -> bool {
        if tail_side == head_side {
            return false;
        }
        let (Some(tail), Some(head)) = (self.get(tail_side), self.get(head_side)) else {
            return false;
        };
        if !tail.is_free() && !head.is_free() {
            return false;
        }
        tail.head_link.is_none()
            && head.tail_link.is_none()
            && tail.link_count() < max_links
            && head.link_count() < max_links
    }

    /// Slot, saturation and species acceptance test for linking `tail_side` to `head_side`.
    pub fn accepts(
        &self,
        tail_side: BondId,
        head_side: BondId,
        species: &dyn BondSpecies,
        beads: &BeadState,
        params: &BoxParams,
    ) -> bool {
        self.can_link(tail_side, head_side, species.active_bonds_per_polymer())
            && self
                .link_geometry(tail_side, head_side, beads, params)
                .map_or(false, |geom| species.accepts(&geom))
    }

    /// Tests and, on success, links two free bonds `tail_side` -> `head_side`, activating both.
    ///
    /// Fails closed: if either bond is already activated, or the pair is
    /// rejected by the species, nothing changes. Chain growth goes through
    /// `ActivePolymer::add_head_bond`/`add_tail_bond` instead.
    pub fn activate(
        &mut self,
        tail_side: BondId,
        head_side: BondId,
        species: &dyn BondSpecies,
        beads: &BeadState,
        params: &BoxParams,
    ) -> bool {
        if self.get(tail_side).is_none() || self.get(head_side).is_none() {
            return false;
        }
        if !self.is_free(tail_side) || !self.is_free(head_side) {
            log::error!(
                "Activation of bonds {} and {} refused: an activated bond cannot be activated again.",
                tail_side,
                head_side
            );
            return false;
        }
        if !self.accepts(tail_side, head_side, species, beads, params) {
            return false;
        }
        self.link(tail_side, head_side);
        true
    }

    /// Unconditionally links `tail_side` -> `head_side` and marks both activated.
    ///
    /// Panics if either slot is already occupied.
    pub(crate) fn link(&mut self, tail_side: BondId, head_side: BondId) {
        let tail = self.get_mut(tail_side).unwrap_or_else(|| panic!("link: bond {} does not exist", tail_side));
        assert!(tail.head_link.is_none(), "bond {} already has a head neighbour", tail_side);
        tail.head_link = Some(head_side);
        tail.state = BondState::Activated;

        let head = self.get_mut(head_side).unwrap_or_else(|| panic!("link: bond {} does not exist", head_side));
        assert!(head.tail_link.is_none(), "bond {} already has a tail neighbour", head_side);
        head.tail_link = Some(tail_side);
        head.state = BondState::Activated;
    }

    /// Unlinks `id` from both neighbours and returns it to the free state.
    /// Neighbours keep their own state; the owning polymer decides their fate.
    pub fn deactivate(&mut self, id: BondId) -> bool {
        let Some(bond) = self.get_mut(id) else {
            return false;
        };
        if bond.is_free() {
            return false;
        }
        let head = bond.head_link.take();
        let tail = bond.tail_link.take();
        bond.state = BondState::Free;

        if let Some(h) = head.and_then(|h| self.get_mut(h)) {
            h.tail_link = None;
        }
        if let Some(t) = tail.and_then(|t| self.get_mut(t)) {
            t.head_link = None;
        }
        true
    }
}

impl std::ops::Index<BondId> for BondArena {
    type Output = ActiveBond;

    fn index(&self, id: BondId) -> &ActiveBond {
        self.get(id).unwrap_or_else(|| panic!("no live bond with id {}", id))
    }
}

fn monomer_axis(monomer: Monomer, beads: &BeadState, params: &BoxParams) -> Option<Vec3> {
    if monomer.head_bead == monomer.tail_bead {
        return None;
    }
    Some(params.separation(beads.position(monomer.tail_bead), beads.position(monomer.head_bead)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::{CofilinSpecies, SpeciesParams};

    fn setup(points: &[Vec3]) -> (BondArena, BeadState, BoxParams, CofilinSpecies) {
        let beads = BeadState::new(points.to_vec());
        let mut arena = BondArena::new();
        for (i, _) in points.iter().enumerate() {
            arena.insert(Monomer::single(i as u32, i));
        }
        let params = BoxParams::new([10.0, 10.0, 10.0], [2, 2, 2], true);
        let species = CofilinSpecies::new(SpeciesParams::linear(1.0, 1.0, 1.0)).unwrap();
        (arena, beads, params, species)
    }

    #[test]
    fn activation_links_and_flips_both_bonds() {
        let (mut arena, beads, params, species) = setup(&[Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.9, 1.0, 1.0)]);
        assert!(arena.activate(BondId(0), BondId(1), &species, &beads, &params));
        assert_eq!(arena[BondId(0)].state(), BondState::Activated);
        assert_eq!(arena[BondId(1)].state(), BondState::Activated);
        assert_eq!(arena[BondId(0)].head_link(), Some(BondId(1)));
        assert_eq!(arena[BondId(1)].tail_link(), Some(BondId(0)));

        // Double activation fails closed.
        assert!(!arena.activate(BondId(0), BondId(1), &species, &beads, &params));
        assert!(!arena.activate(BondId(1), BondId(0), &species, &beads, &params));
        assert_eq!(arena[BondId(0)].link_count(), 1);
    }

    #[test]
    fn activating_a_chain_end_with_a_free_bond_fails_closed() {
        let (mut arena, beads, params, species) = setup(&[
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.8, 1.0, 1.0),
            Vec3::new(2.6, 1.0, 1.0),
        ]);
        assert!(arena.activate(BondId(0), BondId(1), &species, &beads, &params));
        // Geometry and slots would allow 1 -> 2, but bond 1 is already activated.
        assert!(arena.accepts(BondId(1), BondId(2), &species, &beads, &params));
        assert!(!arena.activate(BondId(1), BondId(2), &species, &beads, &params));
        assert!(!arena.activate(BondId(2), BondId(0), &species, &beads, &params));

        assert!(arena.is_free(BondId(2)));
        assert_eq!(arena[BondId(2)].link_count(), 0);
        assert_eq!(arena[BondId(1)].head_link(), None);
        assert_eq!(arena[BondId(0)].tail_link(), None);
    }

    #[test]
    fn monomer_extent_uses_minimum_image() {
        let beads = BeadState::new(vec![Vec3::new(9.8, 1.0, 1.0), Vec3::new(0.3, 1.0, 1.0), Vec3::new(4.0, 4.0, 4.0)]);
        let params = BoxParams::new([10.0, 10.0, 10.0], [2, 2, 2], true);
        let mut arena = BondArena::new();
        let pair = arena.insert(Monomer::new(0, 1, 0));
        let single = arena.insert(Monomer::single(1, 2));
        assert!((arena.monomer_extent(pair, &beads, &params).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(arena.monomer_extent(single, &beads, &params), Some(0.0));
        assert_eq!(arena.monomer_extent(BondId(7), &beads, &params), None);
    }

    #[test]
    fn rejected_activation_leaves_state_unchanged() {
        let (mut arena, beads, params, species) = setup(&[Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 1.0, 1.0)]);
        assert!(!arena.activate(BondId(0), BondId(1), &species, &beads, &params));
        assert!(arena.is_free(BondId(0)));
        assert!(arena.is_free(BondId(1)));
        assert_eq!(arena[BondId(0)].head_link(), None);
    }

    #[test]
    fn periodic_link_crosses_box_edge() {
        let (mut arena, beads, params, species) = setup(&[Vec3::new(9.7, 1.0, 1.0), Vec3::new(0.2, 1.0, 1.0)]);
        let geom = arena.link_geometry(BondId(0), BondId(1), &beads, &params).unwrap();
        assert!((geom.length() - 0.5).abs() < 1e-12);
        assert!(arena.activate(BondId(0), BondId(1), &species, &beads, &params));
    }

    #[test]
    fn deactivate_unlinks_neighbours() {
        let (mut arena, beads, params, species) = setup(&[
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.8, 1.0, 1.0),
            Vec3::new(2.6, 1.0, 1.0),
        ]);
        assert!(arena.activate(BondId(0), BondId(1), &species, &beads, &params));
        assert!(arena.accepts(BondId(1), BondId(2), &species, &beads, &params));
        arena.link(BondId(1), BondId(2));
        assert_eq!(arena[BondId(1)].link_count(), 2);
        // A saturated monomer takes no further links.
        assert!(!arena.can_link(BondId(1), BondId(2), 2));

        assert!(arena.deactivate(BondId(2)));
        assert!(arena.is_free(BondId(2)));
        assert_eq!(arena[BondId(1)].head_link(), None);
        assert!(!arena.deactivate(BondId(2)));

        // Linked bonds cannot be destroyed; free ones can.
        assert!(arena.remove(BondId(1)).is_none());
        assert!(arena.remove(BondId(2)).is_some());
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.capacity(), 3);
    }
}
