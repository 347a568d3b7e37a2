use active_network_common::{BoxParams, Vec3};

use crate::active_bond::BondId;

/// One cubical region of the simulation box.
///
/// Membership is routing information only: the cell records which active bonds
/// currently sit inside it, it never owns them.
#[derive(Debug, Clone)]
pub struct SpatialCell {
    index: [u32; 3],
    origin: Vec3,
    width: [f64; 3],
    /// Flat indices of the search stencil: this cell first, then its distinct
    /// neighbours within the grid's reach in (dz, dy, dx) lexicographic order.
    stencil: Vec<usize>,
    bonds: Vec<BondId>,
}

impl SpatialCell {
    pub fn index(&self) -> [u32; 3] {
        self.index
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn width(&self) -> [f64; 3] {
        self.width
    }

    /// Records that `bond` currently lies in this cell.
    pub fn assign_bond(&mut self, bond: BondId) {
        self.bonds.push(bond);
    }

    /// Bonds registered this step, in registration order.
    pub fn bonds(&self) -> &[BondId] {
        &self.bonds
    }

    pub fn stencil(&self) -> &[usize] {
        &self.stencil
    }

    pub fn contains(&self, pos: Vec3) -> bool {
        (0..3).all(|axis| {
            let lo = self.origin.axis(axis);
            let p = pos.axis(axis);
            p >= lo && p < lo + self.width[axis]
        })
    }
}

/// Regular 3D decomposition of the box into `SpatialCell`s.
#[derive(Debug, Clone)]
pub struct CellGrid {
    dims: [u32; 3],
    inv_width: [f64; 3],
    periodic: bool,
    /// Neighbour layers scanned around a cell; 1 gives the 27-cell stencil.
    reach: u32,
    cells: Vec<SpatialCell>,
}

impl CellGrid {
    pub fn new(params: &BoxParams) -> Self {
        Self::with_reach(params, 1)
    }

    pub fn with_reach(params: &BoxParams, reach: u32) -> Self {
        let reach = reach.max(1);
        let dims = params.cells_per_axis.map(|n| n.max(1));
        let mut cells = Vec::with_capacity(params.num_cells as usize);

        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    let index = [x, y, z];
                    let origin = Vec3::new(
                        x as f64 * params.cell_width[0],
                        y as f64 * params.cell_width[1],
                        z as f64 * params.cell_width[2],
                    );
                    cells.push(SpatialCell {
                        index,
                        origin,
                        width: params.cell_width,
                        stencil: build_stencil(index, dims, params.periodic, reach),
                        bonds: Vec::new(),
                    });
                }
            }
        }

        Self {
            dims,
            inv_width: params.inv_cell_width,
            periodic: params.periodic,
            reach,
            cells,
        }
    }

    pub fn reach(&self) -> u32 {
        self.reach
    }

    /// Rebuilds every stencil to scan `reach` neighbour layers. Membership is kept.
    pub fn set_reach(&mut self, reach: u32) {
        let reach = reach.max(1);
        if reach == self.reach {
            return;
        }
        self.reach = reach;
        let (dims, periodic) = (self.dims, self.periodic);
        for cell in &mut self.cells {
            cell.stencil = build_stencil(cell.index, dims, periodic, reach);
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, idx: usize) -> &SpatialCell {
        &self.cells[idx]
    }

    pub fn cell_mut(&mut self, idx: usize) -> &mut SpatialCell {
        &mut self.cells[idx]
    }

    /// Calculates the flat cell index for a position, clamping strays onto the edge cells.
    #[inline(always)]
    pub fn cell_index(&self, pos: Vec3) -> usize {
        let mut c = [0u32; 3];
        for axis in 0..3 {
            let raw = (pos.axis(axis) * self.inv_width[axis]).floor();
            c[axis] = if raw <= 0.0 { 0 } else { (raw as u32).min(self.dims[axis] - 1) };
        }
        flat_index(c, self.dims)
    }

    /// Forgets every membership recorded in the previous step.
    pub fn clear_membership(&mut self) {
        self.cells.iter_mut().for_each(|cell| cell.bonds.clear());
    }

    /// Scans the stencil of cell `cell_idx` for a bond other than `searcher`
    /// for which `accept` returns true.
    ///
    /// Candidates are visited cell by cell in stencil order and, within a cell,
    /// in registration order; the first accepted candidate wins. Used both for
    /// nucleation (two free bonds) and growth (chain end plus free bond).
    pub fn find_nucleation_partner<F>(&self, cell_idx: usize, searcher: BondId, mut accept: F) -> Option<BondId>
    where
        F: FnMut(BondId) -> bool,
    {
        let cell = self.cells.get(cell_idx)?;
        for &neighbour_idx in &cell.stencil {
            for &candidate in &self.cells[neighbour_idx].bonds {
                if candidate == searcher {
                    continue;
                }
                if accept(candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

#[inline(always)]
fn flat_index(c: [u32; 3], dims: [u32; 3]) -> usize {
    ((c[2] * dims[1] + c[1]) * dims[0] + c[0]) as usize
}

fn build_stencil(index: [u32; 3], dims: [u32; 3], periodic: bool, reach: u32) -> Vec<usize> {
    let own = flat_index(index, dims);
    let mut stencil = vec![own];
    let r = reach as i64;

    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                let offset = [dx, dy, dz];
                let mut neighbour = [0u32; 3];
                let mut inside = true;
                for axis in 0..3 {
                    let n = dims[axis] as i64;
                    let mut c = index[axis] as i64 + offset[axis];
                    if periodic {
                        c = c.rem_euclid(n);
                    } else if c < 0 || c >= n {
                        inside = false;
                        break;
                    }
                    neighbour[axis] = c as u32;
                }
                if !inside {
                    continue;
                }
                // Small periodic grids wrap several offsets onto the same cell.
                let flat = flat_index(neighbour, dims);
                if !stencil.contains(&flat) {
                    stencil.push(flat);
                }
            }
        }
    }
    stencil
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cells: u32, periodic: bool) -> CellGrid {
        CellGrid::new(&BoxParams::new([10.0, 10.0, 10.0], [cells, cells, cells], periodic))
    }

    #[test]
    fn positions_map_to_cells() {
        let g = grid(2, true);
        assert_eq!(g.len(), 8);
        assert_eq!(g.cell_index(Vec3::new(1.0, 1.0, 1.0)), 0);
        assert_eq!(g.cell_index(Vec3::new(6.0, 1.0, 1.0)), 1);
        assert_eq!(g.cell_index(Vec3::new(1.0, 6.0, 1.0)), 2);
        assert_eq!(g.cell_index(Vec3::new(6.0, 6.0, 6.0)), 7);
        // Out-of-range positions clamp onto edge cells.
        assert_eq!(g.cell_index(Vec3::new(-0.5, 10.0, 12.0)), g.cell_index(Vec3::new(0.0, 9.9, 9.9)));
        assert!(g.cell(7).contains(Vec3::new(6.0, 6.0, 6.0)));
        assert_eq!(g.cell(7).index(), [1, 1, 1]);
    }

    #[test]
    fn periodic_stencil_deduplicates_wrapped_neighbours() {
        let g = grid(2, true);
        let stencil = g.cell(0).stencil();
        assert_eq!(stencil.len(), 8);
        assert_eq!(stencil[0], 0);

        let big = grid(4, true);
        assert_eq!(big.cell(0).stencil().len(), 27);
    }

    #[test]
    fn bounded_stencil_stops_at_walls() {
        let g = grid(4, false);
        // Corner cell sees itself and 7 neighbours.
        assert_eq!(g.cell(0).stencil().len(), 8);
        // Interior cell sees the full 27.
        let interior = g.cell_index(Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(g.cell(interior).stencil().len(), 27);
    }

    #[test]
    fn wider_reach_grows_the_stencil() {
        let mut g = grid(8, true);
        assert_eq!(g.reach(), 1);
        assert_eq!(g.cell(0).stencil().len(), 27);

        let far = g.cell_index(Vec3::new(3.0, 0.5, 0.5));
        g.cell_mut(far).assign_bond(BondId(4));
        assert_eq!(g.find_nucleation_partner(0, BondId(0), |_| true), None);

        g.set_reach(2);
        assert_eq!(g.cell(0).stencil().len(), 125);
        assert_eq!(g.cell(0).stencil()[0], 0);
        assert_eq!(g.find_nucleation_partner(0, BondId(0), |_| true), Some(BondId(4)));

        // On a small periodic grid the wider stencil still lists each cell once.
        let small = CellGrid::with_reach(&BoxParams::new([10.0, 10.0, 10.0], [3, 3, 3], true), 2);
        assert_eq!(small.cell(0).stencil().len(), 27);
    }

    #[test]
    fn partner_search_takes_first_in_stencil_order() {
        let mut g = grid(4, false);
        let own = g.cell_index(Vec3::new(3.0, 3.0, 3.0));
        let neighbour = g.cell_index(Vec3::new(1.0, 3.0, 3.0));
        g.cell_mut(neighbour).assign_bond(BondId(5));
        g.cell_mut(own).assign_bond(BondId(1));
        g.cell_mut(own).assign_bond(BondId(2));
        g.cell_mut(own).assign_bond(BondId(3));

        // Own cell is scanned first, in registration order, skipping the searcher.
        assert_eq!(g.find_nucleation_partner(own, BondId(1), |_| true), Some(BondId(2)));
        assert_eq!(g.find_nucleation_partner(own, BondId(1), |b| b != BondId(2)), Some(BondId(3)));
        assert_eq!(g.find_nucleation_partner(own, BondId(1), |b| b == BondId(5)), Some(BondId(5)));
        assert_eq!(g.find_nucleation_partner(own, BondId(1), |_| false), None);

        g.clear_membership();
        assert_eq!(g.find_nucleation_partner(own, BondId(1), |_| true), None);
    }
}
