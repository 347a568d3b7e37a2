use serde::{Deserialize, Serialize};
use crate::vecmath::Vec3;

/// Box geometry derived from the configuration, shared by every active network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxParams {
    pub box_size: [f64; 3],
    pub cells_per_axis: [u32; 3],
    pub cell_width: [f64; 3],
    pub inv_cell_width: [f64; 3],
    pub num_cells: u32,
    pub periodic: bool,
}

impl BoxParams {
    pub fn new(box_size: [f64; 3], cells_per_axis: [u32; 3], periodic: bool) -> Self {
        let mut cell_width = [0.0; 3];
        let mut inv_cell_width = [0.0; 3];
        for axis in 0..3 {
            let n = cells_per_axis[axis].max(1);
            cell_width[axis] = box_size[axis] / n as f64;
            inv_cell_width[axis] = if cell_width[axis] > 1e-12 { 1.0 / cell_width[axis] } else { 0.0 };
        }
        let num_cells = cells_per_axis.iter().product();

        BoxParams {
            box_size,
            cells_per_axis,
            cell_width,
            inv_cell_width,
            num_cells,
            periodic,
        }
    }

    /// Separation vector `to - from`, using the minimum image when the box is periodic.
    pub fn separation(&self, from: Vec3, to: Vec3) -> Vec3 {
        let mut d = (to - from).to_array();
        if self.periodic {
            for (axis, component) in d.iter_mut().enumerate() {
                let len = self.box_size[axis];
                *component -= len * (*component / len).round();
            }
        }
        Vec3::from_array(d)
    }

    /// Maps a position back into the box, wrapping or clamping per the boundary mode.
    pub fn confine(&self, pos: Vec3) -> Vec3 {
        let mut p = pos.to_array();
        for (axis, component) in p.iter_mut().enumerate() {
            let len = self.box_size[axis];
            if self.periodic {
                *component = component.rem_euclid(len);
            } else {
                *component = component.max(0.0).min(len);
            }
        }
        Vec3::from_array(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_separation_uses_minimum_image() {
        let params = BoxParams::new([10.0, 10.0, 10.0], [2, 2, 2], true);
        let d = params.separation(Vec3::new(9.5, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0));
        assert!((d.x - 1.0).abs() < 1e-12);

        let bounded = BoxParams::new([10.0, 10.0, 10.0], [2, 2, 2], false);
        let d = bounded.separation(Vec3::new(9.5, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0));
        assert!((d.x + 9.0).abs() < 1e-12);
    }

    #[test]
    fn confine_wraps_or_clamps() {
        let periodic = BoxParams::new([10.0, 10.0, 10.0], [1, 1, 1], true);
        assert_eq!(periodic.confine(Vec3::new(-1.0, 11.0, 5.0)), Vec3::new(9.0, 1.0, 5.0));
        let bounded = BoxParams::new([10.0, 10.0, 10.0], [1, 1, 1], false);
        assert_eq!(bounded.confine(Vec3::new(-1.0, 11.0, 5.0)), Vec3::new(0.0, 10.0, 5.0));
    }
}
