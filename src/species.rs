//! Bond species: acceptance rules, per-monomer bond caps and the intra-chain
//! potentials applied by activated bonds.
//!
//! A link always joins a *tail-side* bond to a *head-side* bond. Its length is
//! measured from the tail-side monomer's head bead to the head-side monomer's
//! tail bead (minimum image in periodic boxes).
//!
//! Stretch: U = k2/2 (r - l0)^2
//! Bend:    U = k3 (1 - cos(theta - phi0)), theta the angle between consecutive links

use active_network_common::{angle_between, NetworkConfig, SpeciesKind, Vec3};

use crate::error::SpeciesError;

const EPS: f64 = 1e-12;

/// Validated bond parameters shared by every bond of one network.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesParams {
    pub k2: f64,
    pub l0: f64,
    pub k3: f64,
    /// Preferred bend angle in radians.
    pub phi0: f64,
    pub capture_range: f64,
    pub min_capture_range: f64,
    /// Largest angle in radians between monomer axes, when both monomers have one.
    pub max_axis_angle: Option<f64>,
    pub active_bonds_per_polymer: u32,
    /// Polymers at or above this size are reported in the force phase.
    pub size_log_threshold: usize,
}

impl SpeciesParams {
    /// Linear-spring parameters with no bending and the default per-monomer cap of two.
    pub fn linear(k2: f64, l0: f64, capture_range: f64) -> Self {
        Self {
            k2,
            l0,
            k3: 0.0,
            phi0: 0.0,
            capture_range,
            min_capture_range: 0.0,
            max_axis_angle: None,
            active_bonds_per_polymer: 2,
            size_log_threshold: 10,
        }
    }

    pub fn from_config(cfg: &NetworkConfig) -> Result<Self, SpeciesError> {
        let params = Self {
            k2: cfg.k2,
            l0: cfg.l0,
            k3: cfg.k3,
            phi0: cfg.phi0.to_radians(),
            capture_range: cfg.capture_range,
            min_capture_range: cfg.min_capture_range.unwrap_or(0.0),
            max_axis_angle: match cfg.max_axis_angle {
                Some(deg) if !(deg > 0.0 && deg <= 180.0) => return Err(SpeciesError::InvalidAxisAngle(deg)),
                other => other.map(f64::to_radians),
            },
            active_bonds_per_polymer: cfg.active_bonds_per_polymer,
            size_log_threshold: cfg.size_log_threshold,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), SpeciesError> {
        if !(self.capture_range > 0.0) {
            return Err(SpeciesError::NonPositiveRange(self.capture_range));
        }
        if !(self.min_capture_range >= 0.0 && self.min_capture_range < self.capture_range) {
            return Err(SpeciesError::InvalidMinRange { min: self.min_capture_range, max: self.capture_range });
        }
        if !(self.k2 >= 0.0) {
            return Err(SpeciesError::NegativeSpring { name: "k2", value: self.k2 });
        }
        if !(self.k3 >= 0.0) {
            return Err(SpeciesError::NegativeSpring { name: "k3", value: self.k3 });
        }
        if !(self.l0 >= 0.0) {
            return Err(SpeciesError::NegativeLength(self.l0));
        }
        if self.active_bonds_per_polymer == 0 {
            return Err(SpeciesError::ZeroBondsPerPolymer);
        }
        Ok(())
    }
}

/// Geometry of a prospective or existing link between a tail-side and a head-side bond.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkGeometry {
    /// From the tail-side monomer's head bead to the head-side monomer's tail bead.
    pub separation: Vec3,
    /// Tail bead to head bead of the tail-side monomer, if it has two beads.
    pub tail_axis: Option<Vec3>,
    /// Tail bead to head bead of the head-side monomer, if it has two beads.
    pub head_axis: Option<Vec3>,
}

impl LinkGeometry {
    pub fn length(&self) -> f64 {
        self.separation.length()
    }
}

/// Species-specific behaviour of an active bond.
pub trait BondSpecies: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> SpeciesKind;

    fn params(&self) -> &SpeciesParams;

    /// Identification string used to route commands to the owning network.
    fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    /// Most active bonds a single monomer may host before it is saturated.
    fn active_bonds_per_polymer(&self) -> u32 {
        self.params().active_bonds_per_polymer
    }

    /// Geometric acceptance test for forming `link`.
    fn accepts(&self, link: &LinkGeometry) -> bool;

    /// Whether an existing end link dissociates this step. No sampled species
    /// defines a release rule, so the default never releases.
    fn releases_end(&self, _link: &LinkGeometry) -> bool {
        false
    }

    /// Force on the head-side bead of `link`; the tail-side bead receives the negation.
    fn stretch_force(&self, link: &LinkGeometry) -> Vec3 {
        let p = self.params();
        hookean_force(link.separation, p.k2, p.l0)
    }

    /// Bending forces for an interior bond whose incoming link is `inner` and
    /// outgoing link is `outer`. See [`bend_forces`].
    fn bend_forces(&self, inner: Vec3, outer: Vec3) -> Option<[Vec3; 4]> {
        let p = self.params();
        if p.k3 <= 0.0 {
            return None;
        }
        bend_forces(inner, outer, p.k3, p.phi0)
    }
}

/// Linear filament species: accepts a partner whose link length falls in the capture window.
#[derive(Debug, Clone)]
pub struct CofilinSpecies {
    params: SpeciesParams,
}

impl CofilinSpecies {
    pub fn new(params: SpeciesParams) -> Result<Self, SpeciesError> {
        params.validate()?;
        Ok(Self { params })
    }
}

impl BondSpecies for CofilinSpecies {
    fn kind(&self) -> SpeciesKind {
        SpeciesKind::Cofilin
    }

    fn params(&self) -> &SpeciesParams {
        &self.params
    }

    fn accepts(&self, link: &LinkGeometry) -> bool {
        within_capture_window(&self.params, link.length())
    }
}

/// Branch-forming species: capture window plus an optional limit on the angle
/// between the two monomers' axes.
#[derive(Debug, Clone)]
pub struct Arp23Species {
    params: SpeciesParams,
}

impl Arp23Species {
    pub fn new(params: SpeciesParams) -> Result<Self, SpeciesError> {
        params.validate()?;
        Ok(Self { params })
    }
}

impl BondSpecies for Arp23Species {
    fn kind(&self) -> SpeciesKind {
        SpeciesKind::Arp23
    }

    fn params(&self) -> &SpeciesParams {
        &self.params
    }

    fn accepts(&self, link: &LinkGeometry) -> bool {
        if !within_capture_window(&self.params, link.length()) {
            return false;
        }
        match (self.params.max_axis_angle, link.tail_axis, link.head_axis) {
            (Some(limit), Some(tail), Some(head)) => {
                angle_between(tail, head).map_or(false, |angle| angle <= limit)
            }
            _ => true,
        }
    }
}

/// Builds the species named by a network config.
pub fn species_from_config(cfg: &NetworkConfig) -> Result<Box<dyn BondSpecies>, SpeciesError> {
    let params = SpeciesParams::from_config(cfg)?;
    let species: Box<dyn BondSpecies> = match cfg.species {
        SpeciesKind::Cofilin => Box::new(CofilinSpecies::new(params)?),
        SpeciesKind::Arp23 => Box::new(Arp23Species::new(params)?),
    };
    Ok(species)
}

#[inline(always)]
fn within_capture_window(params: &SpeciesParams, r: f64) -> bool {
    r >= params.min_capture_range && r <= params.capture_range
}

/// Hookean spring force on the bead at the end of `separation`.
pub fn hookean_force(separation: Vec3, k2: f64, l0: f64) -> Vec3 {
    let r = separation.length();
    if r < EPS {
        return Vec3::zero();
    }
    separation * (-k2 * (r - l0) / r)
}

/// Forces from U = k3 (1 - cos(theta - phi0)) where theta is the angle between
/// link vectors `v1` (a -> b) and `v2` (c -> d).
///
/// Returns forces on `[a, b, c, d]`; they sum to zero. For single-bead monomers
/// `b` and `c` are the same bead. Returns `None` when a link is degenerate, or
/// when the chain is exactly straight and phi0 is non-zero (gradient undefined).
pub fn bend_forces(v1: Vec3, v2: Vec3, k3: f64, phi0: f64) -> Option<[Vec3; 4]> {
    let l1 = v1.length();
    let l2 = v2.length();
    if l1 < EPS || l2 < EPS {
        return None;
    }
    let cos_t = (v1.dot(v2) / (l1 * l2)).clamp(-1.0, 1.0);

    // g = dU/dtheta * dtheta/dcos
    let g = if phi0.abs() < EPS {
        -k3
    } else {
        let theta = cos_t.acos();
        let sin_t = theta.sin();
        if sin_t < 1e-9 {
            return None;
        }
        -k3 * (theta - phi0).sin() / sin_t
    };

    let du_dv1 = (v2 / (l1 * l2) - v1 * (cos_t / (l1 * l1))) * g;
    let du_dv2 = (v1 / (l1 * l2) - v2 * (cos_t / (l2 * l2))) * g;

    Some([du_dv1, -du_dv1, du_dv2, -du_dv2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn link(separation: Vec3) -> LinkGeometry {
        LinkGeometry { separation, tail_axis: None, head_axis: None }
    }

    #[test]
    fn hookean_force_pulls_stretched_link_back() {
        let f = hookean_force(Vec3::new(1.5, 0.0, 0.0), 2.0, 1.0);
        assert_abs_diff_eq!(f.x, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.y, 0.0);
        let f = hookean_force(Vec3::new(0.0, 0.5, 0.0), 2.0, 1.0);
        assert_abs_diff_eq!(f.y, 1.0, epsilon = 1e-12);
        assert_eq!(hookean_force(Vec3::zero(), 2.0, 1.0), Vec3::zero());
    }

    #[test]
    fn straight_chain_has_no_bend_force_at_zero_angle() {
        let v = Vec3::new(1.0, 0.0, 0.0);
        let forces = bend_forces(v, v, 5.0, 0.0).unwrap();
        for f in forces {
            assert_abs_diff_eq!(f.length(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn right_angle_bend_restores_toward_straight() {
        let v1 = Vec3::new(1.0, 0.0, 0.0);
        let v2 = Vec3::new(0.0, 1.0, 0.0);
        let [fa, fb, fc, fd] = bend_forces(v1, v2, 1.0, 0.0).unwrap();
        // dU/dv1 = -k3 * v2 / (l1 l2) at cos = 0, force on a is +dU/dv1.
        assert_abs_diff_eq!(fa.y, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fd.x, 1.0, epsilon = 1e-12);
        let total = fa + fb + fc + fd;
        assert_abs_diff_eq!(total.length(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn preferred_angle_is_force_free() {
        let v1 = Vec3::new(1.0, 0.0, 0.0);
        let v2 = Vec3::new(0.0, 1.0, 0.0);
        let forces = bend_forces(v1, v2, 3.0, std::f64::consts::FRAC_PI_2).unwrap();
        for f in forces {
            assert_abs_diff_eq!(f.length(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn cofilin_accepts_inside_window_only() {
        let mut params = SpeciesParams::linear(1.0, 1.0, 1.0);
        params.min_capture_range = 0.2;
        let species = CofilinSpecies::new(params).unwrap();
        assert!(species.accepts(&link(Vec3::new(0.9, 0.0, 0.0))));
        assert!(!species.accepts(&link(Vec3::new(1.1, 0.0, 0.0))));
        assert!(!species.accepts(&link(Vec3::new(0.1, 0.0, 0.0))));
        assert_eq!(species.type_name(), "cofilin");
        assert_eq!(species.active_bonds_per_polymer(), 2);
        assert!(!species.releases_end(&link(Vec3::new(5.0, 0.0, 0.0))));
    }

    #[test]
    fn arp23_checks_axis_alignment() {
        let mut params = SpeciesParams::linear(1.0, 1.0, 1.0);
        params.max_axis_angle = Some(80f64.to_radians());
        let species = Arp23Species::new(params).unwrap();
        let mut geom = link(Vec3::new(0.5, 0.0, 0.0));
        geom.tail_axis = Some(Vec3::new(1.0, 0.0, 0.0));
        geom.head_axis = Some(Vec3::new(1.0, 1.0, 0.0));
        assert!(species.accepts(&geom));
        geom.head_axis = Some(Vec3::new(-1.0, 0.2, 0.0));
        assert!(!species.accepts(&geom));
        // Single-bead monomers have no axis to compare.
        geom.head_axis = None;
        assert!(species.accepts(&geom));
    }

    #[test]
    fn rejects_nonsensical_parameters() {
        assert_eq!(
            CofilinSpecies::new(SpeciesParams::linear(1.0, 1.0, 0.0)).unwrap_err(),
            SpeciesError::NonPositiveRange(0.0)
        );
        let mut params = SpeciesParams::linear(-1.0, 1.0, 1.0);
        assert!(matches!(params.validate(), Err(SpeciesError::NegativeSpring { name: "k2", .. })));
        params.k2 = 1.0;
        params.active_bonds_per_polymer = 0;
        assert_eq!(params.validate(), Err(SpeciesError::ZeroBondsPerPolymer));
        params.active_bonds_per_polymer = 2;
        params.min_capture_range = 1.0;
        assert!(matches!(params.validate(), Err(SpeciesError::InvalidMinRange { .. })));
    }
}
