use active_network_common::{BoxParams, NetworkConfig, Snapshot, SimulationConfig, Vec3};
use anyhow::Result;
use log::{debug, info, trace};
use rand::distr::Uniform;
use rand::prelude::*;
use rand_distr::{Normal, UnitSphere};
use rayon::prelude::*;
use std::collections::HashMap;

use crate::active_bond::BondId;
use crate::bead_state::{BeadState, Monomer};
use crate::error::NetworkError;
use crate::network::{ActiveCellNetwork, EvolveReport};
use crate::species::{hookean_force, species_from_config};

/// Minimal simulation box that owns beads and monomers and drives the active
/// networks attached to it.
///
/// The integrator is an overdamped Langevin update; it only exists so that
/// networks see moving beads between steps.
pub struct ShadowSimBox {
    config: SimulationConfig,
    params: BoxParams,
    beads: BeadState,
    monomers: Vec<Monomer>,
    /// Monomer id -> name of the network currently wrapping it.
    wrapped: HashMap<u32, String>,
    networks: Vec<ActiveCellNetwork>,
    current_step: u32,
    recorded_snapshots: Vec<Snapshot>,
}

impl ShadowSimBox {
    /// Places the initial monomers and builds every configured network.
    ///
    /// Networks wrap disjoint runs of monomers, in configuration order, each
    /// taking `monomer_fraction` of the population.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.initial_conditions.placement_seed);
        let params = config.box_params();
        let (beads, monomers) = place_initial_monomers(&config, &params, &mut rng)?;
        info!("Placed {} monomers ({} beads).", monomers.len(), beads.len());

        let mut sim = Self {
            config,
            params,
            beads,
            monomers,
            wrapped: HashMap::new(),
            networks: Vec::new(),
            current_step: 0,
            recorded_snapshots: Vec::new(),
        };

        let total = sim.monomers.len();
        let mut cursor = 0usize;
        for net_cfg in sim.config.networks.clone() {
            let name = sim.create_network(&net_cfg)?;
            let share = ((net_cfg.monomer_fraction * total as f64).floor() as usize).min(total - cursor);
            for monomer_id in cursor..cursor + share {
                sim.add_active_bond(&name, monomer_id as u32)?;
            }
            cursor += share;
            info!("Network '{}' wraps {} monomers.", name, share);
        }
        Ok(sim)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn params(&self) -> &BoxParams {
        &self.params
    }

    pub fn beads(&self) -> &BeadState {
        &self.beads
    }

    pub fn beads_mut(&mut self) -> &mut BeadState {
        &mut self.beads
    }

    pub fn monomers(&self) -> &[Monomer] {
        &self.monomers
    }

    pub fn networks(&self) -> &[ActiveCellNetwork] {
        &self.networks
    }

    pub fn network(&self, name: &str) -> Option<&ActiveCellNetwork> {
        self.networks.iter().find(|n| n.name() == name)
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    /// Name of the network wrapping `monomer_id`, if any.
    pub fn owner_of(&self, monomer_id: u32) -> Option<&str> {
        self.wrapped.get(&monomer_id).map(String::as_str)
    }

    /// Creates an empty network for the configured species and returns its name.
    /// At most one network per species may exist.
    pub fn create_network(&mut self, net_cfg: &NetworkConfig) -> Result<String, NetworkError> {
        let species = species_from_config(net_cfg)?;
        let name = species.type_name().to_string();
        if self.network(&name).is_some() {
            return Err(NetworkError::DuplicateNetwork(name));
        }
        self.networks.push(ActiveCellNetwork::new(species, self.params.clone()));
        Ok(name)
    }

    /// Destroys a network, releasing every monomer it wrapped. Returns the released monomer ids.
    pub fn destroy_network(&mut self, name: &str) -> Result<Vec<u32>, NetworkError> {
        let pos = self
            .networks
            .iter()
            .position(|n| n.name() == name)
            .ok_or_else(|| NetworkError::UnknownNetwork(name.to_string()))?;
        let released: Vec<u32> = self.networks.remove(pos).release_all().into_iter().map(|m| m.id).collect();
        for id in &released {
            self.wrapped.remove(id);
        }
        Ok(released)
    }

    /// Wraps an unwrapped monomer in a new free bond of `network`.
    pub fn add_active_bond(&mut self, network: &str, monomer_id: u32) -> Result<BondId, NetworkError> {
        let net_idx = self.network_index(network)?;
        let monomer = *self
            .monomers
            .get(monomer_id as usize)
            .ok_or(NetworkError::UnknownMonomer(monomer_id))?;
        if self.wrapped.contains_key(&monomer_id) {
            return Err(NetworkError::MonomerAlreadyWrapped(monomer_id));
        }
        let bond = self.networks[net_idx].add_bond(monomer);
        self.wrapped.insert(monomer_id, network.to_string());
        Ok(bond)
    }

    /// Destroys a free bond and returns the id of the monomer it released.
    pub fn remove_active_bond(&mut self, network: &str, bond: BondId) -> Result<u32, NetworkError> {
        let net_idx = self.network_index(network)?;
        let monomer = self.networks[net_idx].remove_bond(bond)?;
        self.wrapped.remove(&monomer.id);
        Ok(monomer.id)
    }

    pub fn dissolve_polymer(&mut self, network: &str, polymer_id: u32) -> Result<Vec<BondId>, NetworkError> {
        let net_idx = self.network_index(network)?;
        self.networks[net_idx].dissolve_polymer(polymer_id)
    }

    /// Advances the box by one timestep: network kinetics first, then bead motion.
    pub fn step(&mut self) -> Result<()> {
        self.beads.clear_forces();

        for network in &mut self.networks {
            let report: EvolveReport = network.evolve(&mut self.beads);
            trace!("Step {} network '{}': {:?}", self.current_step, network.name(), report);
        }
        self.apply_monomer_springs();

        self.integrate()?;
        self.current_step += 1;
        Ok(())
    }

    /// Holds each two-bead monomer at its rest spacing.
    fn apply_monomer_springs(&mut self) {
        let k = self.config.initial_conditions.monomer_stiffness;
        let l0 = self.config.initial_conditions.monomer_bond_length;
        if k <= 0.0 {
            return;
        }
        for m in &self.monomers {
            if m.head_bead == m.tail_bead {
                continue;
            }
            let sep = self.params.separation(self.beads.position(m.tail_bead), self.beads.position(m.head_bead));
            let force = hookean_force(sep, k, l0);
            self.beads.add_force(m.head_bead, force);
            self.beads.add_force(m.tail_bead, -force);
        }
    }

    /// Overdamped Langevin update: dx = F dt / gamma + sqrt(2 kT dt / gamma) xi.
    fn integrate(&mut self) -> Result<()> {
        let dt = self.config.timing.dt;
        let gamma = self.config.thermostat.friction;
        if gamma <= 0.0 {
            anyhow::bail!("Thermostat friction must be positive, got {}.", gamma);
        }
        let noise = Normal::new(0.0, (2.0 * self.config.thermostat.kt * dt / gamma).max(0.0).sqrt())?;
        let seed = self.config.initial_conditions.placement_seed;
        let time_step = self.current_step as u64;
        let params = &self.params;

        let BeadState { positions, velocities, forces } = &mut self.beads;
        positions
            .par_iter_mut()
            .zip(velocities.par_iter_mut())
            .zip(forces.par_iter())
            .enumerate()
            .for_each(|(idx, ((pos, vel), force))| {
                // Per-bead stream so the result is independent of thread scheduling.
                let mut rng = StdRng::seed_from_u64(
                    seed.wrapping_add(idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(time_step),
                );
                let kick = Vec3::new(rng.sample(noise), rng.sample(noise), rng.sample(noise));
                let displacement = *force * (dt / gamma) + kick;
                *vel = displacement / dt;
                *pos = params.confine(*pos + displacement);
            });
        Ok(())
    }

    /// Collects network summaries for the current step.
    pub fn record_snapshot(&mut self) -> Result<()> {
        let time = self.current_step as f64 * self.config.timing.dt;
        debug!("Recording snapshot at step {} (t = {:.3})...", self.current_step, time);

        let networks: Vec<_> = self.networks.iter().map(ActiveCellNetwork::summary).collect();
        for summary in &networks {
            debug!(
                "  '{}': {} free bonds, {} polymers, mean size {:.2}",
                summary.name, summary.free_bond_count, summary.free_polymer_count, summary.mean_polymer_size
            );
        }
        self.recorded_snapshots.push(Snapshot {
            step: self.current_step,
            time,
            total_bead_count: self.beads.len(),
            networks,
        });
        Ok(())
    }

    pub fn get_recorded_snapshots(&self) -> &Vec<Snapshot> {
        &self.recorded_snapshots
    }

    fn network_index(&self, name: &str) -> Result<usize, NetworkError> {
        self.networks
            .iter()
            .position(|n| n.name() == name)
            .ok_or_else(|| NetworkError::UnknownNetwork(name.to_string()))
    }
}

/// Jittered grid placement: the box is split into roughly cubic bins, bins are
/// shuffled and one monomer is dropped uniformly inside each chosen bin.
fn place_initial_monomers(
    config: &SimulationConfig,
    params: &BoxParams,
    rng: &mut StdRng,
) -> Result<(BeadState, Vec<Monomer>)> {
    let ic = &config.initial_conditions;
    let count = ic.num_monomers as usize;
    let per_axis = ((count as f64).cbrt().ceil() as usize).max(1);

    let mut bins: Vec<[usize; 3]> = (0..per_axis)
        .flat_map(|ix| (0..per_axis).flat_map(move |iy| (0..per_axis).map(move |iz| [ix, iy, iz])))
        .collect();
    bins.shuffle(rng);
    bins.truncate(count);

    let bin_w = params.box_size.map(|side| side / per_axis as f64);
    let mut beads = BeadState::default();
    let mut monomers = Vec::with_capacity(count);

    for (id, bin) in bins.into_iter().enumerate() {
        let mut p = [0.0; 3];
        for axis in 0..3 {
            let lo = bin[axis] as f64 * bin_w[axis];
            p[axis] = rng.sample(Uniform::new(lo, lo + bin_w[axis])?);
        }
        let tail_pos = Vec3::from_array(p);
        let tail_bead = beads.add_bead(tail_pos);

        let monomer = if ic.beads_per_monomer == 2 {
            let dir: [f64; 3] = UnitSphere.sample(rng);
            let head_pos = params.confine(tail_pos + Vec3::from_array(dir) * ic.monomer_bond_length);
            let head_bead = beads.add_bead(head_pos);
            Monomer::new(id as u32, head_bead, tail_bead)
        } else {
            Monomer::single(id as u32, tail_bead)
        };
        monomers.push(monomer);
    }
    Ok((beads, monomers))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[universe]
width = 10.0
height = 10.0
depth = 10.0
cells_x = 2
cells_y = 2
cells_z = 2

[timing]
dt = 0.01
total_steps = 5

[initial_conditions]
num_monomers = 40
placement_seed = 7

[[networks]]
species = "cofilin"
monomer_fraction = 0.5
k2 = 10.0
l0 = 0.5
capture_range = 1.0

[[networks]]
species = "arp23"
monomer_fraction = 0.25
k2 = 10.0
l0 = 0.5
capture_range = 1.0

[output]
base_filename = "test"
save_stats = false
save_polymers = false
"#;

    fn build() -> ShadowSimBox {
        ShadowSimBox::new(SimulationConfig::from_toml_str(CONFIG).unwrap()).unwrap()
    }

    fn inside(params: &BoxParams, p: Vec3) -> bool {
        (0..3).all(|axis| p.axis(axis) >= 0.0 && p.axis(axis) <= params.box_size[axis])
    }

    #[test]
    fn places_monomers_inside_box_and_wraps_disjoint_shares() {
        let sim = build();
        assert_eq!(sim.monomers().len(), 40);
        assert_eq!(sim.beads().len(), 40);
        assert!(sim.beads().positions.iter().all(|&p| inside(sim.params(), p)));

        let cofilin = sim.network("cofilin").unwrap();
        let arp23 = sim.network("arp23").unwrap();
        assert_eq!(cofilin.free_bond_count(), 20);
        assert_eq!(arp23.free_bond_count(), 10);
        assert_eq!(sim.owner_of(0), Some("cofilin"));
        assert_eq!(sim.owner_of(25), Some("arp23"));
        assert_eq!(sim.owner_of(35), None);
    }

    #[test]
    fn two_bead_monomers_keep_their_spacing() {
        let config = CONFIG.replace("placement_seed = 7", "placement_seed = 7\nbeads_per_monomer = 2");
        let sim = ShadowSimBox::new(SimulationConfig::from_toml_str(&config).unwrap()).unwrap();
        assert_eq!(sim.beads().len(), 80);
        for m in sim.monomers() {
            assert_ne!(m.head_bead, m.tail_bead);
            let sep = sim.params().separation(sim.beads().position(m.tail_bead), sim.beads().position(m.head_bead));
            assert!((sep.length() - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn monomer_spring_pulls_stretched_beads_back() {
        let config = CONFIG
            .replace("placement_seed = 7", "placement_seed = 7\nbeads_per_monomer = 2")
            .replace("total_steps = 5", "total_steps = 5\n\n[thermostat]\nkt = 0.0");
        let mut sim = ShadowSimBox::new(SimulationConfig::from_toml_str(&config).unwrap()).unwrap();
        let m = sim.monomers()[0];
        let tail = sim.beads().position(m.tail_bead);
        let stretched = sim.params().confine(tail + Vec3::new(1.0, 0.0, 0.0));
        sim.beads_mut().positions[m.head_bead] = stretched;

        sim.step().unwrap();
        let sep = sim.params().separation(sim.beads().position(m.tail_bead), sim.beads().position(m.head_bead));
        assert!(sep.length() < 0.9);
        assert!(sep.length() > 0.5);
    }

    #[test]
    fn commands_enforce_wrapping_rules() {
        let mut sim = build();
        let cfg = sim.config().networks[0].clone();
        assert!(matches!(sim.create_network(&cfg), Err(NetworkError::DuplicateNetwork(_))));
        assert!(matches!(sim.add_active_bond("cofilin", 3), Err(NetworkError::MonomerAlreadyWrapped(3))));
        assert!(matches!(sim.add_active_bond("cofilin", 400), Err(NetworkError::UnknownMonomer(400))));
        assert!(matches!(sim.add_active_bond("myosin", 35), Err(NetworkError::UnknownNetwork(_))));

        let bond = sim.add_active_bond("arp23", 35).unwrap();
        assert_eq!(sim.owner_of(35), Some("arp23"));
        assert_eq!(sim.remove_active_bond("arp23", bond).unwrap(), 35);
        assert_eq!(sim.owner_of(35), None);
        assert!(matches!(sim.dissolve_polymer("arp23", 99), Err(NetworkError::UnknownPolymer { .. })));
    }

    #[test]
    fn destroying_a_network_releases_its_monomers() {
        let mut sim = build();
        for _ in 0..3 {
            sim.step().unwrap();
        }
        let released = sim.destroy_network("cofilin").unwrap();
        assert_eq!(released.len(), 20);
        assert!(sim.network("cofilin").is_none());
        assert_eq!(sim.owner_of(0), None);
        assert!(matches!(sim.destroy_network("cofilin"), Err(NetworkError::UnknownNetwork(_))));

        let cfg = sim.config().networks[0].clone();
        let name = sim.create_network(&cfg).unwrap();
        sim.add_active_bond(&name, 0).unwrap();
        assert_eq!(sim.network("cofilin").unwrap().free_bond_count(), 1);
    }

    #[test]
    fn stepping_is_reproducible_and_keeps_beads_in_box() {
        let mut a = build();
        let mut b = build();
        for _ in 0..5 {
            a.step().unwrap();
            b.step().unwrap();
        }
        assert_eq!(a.current_step(), 5);
        assert_eq!(a.beads().positions, b.beads().positions);
        assert!(a.beads().positions.iter().all(|&p| inside(a.params(), p)));
        for (na, nb) in a.networks().iter().zip(b.networks()) {
            assert_eq!(na.summary().polymers, nb.summary().polymers);
            assert!(na.verify().is_ok());
        }
    }

    #[test]
    fn snapshots_summarise_every_network() {
        let mut sim = build();
        sim.record_snapshot().unwrap();
        sim.step().unwrap();
        sim.record_snapshot().unwrap();

        let snapshots = sim.get_recorded_snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].step, 1);
        assert_eq!(snapshots[0].total_bead_count, 40);
        let names: Vec<_> = snapshots[0].networks.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["cofilin", "arp23"]);
        let cofilin = &snapshots[1].networks[0];
        assert_eq!(cofilin.free_bond_count + cofilin.bound_bond_count, 20);
    }
}
