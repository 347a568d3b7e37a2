use active_network_common::SimulationConfig;
use active_network_engine::ShadowSimBox;
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, trace, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs active bond networks inside a shadow simulation box", long_about = None)]
struct Args {
    /// Path to the config.toml file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides timing.total_steps from the config
    #[arg(long)]
    steps: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Starting Active Network Engine...");

    // --- Load Configuration ---
    let config = SimulationConfig::load(&args.config)?;
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation Box ---
    let mut sim = ShadowSimBox::new(config)?;
    debug!("Box Parameters: {:#?}", sim.params());
    for network in sim.networks() {
        info!(
            "Network '{}' ready with {} free bonds.",
            network.name(),
            network.free_bond_count()
        );
    }

    let total_steps = args.steps.unwrap_or(sim.config().timing.total_steps);
    let mut record_interval_steps = sim.config().timing.record_interval_steps;
    if record_interval_steps == 0 {
        warn!("Record interval is 0 steps. Recording every step.");
        record_interval_steps = 1;
    }
    let dt = sim.config().timing.dt;
    info!("Recording snapshot every {} steps ({:.3} time units).", record_interval_steps, record_interval_steps as f64 * dt);

    // --- Initial Snapshot (step 0) ---
    sim.record_snapshot().context("Failed to record initial snapshot")?;

    info!("Starting simulation loop for {} steps...", total_steps);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        if let Err(e) = sim.step() {
            error!("Error during simulation step {}: {}", step + 1, e);
            anyhow::bail!("Simulation step failed.");
        }
        let step_duration = step_start_time.elapsed();

        let current_time = Instant::now();
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= 5.0;
        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step + 1 == total_steps;

        if should_print_status || is_record_step || is_last_step {
            let polymers: usize = sim.networks().iter().map(|n| n.free_polymer_count()).sum();
            let free: usize = sim.networks().iter().map(|n| n.free_bond_count()).sum();
            info!(
                "Step [{}/{}] (t = {:.3}) | Polymers: {} | Free bonds: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                step + 1,
                total_steps,
                (step + 1) as f64 * dt,
                polymers,
                free,
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            if is_record_step || is_last_step {
                sim.record_snapshot()
                    .with_context(|| format!("Failed to record snapshot at step {}", step + 1))?;
            }
        } else {
            trace!(
                "Step [{}/{}] completed in {:.2} ms",
                step + 1,
                total_steps,
                step_duration.as_secs_f64() * 1000.0
            );
        }
    }

    let total_duration = start_time.elapsed();
    info!("Simulation finished in {:.3} seconds.", total_duration.as_secs_f64());

    // --- Save Recorded Data ---
    let output = sim.config().output.clone();
    if output.save_stats {
        let output_format = output.format.as_deref().unwrap_or("json");
        if let Err(e) = save_snapshots(&sim, &output.base_filename, output_format) {
            error!("Error saving snapshots: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output.save_polymers {
        let filename = format!("{}_polymers.csv", output.base_filename);
        save_polymer_table(&sim, &filename)?;
        info!("Final polymer table saved to {}", filename);
    } else {
        info!("Skipping saving polymer table as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn save_snapshots(sim: &ShadowSimBox, base_filename: &str, output_format: &str) -> Result<()> {
    let snapshots = sim.get_recorded_snapshots();
    let output_format = match output_format {
        "json" | "bincode" | "messagepack" => output_format,
        other => {
            error!("Unknown output format: {}. Using JSON instead.", other);
            "json"
        }
    };

    match output_format {
        "bincode" => {
            let filename = format!("{}_snapshots.bin", base_filename);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            bincode::serialize_into(BufWriter::new(file), snapshots)
                .context("Error serializing snapshots to bincode")?;
            info!("All snapshots saved to {} (binary format)", filename);
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", base_filename);
            let mut file = BufWriter::new(
                File::create(&filename).with_context(|| format!("Error creating snapshot file '{}'", filename))?,
            );
            rmp_serde::encode::write(&mut file, snapshots)
                .context("Error serializing snapshots to MessagePack")?;
            info!("All snapshots saved to {} (MessagePack format)", filename);
        }
        _ => {
            let filename = format!("{}_snapshots.json", base_filename);
            let json_string = serde_json::to_string(snapshots).context("Error serializing snapshots to JSON")?;
            let mut file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            file.write_all(json_string.as_bytes())
                .with_context(|| format!("Error writing snapshot JSON to file '{}'", filename))?;
            info!("All snapshots saved to {} ({} KB)", filename, json_string.len() / 1024);
        }
    }
    Ok(())
}

/// One row per live polymer: network, polymer id, size, head and tail bond ids.
fn save_polymer_table(sim: &ShadowSimBox, filename: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename)
        .with_context(|| format!("Error creating CSV file '{}'", filename))?;
    writer.write_record(["network", "polymer_id", "size", "head_bond", "tail_bond"])?;
    for network in sim.networks() {
        for polymer in network.free_polymers() {
            writer.write_record(&[
                network.name().to_string(),
                polymer.id().to_string(),
                polymer.size().to_string(),
                polymer.head_bond().to_string(),
                polymer.tail_bond().to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}
