use airborne_common::{SimulationConfig, Snapshot};
use airborne_sim::{RiskUpdate, Session};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, trace, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Instant;

/// Headless airborne-transmission run: steps the particle simulation and
/// records risk snapshots.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Snapshot format, overrides [output].format: json, bincode or messagepack
    #[arg(long)]
    output_format: Option<String>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting airborne simulation engine...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)?;
    if let Some(format) = args.output_format {
        config.output.format = Some(format);
    }
    debug!("Configuration: {:#?}", config);

    // --- Initialize Session ---
    let (tx, rx) = mpsc::channel::<RiskUpdate>();
    let mut session = Session::new(config, Some(tx))?;
    let frame_ms = session.config().simulation.frame_ms;
    let total_hours = session.config().simulation.total_hours.max(0.0);
    info!(
        "Running {:.2} simulated hours at {} ms per frame ({}x speed).",
        total_hours,
        frame_ms,
        session.simulation().params().speed_multiplier
    );

    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let mut peak_fixed = 0.0f64;
    let mut peak_running = 0.0f64;

    // --- Initial Snapshot (t = 0) ---
    session
        .record_snapshot()
        .context("Failed to record initial snapshot")?;

    // --- Simulation Loop ---
    let mut frame: u64 = 0;
    while session.simulated_hours() < total_hours {
        let report = session
            .tick(frame_ms)
            .with_context(|| format!("Simulation frame {} failed", frame + 1))?;
        frame += 1;

        for update in rx.try_iter() {
            peak_fixed = peak_fixed.max(update.fixed_hour.probability);
            peak_running = peak_running.max(update.running.probability);
        }

        let now = Instant::now();
        if now.duration_since(previous_print_time).as_secs_f64() >= 5.0 {
            info!(
                "Frame {} ({:.3} h) | Particles: {} | Elapsed: {:.2} s",
                frame,
                session.simulated_hours(),
                session.simulation().active_count(),
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = now;
        } else {
            trace!("Frame {}: {:?}", frame, report);
        }
    }

    // Always close the run with a snapshot at the final time.
    let last_recorded = session.recorded_snapshots().last().map(|s| s.time_hours);
    if last_recorded != Some(session.simulated_hours()) {
        session.record_snapshot()?;
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished: {} frames in {:.3} seconds.",
        frame,
        total_duration.as_secs_f64()
    );
    info!(
        "Peak risk: {:.4} for a one-hour stay, {:.4} for the accumulated exposure.",
        peak_fixed, peak_running
    );

    // --- Save Recorded Data ---
    let output = session.config().output.clone();
    if output.save_positions {
        save_final_positions(&output.base_filename, session.simulation().positions())?;
    } else {
        info!("Skipping saving final positions as per config.");
    }

    let snapshots = session.finish();
    if output.save_stats {
        let format = output.format.as_deref().unwrap_or("json");
        save_snapshots(&output.base_filename, format, &snapshots)?;
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn save_snapshots(base_filename: &str, format: &str, snapshots: &[Snapshot]) -> Result<()> {
    match format {
        "json" => {
            let filename = format!("{}_snapshots.json", base_filename);
            let json_string = serde_json::to_string(snapshots).context("Error serializing snapshots to JSON")?;
            let mut file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            file.write_all(json_string.as_bytes())
                .with_context(|| format!("Error writing snapshot JSON to file '{}'", filename))?;
            info!("{} snapshots saved to {} ({} KB)", snapshots.len(), filename, json_string.len() / 1024);
        }
        "bincode" => {
            let filename = format!("{}_snapshots.bin", base_filename);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            bincode::serialize_into(BufWriter::new(file), snapshots)
                .context("Error serializing snapshots to bincode")?;
            info!("{} snapshots saved to {} (binary format)", snapshots.len(), filename);
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", base_filename);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            rmp_serde::encode::write(&mut BufWriter::new(file), snapshots)
                .context("Error serializing snapshots to MessagePack")?;
            info!("{} snapshots saved to {} (MessagePack format)", snapshots.len(), filename);
        }
        other => {
            error!("Unknown output format: {}. Using JSON instead.", other);
            save_snapshots(base_filename, "json", snapshots)?;
        }
    }
    Ok(())
}

fn save_final_positions(base_filename: &str, positions: &[[f32; 3]]) -> Result<()> {
    let filename = format!("{}_final_positions.csv", base_filename);
    let mut writer = csv::Writer::from_path(&filename)
        .with_context(|| format!("Error creating CSV file '{}'", filename))?;
    writer.write_record(["x", "y", "z"])?;
    for [x, y, z] in positions {
        writer.write_record(&[format!("{:.4}", x), format!("{:.4}", y), format!("{:.4}", z)])?;
    }
    writer.flush()?;
    if positions.is_empty() {
        warn!("No live particles at the end of the run; {} has only a header.", filename);
    }
    info!("Final positions saved to {}", filename);
    Ok(())
}
