use anyhow::Result;
use log::{debug, error, info, trace};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

use swarm_common::{RunRecord, SwarmConfig};
use swarm_engine::SwarmSimulation;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Swarm Engine...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SwarmConfig::load(&config_path)?;
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Place obstacles and agents ---
    let mut sim = SwarmSimulation::new(config)?;
    info!("Arena populated with {} agents.", sim.current_agent_count());
    debug!("Placement summary: {:#?}", sim.placement_summary());

    let total_ticks = sim.config().timing.total_ticks;
    let dt = sim.config().timing.dt;
    info!("Starting simulation loop for {} ticks (dt = {}).", total_ticks, dt);

    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let print_interval_secs = 5.0;

    for tick in 0..total_ticks {
        let tick_start = Instant::now();
        sim.step();
        let tick_duration = tick_start.elapsed();

        let now = Instant::now();
        let is_last = tick + 1 == total_ticks;
        if now.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs || is_last {
            info!(
                "Tick [{}/{}] ({:.2} s simulated) | Agents: {} | Tick Time: {:6.2} ms | Elapsed: {:.2} s",
                tick + 1,
                total_ticks,
                (tick + 1) as f64 * dt,
                sim.current_agent_count(),
                tick_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = now;
        } else {
            trace!("Tick [{}/{}] completed in {:.2} ms", tick + 1, total_ticks, tick_duration.as_secs_f64() * 1000.0);
        }
    }

    info!("Simulation finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());

    // --- Save Recorded Data ---
    let output = sim.config().output.clone();
    if output.save_record {
        let record = sim.run_record(output.record_interval_ticks);
        let format = output.format.as_deref().unwrap_or("json");
        if let Err(e) = save_record(&record, &output.base_filename, format) {
            error!("Error saving run record: {:#}", e);
        }
    } else {
        info!("Skipping run record as per config (save_record is false).");
    }

    if output.save_positions {
        let filename = format!("{}_final_positions.csv", output.base_filename);
        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                writer.write_record(["id", "group", "x", "y"])?;
                for agent in sim.arena().agents() {
                    let p = agent.position();
                    writer.write_record(&[
                        agent.id.to_string(),
                        agent.group.to_string(),
                        format!("{:.6}", p.x),
                        format!("{:.6}", p.y),
                    ])?;
                }
                writer.flush()?;
                info!("Final positions saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn save_record(record: &RunRecord, base_filename: &str, format: &str) -> Result<()> {
    match format {
        "bincode" => {
            let filename = format!("{}_record.bin", base_filename);
            let writer = BufWriter::new(File::create(&filename)?);
            bincode::serialize_into(writer, record)?;
            info!("Run record saved to {} (binary format)", filename);
        }
        "messagepack" => {
            let filename = format!("{}_record.msgpack", base_filename);
            let mut writer = BufWriter::new(File::create(&filename)?);
            rmp_serde::encode::write(&mut writer, record)?;
            writer.flush()?;
            info!("Run record saved to {} (MessagePack format)", filename);
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let filename = format!("{}_record.json", base_filename);
            let mut writer = BufWriter::new(File::create(&filename)?);
            serde_json::to_writer(&mut writer, record)?;
            writer.flush()?;
            info!("Run record saved to {}", filename);
        }
    }
    Ok(())
}
