use anyhow::Result;
use clap::Parser;
use immune_simulation::output::{self, OutputFormat};
use immune_simulation::{GameOutcome, Simulation, SimulationConfig};
use log::{debug, error, info, trace, warn};
use std::path::PathBuf;
use std::time::Instant;

/// Runs the immune response simulation headless and writes its recorded statistics.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `timing.total_time`.
    #[arg(long)]
    total_time: Option<f32>,

    /// Overrides `initial_conditions.seed`.
    #[arg(long)]
    seed: Option<u64>,

    /// Stop as soon as the game is won or lost.
    #[arg(long)]
    stop_on_outcome: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Starting immune response simulation...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)?;
    if let Some(total_time) = args.total_time {
        config.timing.total_time = total_time;
    }
    if let Some(seed) = args.seed {
        config.initial_conditions.seed = seed;
    }
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    let mut sim = Simulation::new(config)?;
    info!(
        "Initialized with {} bacteria, {} macrophages.",
        sim.bacteria_count(),
        sim.macrophage_count()
    );
    debug!("Simulation Parameters: {:#?}", sim.params());

    // --- Simulation Loop ---
    let params = sim.params().clone();
    let total_steps = (sim.config().timing.total_time / params.dt).ceil() as u32;
    let record_interval = sim.config().timing.record_interval.max(0.0);
    let mut record_interval_steps = (record_interval / params.dt).round() as u32;
    if record_interval_steps == 0 {
        warn!(
            "Record interval ({:.2}) is smaller than the timestep ({:.2}). Recording every step.",
            record_interval, params.dt
        );
        record_interval_steps = 1;
    }
    info!("Recording snapshot every {} steps.", record_interval_steps);

    info!("Starting simulation loop for {} steps...", total_steps);
    let start_time = Instant::now();
    sim.record_snapshot();

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        sim.step();
        let step_duration = step_start_time.elapsed();

        for event in sim.drain_events() {
            trace!("{:?}", event);
        }

        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step + 1 == total_steps;
        let finished = args.stop_on_outcome && sim.outcome() != GameOutcome::Running;

        if is_record_step || is_last_step || finished {
            info!(
                "Step [{}/{}] (t={:.2}) | Bacteria: {} | Eaten: {} | Retries: {} | Step Time: {:6.2} ms",
                step + 1,
                total_steps,
                sim.time(),
                sim.bacteria_count(),
                sim.total_eaten(),
                sim.retries(),
                step_duration.as_secs_f64() * 1000.0
            );
            sim.record_snapshot();
        }
        if finished {
            info!("Game over at t={:.2}: {:?}.", sim.time(), sim.outcome());
            break;
        }
    }

    info!(
        "Simulation finished in {:.3} seconds. Outcome: {:?}.",
        start_time.elapsed().as_secs_f64(),
        sim.outcome()
    );

    // --- Save Recorded Data ---
    let output_config = sim.config().output.clone();
    if output_config.save_stats {
        let format = OutputFormat::from_name(output_config.format.as_deref());
        if let Err(e) = output::save_snapshots(sim.get_recorded_snapshots(), &output_config.base_filename, format) {
            error!("Error saving snapshots: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output_config.save_positions {
        output::save_final_positions(&sim.get_results(), &output_config.base_filename)?;
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}
