use anyhow::Result;
use std::path::PathBuf;
use std::time::Instant;
use log::{info, warn, error, debug, trace};

use ideal_gas::output::{self, OutputFormat};
use ideal_gas::stats;
use ideal_gas::{Simulation, StepStats, TimeStepSchedule};
use ideal_gas_common::{SimulationConfig, Snapshot};

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Ideal Gas Simulation...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SimulationConfig::load(&config_path)?;
    info!("Loaded configuration from {}", config_path);
    debug!("Configuration: {:#?}", config);

    // --- Initialize Simulation ---
    info!(
        "Populating {} particles ({} species, {} explicit).",
        config.initial_particle_count(),
        config.species.len(),
        config.particles.len()
    );
    let mut sim = Simulation::from_config(&config)?;
    info!(
        "Simulation initialized with {} particles in a {} x {} container (time step {}).",
        sim.particle_count(),
        sim.container_width(),
        sim.container_height(),
        sim.time_step()
    );

    let histogram = config.histogram()?;
    debug!(
        "Speed histograms: {} bins, range widening factor {}.",
        histogram.bin_count(),
        histogram.range_widening_factor()
    );
    let timing = &config.timing;
    let total_steps = timing.total_steps;
    let record_interval_steps = timing.record_interval_steps;
    let include_particles = config.output.save_particles_in_snapshot;

    let mut schedule = TimeStepSchedule::new(timing.schedule.clone());

    info!("Recording snapshot every {} steps.", record_interval_steps);
    info!("Starting simulation loop for {} steps...", total_steps);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let mut sim_time = 0.0f64;
    let mut recorded_snapshots: Vec<Snapshot> = Vec::new();

    // --- Initial Snapshot (step = 0) ---
    recorded_snapshots.push(stats::capture_snapshot(
        &sim,
        0,
        sim_time,
        StepStats::default(),
        &histogram,
        include_particles,
    ));
    let initial_energy = recorded_snapshots[0].total_kinetic_energy;
    info!("Initial kinetic energy: {:.4}", initial_energy);

    for step in 0..total_steps {
        schedule.apply_due(step, &mut sim);

        let step_start_time = Instant::now();
        let step_stats = sim.step_forward();
        sim_time += sim.time_step() as f64;
        let step_duration = step_start_time.elapsed();

        let completed = step + 1;
        let current_time = Instant::now();
        let print_interval_secs = 5.0;
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_step = completed % record_interval_steps == 0;
        let is_last_step = completed == total_steps;

        if is_record_step || is_last_step {
            let snapshot = stats::capture_snapshot(
                &sim,
                completed,
                sim_time,
                step_stats,
                &histogram,
                include_particles,
            );
            if !snapshot.total_kinetic_energy.is_finite() {
                warn!(
                    "Step {}: kinetic energy is not finite. Check configured velocities and masses.",
                    completed
                );
            }
            recorded_snapshots.push(snapshot);
        }

        if should_print_status || is_last_step {
            let energy = recorded_snapshots.last().map_or(initial_energy, |s| s.total_kinetic_energy);
            info!(
                "Step [{}/{}] (t = {:.2}) | Collisions: {} particle, {} wall | Energy: {:.4} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                completed,
                total_steps,
                sim_time,
                step_stats.particle_collisions,
                step_stats.wall_collisions,
                energy,
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;
        } else {
            trace!(
                "Step [{}/{}] completed in {:.2} ms",
                completed,
                total_steps,
                step_duration.as_secs_f64() * 1000.0
            );
        }
    }

    let total_duration = start_time.elapsed();
    info!("Simulation finished in {:.3} seconds.", total_duration.as_secs_f64());

    // --- Save Recorded Data ---
    let base_filename = &config.output.base_filename;
    if config.output.save_stats {
        let format = OutputFormat::from_name(config.output.format.as_deref());
        let path = output::snapshot_path(base_filename, format);
        if let Err(e) = output::save_snapshots(&path, format, &recorded_snapshots) {
            error!("Failed to save snapshots: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if config.output.save_final_particles {
        let path = PathBuf::from(format!("{}_final_particles.csv", base_filename));
        if let Err(e) = output::save_final_particles(&path, sim.particles()) {
            error!("Failed to save final particles: {:#}", e);
        }
    } else {
        info!("Skipping saving final particles as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}
