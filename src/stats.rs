use crate::particle::Particle;
use crate::simulation::{Simulation, StepStats};
use ideal_gas_common::{Histogram, Snapshot, SpeedHistogram};
use rayon::prelude::*;

/// Total kinetic energy of the particle set.
pub fn total_kinetic_energy(particles: &[Particle]) -> f64 {
    particles.par_iter().map(Particle::kinetic_energy).sum()
}

/// Total linear momentum of the particle set.
pub fn total_momentum(particles: &[Particle]) -> (f64, f64) {
    particles
        .par_iter()
        .map(|p| {
            let m = p.momentum();
            (m.x as f64, m.y as f64)
        })
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1))
}

/// Groups particle speeds by color tag, species ordered by first appearance.
pub fn speeds_by_color(particles: &[Particle]) -> Vec<(String, Vec<f64>)> {
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for particle in particles {
        let speed = particle.speed() as f64;
        match groups.iter_mut().find(|(color, _)| color.as_str() == particle.color()) {
            Some((_, speeds)) => speeds.push(speed),
            None => groups.push((particle.color().to_string(), vec![speed])),
        }
    }
    groups
}

/// Builds a snapshot of the current simulation state.
///
/// `stats` are the collision counts of the step that led to this state.
pub fn capture_snapshot(
    sim: &Simulation,
    step: u32,
    time: f64,
    stats: StepStats,
    histogram: &Histogram,
    include_particles: bool,
) -> Snapshot {
    let particles = sim.particles();

    let speed_histograms = speeds_by_color(particles)
        .into_par_iter()
        .map(|(color, speeds)| SpeedHistogram {
            bin_range: histogram.bin_range(&speeds),
            frequencies: histogram.frequencies(&speeds),
            color,
        })
        .collect();

    Snapshot {
        step,
        time,
        total_particle_count: particles.len() as u32,
        total_kinetic_energy: total_kinetic_energy(particles),
        total_momentum: total_momentum(particles),
        particle_collisions: stats.particle_collisions,
        wall_collisions: stats.wall_collisions,
        speed_histograms,
        particles: include_particles.then(|| particles.iter().map(Particle::to_state).collect()),
    }
}
