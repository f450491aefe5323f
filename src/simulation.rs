use crate::particle::Particle;
use anyhow::Result;
use ideal_gas_common::{SimulationConfig, SpeciesConfig, Vec2};
use log::{debug, info, trace};
use rand::distr::Uniform;
use rand::prelude::*;

/// Collision responses applied during a single call to [`Simulation::step_forward`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub particle_collisions: u32,
    pub wall_collisions: u32,
}

/// Axis-aligned box spanning `[0, width] x [0, height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Container {
    width: f32,
    height: f32,
}

impl Container {
    /// Negates each velocity component that points into a wall the particle touches or has
    /// crossed. A particle against a wall but already moving away is left alone, so it is never
    /// reflected twice for one contact. Position is not clamped.
    ///
    /// Returns true if any component was negated.
    fn update_wall_collision(&self, particle: &mut Particle) -> bool {
        let position = particle.position();
        let radius = particle.radius();
        let mut velocity = particle.velocity();
        let mut reflected = false;

        if (position.x - radius <= 0.0 && velocity.x < 0.0)
            || (position.x + radius >= self.width && velocity.x > 0.0)
        {
            velocity.x = -velocity.x;
            reflected = true;
        }
        if (position.y - radius <= 0.0 && velocity.y < 0.0)
            || (position.y + radius >= self.height && velocity.y > 0.0)
        {
            velocity.y = -velocity.y;
            reflected = true;
        }

        if reflected {
            particle.set_velocity(velocity);
        }
        reflected
    }
}

/// Applies a 2D elastic collision to a pair of particles if they touch and are closing in.
///
/// Particles act as point masses for the response; radii only decide contact. Both new
/// velocities are computed from the pre-collision state. Coincident centers never count as
/// approaching, so the response never divides by a zero distance.
///
/// Returns true if velocities were changed.
pub fn update_particle_collision(first: &mut Particle, second: &mut Particle) -> bool {
    let (v1, v2) = (first.velocity(), second.velocity());
    let (x1, x2) = (first.position(), second.position());
    let (m1, m2) = (first.mass(), second.mass());

    let touching = x1.distance(x2) <= first.radius() + second.radius();
    let closing = (v1 - v2).dot(x1 - x2);
    let approaching = closing < 0.0;
    if !(touching && approaching) {
        return false;
    }

    let factor = closing / x1.distance_squared(x2);
    let total_mass = m1 + m2;
    let new_v1 = v1 - (2.0 * m2 / total_mass) * (factor * (x1 - x2));
    let new_v2 = v2 - (2.0 * m1 / total_mass) * (factor * (x2 - x1));

    first.set_velocity(new_v1);
    second.set_velocity(new_v2);
    true
}

/// An ideal gas of elastic particles in a fixed rectangular container.
///
/// Insertion order of particles is the pairwise scan order used by [`Simulation::step_forward`].
pub struct Simulation {
    particles: Vec<Particle>,
    container: Container,
    time_step: f32,
    /// RNG used for random population.
    rng: StdRng,
}

impl Simulation {
    /// Creates an empty simulation whose random population is seeded from the OS.
    pub fn new(container_width: f32, container_height: f32, time_step: f32) -> Self {
        Self::with_rng(container_width, container_height, time_step, StdRng::from_os_rng())
    }

    /// Creates an empty simulation with a reproducible random population.
    pub fn with_seed(container_width: f32, container_height: f32, time_step: f32, seed: u64) -> Self {
        Self::with_rng(container_width, container_height, time_step, StdRng::seed_from_u64(seed))
    }

    fn with_rng(container_width: f32, container_height: f32, time_step: f32, rng: StdRng) -> Self {
        Self {
            particles: Vec::new(),
            container: Container { width: container_width, height: container_height },
            time_step,
            rng,
        }
    }

    /// Builds and populates a simulation from a validated configuration.
    /// Random species are generated first, in config order, followed by explicit particles.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        let container = &config.container;
        let time_step = config.timing.time_step;
        let mut sim = match config.initial_conditions.seed {
            Some(seed) => Self::with_seed(container.width, container.height, time_step, seed),
            None => {
                info!("No seed configured; drawing initial placement from OS entropy.");
                Self::new(container.width, container.height, time_step)
            }
        };

        for species in &config.species {
            sim.add_random_particles(species)?;
        }
        sim.add_particles(config.particles.iter().map(Particle::from));

        Ok(sim)
    }

    pub fn add_particle(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    pub fn add_particles<I: IntoIterator<Item = Particle>>(&mut self, particles: I) {
        self.particles.extend(particles);
    }

    /// Appends `species.count` particles with uniformly random position, velocity, radius and
    /// mass, all tagged with `species.color`.
    ///
    /// Each velocity component is drawn from `[min_speed / sqrt(2), max_speed / sqrt(2)]`. This
    /// bounds the components, not the resulting speed.
    ///
    /// Fails without adding anything when a range is inverted or not finite, including a
    /// container with a non-finite size. Ranges are never swapped.
    pub fn add_random_particles(&mut self, species: &SpeciesConfig) -> Result<()> {
        let min_velocity = species.min_speed / std::f32::consts::SQRT_2;
        let max_velocity = species.max_speed / std::f32::consts::SQRT_2;

        let x_dist = Uniform::new_inclusive(0.0f32, self.container.width)?;
        let y_dist = Uniform::new_inclusive(0.0f32, self.container.height)?;
        let velocity_dist = Uniform::new_inclusive(min_velocity, max_velocity)?;
        let radius_dist = Uniform::new_inclusive(species.min_radius, species.max_radius)?;
        let mass_dist = Uniform::new_inclusive(species.min_mass, species.max_mass)?;

        self.particles.reserve(species.count);
        for _ in 0..species.count {
            let position = Vec2::new(self.rng.sample(x_dist), self.rng.sample(y_dist));
            let velocity = Vec2::new(self.rng.sample(velocity_dist), self.rng.sample(velocity_dist));
            let radius = self.rng.sample(radius_dist);
            let mass = self.rng.sample(mass_dist);
            self.particles.push(Particle::new(position, velocity, radius, mass, species.color.clone()));
        }

        debug!(
            "Added {} '{}' particles (speed {}..{}, radius {}..{}, mass {}..{}).",
            species.count,
            species.color,
            species.min_speed,
            species.max_speed,
            species.min_radius,
            species.max_radius,
            species.min_mass,
            species.max_mass
        );
        Ok(())
    }

    /// Advances the simulation by one time step.
    ///
    /// For each particle in order: resolve collisions against every later particle, then
    /// against the walls, then move it. Velocity changes made to an earlier particle while a
    /// later one is processed only take effect on the next step.
    pub fn step_forward(&mut self) -> StepStats {
        let mut stats = StepStats::default();

        for first in 0..self.particles.len() {
            let (head, tail) = self.particles.split_at_mut(first + 1);
            let particle = &mut head[first];

            for (offset, other) in tail.iter_mut().enumerate() {
                if update_particle_collision(particle, other) {
                    stats.particle_collisions += 1;
                    trace!("Particle collision: {} <-> {}", first, first + 1 + offset);
                }
            }
            if self.container.update_wall_collision(particle) {
                stats.wall_collisions += 1;
            }
            particle.advance(self.time_step);
        }

        stats
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn container_width(&self) -> f32 {
        self.container.width
    }

    pub fn container_height(&self) -> f32 {
        self.container.height
    }

    pub fn time_step(&self) -> f32 {
        self.time_step
    }

    /// Replaces the time step. Zero pauses and negative values run the gas backwards.
    pub fn set_time_step(&mut self, time_step: f32) {
        self.time_step = time_step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(position: (f32, f32), velocity: (f32, f32), radius: f32, mass: f32) -> Particle {
        Particle::new(Vec2::new(position.0, position.1), Vec2::new(velocity.0, velocity.1), radius, mass, "black")
    }

    fn step_once(width: f32, height: f32, inputs: Vec<Particle>) -> Vec<Particle> {
        let mut sim = Simulation::with_seed(width, height, 1.0, 0);
        sim.add_particles(inputs);
        sim.step_forward();
        sim.particles().to_vec()
    }

    /// Compares position and velocity only, within 0.02.
    fn assert_particles_approx(actual: &[Particle], expected: &[Particle]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            let close = |x: f32, y: f32| (x - y).abs() <= 0.02;
            assert!(
                close(a.position().x, e.position().x)
                    && close(a.position().y, e.position().y)
                    && close(a.velocity().x, e.velocity().x)
                    && close(a.velocity().y, e.velocity().y),
                "particle {}: got pos {:?} vel {:?}, expected pos {:?} vel {:?}",
                i,
                a.position(),
                a.velocity(),
                e.position(),
                e.velocity()
            );
        }
    }

    fn species(count: usize) -> SpeciesConfig {
        SpeciesConfig {
            count,
            min_speed: 5.0,
            max_speed: 30.0,
            min_radius: 2.0,
            max_radius: 4.0,
            min_mass: 10.0,
            max_mass: 50.0,
            color: "blue".to_string(),
        }
    }

    // --- Adding particles ---

    #[test]
    fn test_add_particles_to_empty_simulation() {
        let mut sim = Simulation::with_seed(10.0, 10.0, 1.0, 0);
        let added = vec![particle((3.0, 2.0), (2.0, 1.0), 0.5, 1.0)];
        sim.add_particles(added.clone());
        assert_eq!(sim.particles(), added.as_slice());
    }

    #[test]
    fn test_add_particles_appends_in_order() {
        let mut sim = Simulation::with_seed(10.0, 10.0, 1.0, 0);
        sim.add_particle(particle((1.0, 1.0), (3.0, 4.0), 0.8, 1.0));
        sim.add_particles(vec![
            particle((3.0, 2.0), (2.0, 1.0), 0.5, 1.0),
            particle((13.0, 32.0), (72.0, 1.0), 3.0, 2.0),
        ]);

        let expected = vec![
            particle((1.0, 1.0), (3.0, 4.0), 0.8, 1.0),
            particle((3.0, 2.0), (2.0, 1.0), 0.5, 1.0),
            particle((13.0, 32.0), (72.0, 1.0), 3.0, 2.0),
        ];
        assert_eq!(sim.particles(), expected.as_slice());
        assert_eq!(sim.particle_count(), 3);
    }

    // --- Free movement ---

    #[test]
    fn test_single_particle_moves_in_straight_line() {
        let actual = step_once(10.0, 10.0, vec![particle((3.0, 2.0), (2.0, 1.0), 0.5, 1.0)]);
        assert_eq!(actual, vec![particle((5.0, 3.0), (2.0, 1.0), 0.5, 1.0)]);
    }

    #[test]
    fn test_multiple_non_colliding_particles() {
        let actual = step_once(
            10.0,
            10.0,
            vec![
                particle((3.0, 2.0), (2.0, 1.0), 0.5, 1.0),
                particle((5.0, 2.0), (1.0, 1.0), 0.5, 1.0),
                particle((1.0, 1.0), (0.0, 5.0), 0.5, 1.0),
            ],
        );
        let expected = vec![
            particle((5.0, 3.0), (2.0, 1.0), 0.5, 1.0),
            particle((6.0, 3.0), (1.0, 1.0), 0.5, 1.0),
            particle((1.0, 6.0), (0.0, 5.0), 0.5, 1.0),
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_empty_simulation_step() {
        let mut sim = Simulation::with_seed(10.0, 10.0, 1.0, 0);
        sim.add_particles(Vec::new());
        let stats = sim.step_forward();
        assert!(sim.particles().is_empty());
        assert_eq!(stats, StepStats::default());
    }

    // --- Wall collisions ---

    #[test]
    fn test_bounce_off_bottom_wall() {
        let actual = step_once(10.0, 20.0, vec![particle((5.0, 1.0), (1.0, -1.0), 1.5, 1.0)]);
        assert_eq!(actual, vec![particle((6.0, 2.0), (1.0, 1.0), 1.5, 1.0)]);
    }

    #[test]
    fn test_bounce_off_left_wall() {
        let actual = step_once(10.0, 20.0, vec![particle((1.0, 5.0), (-1.0, -1.0), 1.5, 1.0)]);
        assert_eq!(actual, vec![particle((2.0, 4.0), (1.0, -1.0), 1.5, 1.0)]);
    }

    #[test]
    fn test_bounce_off_top_wall() {
        let actual = step_once(10.0, 20.0, vec![particle((5.0, 19.0), (-1.0, 1.0), 1.5, 1.0)]);
        assert_eq!(actual, vec![particle((4.0, 18.0), (-1.0, -1.0), 1.5, 1.0)]);
    }

    #[test]
    fn test_bounce_off_right_wall() {
        let actual = step_once(10.0, 20.0, vec![particle((9.0, 5.0), (1.0, 1.0), 1.5, 1.0)]);
        assert_eq!(actual, vec![particle((8.0, 6.0), (-1.0, 1.0), 1.5, 1.0)]);
    }

    #[test]
    fn test_no_bounce_away_from_walls() {
        let actual = step_once(10.0, 20.0, vec![particle((5.0, 5.0), (1.0, 1.0), 1.5, 1.0)]);
        assert_eq!(actual, vec![particle((6.0, 6.0), (1.0, 1.0), 1.5, 1.0)]);
    }

    #[test]
    fn test_no_bounce_when_moving_away_from_touched_wall() {
        let actual = step_once(10.0, 20.0, vec![particle((5.0, 1.0), (1.0, 1.0), 1.5, 1.0)]);
        assert_eq!(actual, vec![particle((6.0, 2.0), (1.0, 1.0), 1.5, 1.0)]);
    }

    #[test]
    fn test_corner_bounces_both_axes() {
        let actual = step_once(10.0, 20.0, vec![particle((2.0, 2.0), (-1.0, -1.0), 2.5, 1.0)]);
        assert_eq!(actual, vec![particle((3.0, 3.0), (1.0, 1.0), 2.5, 1.0)]);
    }

    #[test]
    fn test_bounce_when_radius_exactly_touches_wall() {
        let actual = step_once(10.0, 20.0, vec![particle((5.0, 1.0), (1.0, -1.0), 1.0, 1.0)]);
        assert_eq!(actual, vec![particle((6.0, 2.0), (1.0, 1.0), 1.0, 1.0)]);
    }

    #[test]
    fn test_bounce_when_outside_but_touching_wall() {
        let actual = step_once(10.0, 20.0, vec![particle((5.0, 21.0), (1.0, 1.0), 1.5, 1.0)]);
        assert_eq!(actual, vec![particle((6.0, 20.0), (1.0, -1.0), 1.5, 1.0)]);
    }

    #[test]
    fn test_bounce_when_completely_outside_container() {
        let actual = step_once(10.0, 20.0, vec![particle((-5.0, 5.0), (-2.0, 1.0), 1.5, 1.0)]);
        assert_eq!(actual, vec![particle((-3.0, 6.0), (2.0, 1.0), 1.5, 1.0)]);
    }

    #[test]
    fn test_wall_collisions_are_counted() {
        let mut sim = Simulation::with_seed(10.0, 20.0, 1.0, 0);
        sim.add_particles(vec![
            particle((5.0, 1.0), (1.0, -1.0), 1.5, 1.0),
            particle((5.0, 10.0), (1.0, 1.0), 1.5, 1.0),
            particle((2.0, 18.0), (-1.0, 1.0), 2.5, 1.0),
        ]);
        let stats = sim.step_forward();
        assert_eq!(stats.wall_collisions, 2);
        assert_eq!(stats.particle_collisions, 0);
    }

    // --- Equal-mass particle collisions ---

    #[test]
    fn test_equal_mass_touching_and_approaching() {
        let actual = step_once(
            50.0,
            50.0,
            vec![
                particle((20.0, 20.0), (0.1, 0.0), 1.0, 1.0),
                particle((21.4, 21.4), (-0.1, 0.0), 1.0, 1.0),
            ],
        );
        let expected = vec![
            particle((20.0, 19.9), (0.0, -0.1), 1.0, 1.0),
            particle((21.4, 21.5), (0.0, 0.1), 1.0, 1.0),
        ];
        assert_particles_approx(&actual, &expected);
    }

    #[test]
    fn test_equal_mass_tangential_contact() {
        let actual = step_once(
            50.0,
            50.0,
            vec![
                particle((5.0, 5.0), (2.0, 3.0), 2.82, 1.0),
                particle((7.0, 7.0), (-2.0, -5.0), 2.82, 1.0),
            ],
        );
        let expected = vec![
            particle((1.0, 2.0), (-4.0, -3.0), 2.82, 1.0),
            particle((11.0, 8.0), (4.0, 1.0), 2.82, 1.0),
        ];
        assert_particles_approx(&actual, &expected);
    }

    #[test]
    fn test_not_touching_are_not_bounced() {
        let actual = step_once(
            50.0,
            50.0,
            vec![
                particle((19.9, 20.0), (0.1, 0.0), 1.0, 1.0),
                particle((21.5, 21.4), (-0.1, 0.0), 1.0, 1.0),
            ],
        );
        let expected = vec![
            particle((20.0, 20.0), (0.1, 0.0), 1.0, 1.0),
            particle((21.4, 21.4), (-0.1, 0.0), 1.0, 1.0),
        ];
        assert_particles_approx(&actual, &expected);
    }

    #[test]
    fn test_touching_but_separating_are_not_bounced() {
        let mut sim = Simulation::with_seed(50.0, 50.0, 1.0, 0);
        sim.add_particles(vec![
            particle((6.5, 6.5), (-1.0, -1.0), 1.0, 1.0),
            particle((7.0, 7.0), (1.0, 1.0), 1.0, 1.0),
        ]);
        let stats = sim.step_forward();
        let expected = vec![
            particle((5.5, 5.5), (-1.0, -1.0), 1.0, 1.0),
            particle((8.0, 8.0), (1.0, 1.0), 1.0, 1.0),
        ];
        assert_particles_approx(sim.particles(), &expected);
        assert_eq!(stats.particle_collisions, 0);
    }

    #[test]
    fn test_only_colliding_pair_bounces_among_many() {
        let mut sim = Simulation::with_seed(50.0, 50.0, 1.0, 0);
        sim.add_particles(vec![
            particle((20.0, 20.0), (0.1, 0.0), 1.0, 1.0),
            particle((21.4, 21.4), (-0.1, 0.0), 1.0, 1.0),
            particle((30.0, 30.0), (1.0, 2.0), 1.0, 1.0),
            particle((21.0, 40.0), (0.0, 0.0), 1.0, 1.0),
            particle((30.0, 40.0), (5.0, 5.0), 1.0, 1.0),
        ]);
        let stats = sim.step_forward();
        let expected = vec![
            particle((20.0, 19.9), (0.0, -0.1), 1.0, 1.0),
            particle((21.4, 21.5), (0.0, 0.1), 1.0, 1.0),
            particle((31.0, 32.0), (1.0, 2.0), 1.0, 1.0),
            particle((21.0, 40.0), (0.0, 0.0), 1.0, 1.0),
            particle((35.0, 45.0), (5.0, 5.0), 1.0, 1.0),
        ];
        assert_particles_approx(sim.particles(), &expected);
        assert_eq!(stats.particle_collisions, 1);
    }

    #[test]
    fn test_three_equal_masses_resolve_in_scan_order() {
        let mut sim = Simulation::with_seed(50.0, 50.0, 1.0, 0);
        sim.add_particles(vec![
            particle((5.0, 5.0), (2.0, 3.0), 3.0, 1.0),
            particle((7.0, 7.0), (-2.0, -5.0), 3.0, 1.0),
            particle((9.0, 9.0), (-2.0, 0.0), 3.0, 1.0),
        ]);
        let stats = sim.step_forward();
        let expected = vec![
            particle((1.0, 2.0), (-4.0, -3.0), 3.0, 1.0),
            particle((7.5, 4.5), (0.5, -2.5), 3.0, 1.0),
            particle((10.5, 12.5), (1.5, 3.5), 3.0, 1.0),
        ];
        assert_particles_approx(sim.particles(), &expected);
        // 0-1 and 1-2 respond; 0-2 is separating once 0 has bounced off 1.
        assert_eq!(stats.particle_collisions, 2);
    }

    // --- Unequal-mass particle collisions ---

    #[test]
    fn test_unequal_masses_two_particles() {
        let actual = step_once(
            50.0,
            50.0,
            vec![
                particle((5.0, 5.0), (2.0, 3.0), 3.0, 15.0),
                particle((7.0, 7.0), (-2.0, -5.0), 3.0, 7.0),
            ],
        );
        let expected = vec![
            particle((35.0 / 11.0, 46.0 / 11.0), (-20.0 / 11.0, -9.0 / 11.0), 3.0, 15.0),
            particle((145.0 / 11.0, 112.0 / 11.0), (68.0 / 11.0, 35.0 / 11.0), 3.0, 7.0),
        ];
        assert_particles_approx(&actual, &expected);
    }

    #[test]
    fn test_unequal_masses_three_particles() {
        let actual = step_once(
            50.0,
            50.0,
            vec![
                particle((5.0, 5.0), (2.0, 3.0), 3.0, 15.0),
                particle((7.0, 7.0), (-2.0, -5.0), 3.0, 7.0),
                particle((9.0, 9.0), (-2.0, 0.0), 3.0, 10.0),
            ],
        );
        let expected = vec![
            particle((35.0 / 11.0, 46.0 / 11.0), (-20.0 / 11.0, -9.0 / 11.0), 3.0, 15.0),
            particle((1215.0 / 187.0, 654.0 / 187.0), (-94.0 / 187.0, -655.0 / 187.0), 3.0, 7.0),
            particle((2184.0 / 187.0, 2558.0 / 187.0), (501.0 / 187.0, 875.0 / 187.0), 3.0, 10.0),
        ];
        assert_particles_approx(&actual, &expected);
    }

    #[test]
    fn test_collision_conserves_momentum_and_energy() {
        let mut first = particle((5.0, 5.0), (2.0, 3.0), 3.0, 15.0);
        let mut second = particle((7.0, 7.0), (-2.0, -5.0), 3.0, 7.0);
        let momentum_before = first.momentum() + second.momentum();
        let energy_before = first.kinetic_energy() + second.kinetic_energy();

        assert!(update_particle_collision(&mut first, &mut second));

        let momentum_after = first.momentum() + second.momentum();
        let energy_after = first.kinetic_energy() + second.kinetic_energy();
        assert!((momentum_before - momentum_after).length() < 1e-3);
        assert!((energy_before - energy_after).abs() < 1e-3);
    }

    #[test]
    fn test_particle_collision_ignores_distant_pair() {
        let mut first = particle((0.0, 0.0), (1.0, 0.0), 1.0, 1.0);
        let mut second = particle((5.0, 0.0), (-1.0, 0.0), 1.0, 1.0);
        assert!(!update_particle_collision(&mut first, &mut second));
        assert_eq!(first.velocity(), Vec2::new(1.0, 0.0));
        assert_eq!(second.velocity(), Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_coincident_centers_are_left_alone() {
        let mut first = particle((3.0, 3.0), (1.0, 0.0), 1.0, 1.0);
        let mut second = particle((3.0, 3.0), (-1.0, 2.0), 1.0, 1.0);
        assert!(!update_particle_collision(&mut first, &mut second));
        assert!(first.velocity().is_finite() && second.velocity().is_finite());
    }

    // --- Time step ---

    #[test]
    fn test_time_step_can_be_changed() {
        let mut sim = Simulation::with_seed(100.0, 100.0, 1.0, 0);
        sim.add_particle(particle((50.0, 50.0), (2.0, -1.0), 1.0, 1.0));
        assert_eq!(sim.time_step(), 1.0);

        sim.set_time_step(2.5);
        assert_eq!(sim.time_step(), 2.5);
        sim.step_forward();
        assert_eq!(sim.particles()[0].position(), Vec2::new(55.0, 47.5));

        sim.set_time_step(-2.5);
        sim.step_forward();
        assert_eq!(sim.particles()[0].position(), Vec2::new(50.0, 50.0));

        sim.set_time_step(0.0);
        sim.step_forward();
        assert_eq!(sim.particles()[0].position(), Vec2::new(50.0, 50.0));
    }

    // --- Random population ---

    #[test]
    fn test_random_particles_within_bounds() {
        let (width, height) = (10.0, 10.0);
        let mut sim = Simulation::with_seed(width, height, 1.0, 7);
        let species = species(25);
        sim.add_random_particles(&species).unwrap();

        assert_eq!(sim.particle_count(), 25);
        let min_component = species.min_speed / std::f32::consts::SQRT_2;
        let max_component = species.max_speed / std::f32::consts::SQRT_2;
        for p in sim.particles() {
            let (pos, vel) = (p.position(), p.velocity());
            assert!((0.0..=width).contains(&pos.x) && (0.0..=height).contains(&pos.y));
            assert!((min_component..=max_component).contains(&vel.x));
            assert!((min_component..=max_component).contains(&vel.y));
            assert!((species.min_radius..=species.max_radius).contains(&p.radius()));
            assert!((species.min_mass..=species.max_mass).contains(&p.mass()));
            assert_eq!(p.color(), "blue");
        }
    }

    #[test]
    fn test_random_particles_are_reproducible_and_appended() {
        let mut first = Simulation::with_seed(10.0, 10.0, 1.0, 99);
        let mut second = Simulation::with_seed(10.0, 10.0, 1.0, 99);
        first.add_particle(particle((1.0, 1.0), (0.0, 0.0), 0.5, 1.0));
        second.add_particle(particle((1.0, 1.0), (0.0, 0.0), 0.5, 1.0));
        first.add_random_particles(&species(5)).unwrap();
        second.add_random_particles(&species(5)).unwrap();

        assert_eq!(first.particles(), second.particles());
        assert_eq!(first.particles()[0], particle((1.0, 1.0), (0.0, 0.0), 0.5, 1.0));
        assert_eq!(first.particle_count(), 6);
    }

    #[test]
    fn test_random_particles_reject_inverted_range() {
        let mut sim = Simulation::with_seed(10.0, 10.0, 1.0, 0);
        let mut inverted = species(3);
        inverted.min_mass = 60.0;
        assert!(sim.add_random_particles(&inverted).is_err());
        assert_eq!(sim.particle_count(), 0);

        let mut inverted_speed = species(3);
        inverted_speed.min_speed = 9.0;
        inverted_speed.max_speed = 1.0;
        assert!(sim.add_random_particles(&inverted_speed).is_err());

        let mut unbounded = species(3);
        unbounded.max_radius = f32::INFINITY;
        assert!(sim.add_random_particles(&unbounded).is_err());
        assert_eq!(sim.particle_count(), 0);

        sim.add_random_particles(&species(3)).unwrap();
        assert_eq!(sim.particle_count(), 3);
    }

    #[test]
    fn test_from_config_populates_species_then_particles() {
        let config = SimulationConfig::from_toml_str(
            r#"
            [container]
            width = 40.0
            height = 30.0

            [timing]
            time_step = 0.25
            total_steps = 1

            [initial_conditions]
            seed = 3

            [[species]]
            count = 4
            min_speed = 1.0
            max_speed = 2.0
            min_radius = 0.5
            max_radius = 1.0
            min_mass = 1.0
            max_mass = 2.0
            color = "red"

            [[particles]]
            position = [1.0, 2.0]
            velocity = [0.0, 1.0]
            radius = 0.5
            mass = 3.0
            color = "white"

            [output]
            base_filename = "test"
            "#,
        )
        .unwrap();

        let sim = Simulation::from_config(&config).unwrap();
        assert_eq!(sim.particle_count(), 5);
        assert_eq!(sim.container_width(), 40.0);
        assert_eq!(sim.container_height(), 30.0);
        assert_eq!(sim.time_step(), 0.25);
        assert!(sim.particles()[..4].iter().all(|p| p.color() == "red"));
        assert_eq!(sim.particles()[4].color(), "white");
        assert_eq!(sim.particles()[4], particle((1.0, 2.0), (0.0, 1.0), 0.5, 3.0));
    }
}
