use ideal_gas_common::{ParticleConfig, ParticleState, Vec2};

/// A gas particle with a fixed radius and mass, moving with constant velocity between collisions.
///
/// `radius` and `mass` are expected to be positive; nothing here checks it.
#[derive(Debug, Clone)]
pub struct Particle {
    position: Vec2,
    velocity: Vec2,
    radius: f32,
    mass: f32,
    /// Display tag mapped to a fill color by the visualizer. Irrelevant to physics.
    color: String,
}

impl Particle {
    pub fn new(position: Vec2, velocity: Vec2, radius: f32, mass: f32, color: impl Into<String>) -> Self {
        Self { position, velocity, radius, mass, color: color.into() }
    }

    /// Moves the particle along its velocity for `time_step` (`ds = v * dt`).
    /// Negative steps rewind.
    pub fn advance(&mut self, time_step: f32) {
        self.position += self.velocity * time_step;
    }

    /// Magnitude of the velocity.
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass as f64 * self.velocity.length_squared() as f64
    }

    pub fn momentum(&self) -> Vec2 {
        self.velocity * self.mass
    }

    pub fn to_state(&self) -> ParticleState {
        ParticleState {
            x: self.position.x,
            y: self.position.y,
            vx: self.velocity.x,
            vy: self.velocity.y,
            radius: self.radius,
            color: self.color.clone(),
        }
    }
}

/// Color is a display tag and takes no part in equality.
impl PartialEq for Particle {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.velocity == other.velocity
            && self.radius == other.radius
            && self.mass == other.mass
    }
}

impl From<&ParticleConfig> for Particle {
    fn from(config: &ParticleConfig) -> Self {
        Particle::new(
            config.position.into(),
            config.velocity.into(),
            config.radius,
            config.mass,
            config.color.clone(),
        )
    }
}
