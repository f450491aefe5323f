use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::histogram::Histogram;
use std::path::Path;

// Axis-aligned container with one corner at the origin
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ContainerConfig {
    pub width: f32,
    pub height: f32,
}

/// A change of time step applied once the run reaches `step`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TimeStepChange {
    pub step: u32,
    pub time_step: f32,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub time_step: f32,
    pub total_steps: u32,
    #[serde(default = "default_record_interval_steps")]
    pub record_interval_steps: u32,
    /// Speed-up / slow-down points, applied in step order.
    #[serde(default)]
    pub schedule: Vec<TimeStepChange>,
}

fn default_record_interval_steps() -> u32 {
    1
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct InitialConditions {
    /// Seed for random placement; `None` draws from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A group of randomly generated particles sharing a color tag.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SpeciesConfig {
    pub count: usize,
    pub min_speed: f32,
    pub max_speed: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_mass: f32,
    pub max_mass: f32,
    #[serde(default = "default_color")]
    pub color: String,
}

/// An explicitly placed particle.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ParticleConfig {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub radius: f32,
    pub mass: f32,
    #[serde(default = "default_color")]
    pub color: String,
}

pub fn default_color() -> String {
    "black".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct HistogramConfig {
    #[serde(default = "default_bin_count")]
    pub bin_count: usize,
    #[serde(default = "default_range_widening_factor")]
    pub range_widening_factor: f64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        HistogramConfig {
            bin_count: default_bin_count(),
            range_widening_factor: default_range_widening_factor(),
        }
    }
}

fn default_bin_count() -> usize {
    10
}

fn default_range_widening_factor() -> f64 {
    1.2
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_stats: bool,
    #[serde(default = "default_true")]
    pub save_final_particles: bool,
    #[serde(default)]
    pub save_particles_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

fn default_true() -> bool {
    true
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub container: ContainerConfig,
    pub timing: TimingConfig,
    #[serde(default)]
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub particles: Vec<ParticleConfig>,
    #[serde(default)]
    pub histogram: HistogramConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;

        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.container.width > 0.0 && self.container.height > 0.0) {
            anyhow::bail!("container width and height must be positive.");
        }
        if self.species.iter().all(|s| s.count == 0) && self.particles.is_empty() {
            anyhow::bail!("config must define at least one particle (species or particles).");
        }
        if self.timing.record_interval_steps == 0 {
            anyhow::bail!("record_interval_steps must be greater than 0.");
        }
        for (i, species) in self.species.iter().enumerate() {
            species
                .validate()
                .map_err(|e| anyhow::anyhow!("species[{}] ('{}'): {}", i, species.color, e))?;
        }
        for (i, particle) in self.particles.iter().enumerate() {
            if !(particle.radius > 0.0 && particle.mass > 0.0) {
                anyhow::bail!("particles[{}]: radius and mass must be positive.", i);
            }
        }
        self.histogram()?;
        Ok(())
    }

    /// Builds the histogram described by the `[histogram]` section.
    pub fn histogram(&self) -> Result<Histogram> {
        Histogram::new(self.histogram.bin_count, self.histogram.range_widening_factor)
    }

    /// Total number of particles the run starts with.
    pub fn initial_particle_count(&self) -> usize {
        self.species.iter().map(|s| s.count).sum::<usize>() + self.particles.len()
    }
}

impl SpeciesConfig {
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("speed", self.min_speed, self.max_speed),
            ("radius", self.min_radius, self.max_radius),
            ("mass", self.min_mass, self.max_mass),
        ];
        for (name, min, max) in ranges {
            if !(min.is_finite() && max.is_finite()) || min > max {
                anyhow::bail!("min_{name} ({min}) must not exceed max_{name} ({max}).");
            }
        }
        if self.min_radius <= 0.0 || self.min_mass <= 0.0 {
            anyhow::bail!("radius and mass ranges must be positive.");
        }
        Ok(())
    }
}
