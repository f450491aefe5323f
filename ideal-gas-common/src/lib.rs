pub mod config;
pub mod histogram;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, ContainerConfig, TimingConfig, TimeStepChange, InitialConditions, SpeciesConfig, ParticleConfig, HistogramConfig, OutputConfig};
pub use histogram::Histogram;
pub use snapshot::{Snapshot, SpeedHistogram, ParticleState};
pub use vecmath::Vec2;
