//! Elastic 2D ideal-gas simulation: particles bouncing off each other and the walls of a
//! rectangular container.

pub mod output;
pub mod particle;
pub mod schedule;
pub mod simulation;
pub mod stats;

pub use particle::Particle;
pub use schedule::TimeStepSchedule;
pub use simulation::{update_particle_collision, Simulation, StepStats};
