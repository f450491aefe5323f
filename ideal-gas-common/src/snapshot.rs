use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// State of a single particle at snapshot time, flattened for compact serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub color: String,
}

/// Speed distribution of one species (all particles sharing a color tag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedHistogram {
    pub color: String,
    /// Width of one bin in speed units; bin `k` covers `[k * bin_range, (k + 1) * bin_range)`.
    pub bin_range: f64,
    pub frequencies: Vec<usize>,
}

/// A snapshot of the simulation state and metrics at a specific time.
#[derive(Debug, Clone, Serialize, Deserialize)] // Derive traits for easy saving/loading
pub struct Snapshot {
    /// Number of steps taken before this snapshot.
    pub step: u32,
    /// Simulated time elapsed (sum of the time steps actually used).
    pub time: f64,
    pub total_particle_count: u32,
    pub total_kinetic_energy: f64,
    pub total_momentum: (f64, f64),
    /// Particle-particle responses applied during the step that produced this snapshot.
    pub particle_collisions: u32,
    /// Wall reflections applied during the step that produced this snapshot.
    pub wall_collisions: u32,
    /// One histogram per species, in order of first appearance.
    pub speed_histograms: Vec<SpeedHistogram>,
    /// Full particle states, present only when the run is configured to record them.
    /// Never skipped on serialization: bincode is not self-describing.
    pub particles: Option<Vec<ParticleState>>,
}

/// Writes snapshots as a `u32` count header followed by each snapshot bincode-encoded.
pub fn write_bincode_stream<W: Write>(mut writer: W, snapshots: &[Snapshot]) -> Result<()> {
    let count = u32::try_from(snapshots.len()).context("Too many snapshots for a u32 header")?;
    bincode::serialize_into(&mut writer, &count).context("Failed to write snapshot count header")?;
    for (i, snapshot) in snapshots.iter().enumerate() {
        bincode::serialize_into(&mut writer, snapshot)
            .with_context(|| format!("Failed to write snapshot {}", i))?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads the `u32` count header written by [`write_bincode_stream`].
pub fn read_bincode_header<R: Read>(reader: &mut R) -> Result<u32> {
    bincode::deserialize_from(reader).context("Failed to read snapshot count from header")
}

/// Reads the next snapshot from a bincode stream positioned after the header.
pub fn read_bincode_snapshot<R: Read>(reader: &mut R) -> Result<Snapshot> {
    bincode::deserialize_from(reader).context("Failed to read snapshot")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample(step: u32, with_particles: bool) -> Snapshot {
        Snapshot {
            step,
            time: step as f64 * 0.5,
            total_particle_count: 1,
            total_kinetic_energy: 2.5,
            total_momentum: (1.0, -2.0),
            particle_collisions: 0,
            wall_collisions: 1,
            speed_histograms: vec![SpeedHistogram {
                color: "red".to_string(),
                bin_range: 1.2,
                frequencies: vec![0, 1],
            }],
            particles: with_particles.then(|| {
                vec![ParticleState { x: 1.0, y: 2.0, vx: 1.0, vy: -2.0, radius: 0.5, color: "red".to_string() }]
            }),
        }
    }

    #[test]
    fn test_bincode_stream_layout() {
        let snapshots = vec![sample(0, true), sample(10, false)];
        let mut buffer = Vec::new();
        write_bincode_stream(&mut buffer, &snapshots).unwrap();

        let mut reader = Cursor::new(buffer);
        assert_eq!(read_bincode_header(&mut reader).unwrap(), 2);
        // Header is a bare u32.
        assert_eq!(reader.position(), 4);

        let first = read_bincode_snapshot(&mut reader).unwrap();
        assert_eq!(first.step, 0);
        assert_eq!(first.particles.as_ref().map(|p| p.len()), Some(1));
        assert_eq!(first.speed_histograms[0].color, "red");

        let second = read_bincode_snapshot(&mut reader).unwrap();
        assert_eq!(second.step, 10);
        assert!(read_bincode_snapshot(&mut reader).is_err());
    }
}
