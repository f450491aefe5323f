use crate::particle::Particle;
use anyhow::{Context, Result};
use ideal_gas_common::snapshot::write_bincode_stream;
use ideal_gas_common::Snapshot;
use log::{error, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// On-disk encodings for recorded snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Bincode,
    MessagePack,
}

impl OutputFormat {
    /// Maps the config name to a format. Unknown names fall back to JSON.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.unwrap_or("json") {
            "json" => OutputFormat::Json,
            "bincode" => OutputFormat::Bincode,
            "messagepack" => OutputFormat::MessagePack,
            other => {
                error!("Unknown output format: {}. Using JSON instead.", other);
                OutputFormat::Json
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Bincode => "bin",
            OutputFormat::MessagePack => "msgpack",
        }
    }
}

/// Path of the snapshot file for a run.
pub fn snapshot_path(base_filename: &str, format: OutputFormat) -> PathBuf {
    PathBuf::from(format!("{}_snapshots.{}", base_filename, format.extension()))
}

/// Writes all snapshots to `path` in the given format.
pub fn save_snapshots(path: &Path, format: OutputFormat, snapshots: &[Snapshot]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Error creating snapshot file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Json => {
            serde_json::to_writer(&mut writer, snapshots).context("Error serializing snapshots to JSON")?;
        }
        OutputFormat::Bincode => {
            write_bincode_stream(&mut writer, snapshots).context("Error serializing snapshots to bincode")?;
        }
        OutputFormat::MessagePack => {
            rmp_serde::encode::write(&mut writer, snapshots)
                .context("Error serializing snapshots to MessagePack")?;
        }
    }
    writer.flush()?;

    info!("{} snapshots saved to {} ({:?} format)", snapshots.len(), path.display(), format);
    Ok(())
}

/// Writes the final state of every particle as CSV.
pub fn save_final_particles(path: &Path, particles: &[Particle]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Error creating CSV file '{}'", path.display()))?;
    writer.write_record(["x", "y", "vx", "vy", "radius", "mass", "color"])?;
    for p in particles {
        let (position, velocity) = (p.position(), p.velocity());
        writer.write_record([
            format!("{:.4}", position.x),
            format!("{:.4}", position.y),
            format!("{:.4}", velocity.x),
            format!("{:.4}", velocity.y),
            format!("{:.4}", p.radius()),
            format!("{:.4}", p.mass()),
            p.color().to_string(),
        ])?;
    }
    writer.flush()?;
    info!("Final particles saved to {}", path.display());
    Ok(())
}
