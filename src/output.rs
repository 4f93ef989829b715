use anyhow::{Context, Result};
use immune_common::Snapshot;
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// On-disk encoding for recorded snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Bincode,
    MessagePack,
}

impl OutputFormat {
    /// Resolves the configured name; unknown names fall back to JSON.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.unwrap_or("json") {
            "json" => OutputFormat::Json,
            "bincode" => OutputFormat::Bincode,
            "messagepack" => OutputFormat::MessagePack,
            other => {
                warn!("Unknown output format: {}. Using JSON instead.", other);
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

/// Writes all snapshots to `<base>_snapshots.<ext>` and returns the path written.
pub fn save_snapshots(snapshots: &[Snapshot], base_filename: &str, format: OutputFormat) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{}_snapshots.{}", base_filename, format.extension()));
    let file = File::create(&path).with_context(|| format!("creating snapshot file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Json => serde_json::to_writer(&mut writer, snapshots).context("serializing snapshots to JSON")?,
        OutputFormat::Bincode => {
            bincode::serialize_into(&mut writer, snapshots).context("serializing snapshots to bincode")?
        }
        OutputFormat::MessagePack => {
            rmp_serde::encode::write(&mut writer, snapshots).context("serializing snapshots to MessagePack")?
        }
    }
    writer.flush()?;

    info!("{} snapshots saved to {} ({:?} format)", snapshots.len(), path.display(), format);
    Ok(path)
}

/// Writes final bacteria positions as `x,z` rows to `<base>_final_positions.csv`.
pub fn save_final_positions(positions: &[(f32, f32)], base_filename: &str) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{}_final_positions.csv", base_filename));
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("creating CSV file '{}'", path.display()))?;
    writer.write_record(["x", "z"])?;
    for (x, z) in positions {
        writer.write_record(&[format!("{:.4}", x), format!("{:.4}", z)])?;
    }
    writer.flush()?;
    info!("Final positions saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use immune_common::GameOutcome;

    fn scratch_base(name: &str) -> String {
        let dir = std::env::temp_dir().join(format!("immune-simulation-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).expect("scratch dir");
        dir.join("run").to_string_lossy().into_owned()
    }

    fn snapshot(time: f32) -> Snapshot {
        Snapshot {
            time,
            bacteria_count: 3,
            outcome: GameOutcome::Running,
            positions: Some(vec![(1.0, 2.0)]),
            ..Snapshot::default()
        }
    }

    #[test]
    fn unknown_format_falls_back_to_json() {
        assert_eq!(OutputFormat::from_name(None), OutputFormat::Json);
        assert_eq!(OutputFormat::from_name(Some("messagepack")), OutputFormat::MessagePack);
        assert_eq!(OutputFormat::from_name(Some("yaml")), OutputFormat::Json);
    }

    #[test]
    fn json_snapshots_read_back() {
        let base = scratch_base("json");
        let path = save_snapshots(&[snapshot(0.0), snapshot(1.0)], &base, OutputFormat::Json).expect("written");
        let text = std::fs::read_to_string(path).expect("readable");
        let parsed: Vec<Snapshot> = serde_json::from_str(&text).expect("valid json");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].time, 1.0);
        assert_eq!(parsed[0].positions, Some(vec![(1.0, 2.0)]));
    }

    #[test]
    fn messagepack_snapshots_read_back() {
        let base = scratch_base("msgpack");
        let path = save_snapshots(&[snapshot(2.5)], &base, OutputFormat::MessagePack).expect("written");
        let bytes = std::fs::read(path).expect("readable");
        let parsed: Vec<Snapshot> = rmp_serde::from_slice(&bytes).expect("valid msgpack");
        assert_eq!(parsed[0].bacteria_count, 3);
    }

    #[test]
    fn final_positions_have_header_and_rows() {
        let base = scratch_base("csv");
        let path = save_final_positions(&[(1.0, -2.0), (0.5, 0.25)], &base).expect("written");
        let text = std::fs::read_to_string(path).expect("readable");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["x,z", "1.0000,-2.0000", "0.5000,0.2500"]);
    }
}
