use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BlockError;
use crate::sweep::{IvSweep, ReflectionSweep};

/// Write a current sweep as a two-column CSV: header `I,V`, then one row per
/// sample with the current first.
pub fn export_iv(path: impl AsRef<Path>, sweep: &IvSweep) -> Result<(), BlockError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["I", "V"])?;
    for sample in &sweep.samples {
        writer.write_record([sample.current.to_string(), sample.voltage.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a reflection sweep as a CSV table: one column per bias point,
/// headed by its `<voltage>;<current>` key, plus a trailing `freq` column
/// with the shared frequency axis.
pub fn export_reflection(path: impl AsRef<Path>, sweep: &ReflectionSweep) -> Result<(), BlockError> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<String> = sweep.points.iter().map(|p| p.key()).collect();
    header.push("freq".to_string());
    writer.write_record(&header)?;

    let rows = sweep
        .points
        .iter()
        .map(|p| p.trace.len())
        .chain(std::iter::once(sweep.frequency.len()))
        .max()
        .unwrap_or(0);

    for row in 0..rows {
        let mut record: Vec<String> = sweep
            .points
            .iter()
            .map(|p| p.trace.get(row).map(f64::to_string).unwrap_or_default())
            .collect();
        record.push(
            sweep
                .frequency
                .get(row)
                .map(f64::to_string)
                .unwrap_or_default(),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Sidecar record describing one sweep, written next to the exported data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepMetadata {
    pub started_at: DateTime<Utc>,
    pub host: String,
    pub device: String,
    pub v_from: f64,
    pub v_to: f64,
    pub points: usize,
}

pub fn write_metadata(path: impl AsRef<Path>, metadata: &SweepMetadata) -> Result<(), BlockError> {
    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(path, json)?;
    Ok(())
}
