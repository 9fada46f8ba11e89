use std::fs;
use std::path::Path;

use super::csv_sink::{SeriesRecord, METADATA_FILE};
use super::MeasurementMetadata;
use crate::error::{Result, SweepError};

/// A persisted series as a field x frequency grid
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub metadata: MeasurementMetadata,
    pub frequencies: Vec<f64>,
    /// Field of each completed step, reference field first
    pub fields: Vec<f64>,
    /// `amplitude[step][point]`
    pub amplitude: Vec<Vec<f64>>,
    /// `phase[step][point]`, radians
    pub phase: Vec<Vec<f64>>,
}

impl Measurement {
    /// Steps found on disk; fewer than `metadata.field_sweep` for an interrupted sweep
    pub fn steps(&self) -> usize {
        self.fields.len()
    }

    pub fn is_complete(&self) -> bool {
        self.fields.len() == self.metadata.field_sweep.len()
    }
}

/// Read `measurement_info.json` from a series folder
pub fn load_metadata(series_dir: &Path) -> Result<MeasurementMetadata> {
    let json = fs::read_to_string(series_dir.join(METADATA_FILE))?;
    Ok(serde_json::from_str(&json)?)
}

/// Read a series folder back into a grid, one row per completed step
pub fn load_measurement(series_dir: &Path) -> Result<Measurement> {
    let metadata = load_metadata(series_dir)?;
    let path = series_dir.join(format!("{}.csv", metadata.measurement_name));

    let mut reader = csv::Reader::from_path(&path)?;
    let records = reader
        .deserialize::<SeriesRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let points = metadata.vna.number_of_points as usize;
    if points == 0 || records.len() % points != 0 {
        return Err(SweepError::MalformedTrace(format!(
            "{:?} holds {} rows, not a multiple of {} points",
            path,
            records.len(),
            points
        )));
    }

    let frequencies = records
        .iter()
        .take(points)
        .map(|r| r.frequency)
        .collect();

    let mut fields = Vec::new();
    let mut amplitude = Vec::new();
    let mut phase = Vec::new();
    for step in records.chunks_exact(points) {
        fields.push(step[0].field);
        amplitude.push(step.iter().map(|r| r.amplitude).collect());
        phase.push(step.iter().map(|r| r.phase).collect());
    }

    Ok(Measurement {
        metadata,
        frequencies,
        fields,
        amplitude,
        phase,
    })
}
