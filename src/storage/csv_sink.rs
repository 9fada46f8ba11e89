use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::sink::{DataSink, SeriesTarget};
use super::{write_atomic, MeasurementMetadata};
use crate::core::{SParameter, SeriesAccumulator};
use crate::error::Result;

pub(crate) const METADATA_FILE: &str = "measurement_info.json";

/// One row of the persisted table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SeriesRecord {
    #[serde(rename = "Frequency")]
    pub frequency: f64,
    #[serde(rename = "Field")]
    pub field: f64,
    #[serde(rename = "Current (dipole mode)")]
    pub current: f64,
    #[serde(rename = "Current1 (quadrupole mode)")]
    pub current1: f64,
    #[serde(rename = "Current2 (quadrupole mode)")]
    pub current2: f64,
    #[serde(rename = "Amplitude")]
    pub amplitude: f64,
    #[serde(rename = "Phase")]
    pub phase: f64,
    #[serde(rename = "S_param")]
    pub s_param: String,
}

/// Writes each series as `<root>/<user>/<sample>/<series>/<series>.csv` with a
/// `measurement_info.json` sidecar in the same folder
pub struct CsvDataSink {
    root: PathBuf,
}

impl CsvDataSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn series_dir(&self, user: &str, sample: &str, series_name: &str) -> PathBuf {
        self.root.join(user).join(sample).join(series_name)
    }

    pub fn series_path(&self, target: &SeriesTarget) -> PathBuf {
        let name = target.series_name();
        self.series_dir(&target.user, &target.sample, &name)
            .join(format!("{}.csv", name))
    }

    /// Whether any parameter of the measurement already has a folder on disk
    pub fn measurement_exists(&self, user: &str, sample: &str, measurement_name: &str) -> bool {
        SParameter::ALL.iter().any(|&param| {
            let target = SeriesTarget::new(user, sample, measurement_name, param);
            self.series_dir(user, sample, &target.series_name()).exists()
        })
    }
}

impl DataSink for CsvDataSink {
    fn save_series(&mut self, target: &SeriesTarget, series: &SeriesAccumulator) -> Result<()> {
        let path = self.series_path(target);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in 0..series.rows() {
            writer.serialize(SeriesRecord {
                frequency: series.frequency[row],
                field: series.field[row],
                current: series.current[row],
                current1: series.current1[row],
                current2: series.current2[row],
                amplitude: series.amplitude[row],
                phase: series.phase[row],
                s_param: format_complex(series.complex[row]),
            })?;
        }

        if series.is_empty() {
            writer.write_record(HEADER)?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        write_atomic(&path, &bytes)?;
        Ok(())
    }

    fn save_metadata(&mut self, metadata: &MeasurementMetadata) -> Result<()> {
        let dir = self.series_dir(
            &metadata.user_name,
            &metadata.sample_name,
            &metadata.measurement_name,
        );
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(metadata)?;
        write_atomic(&dir.join(METADATA_FILE), json.as_bytes())?;
        Ok(())
    }
}

const HEADER: [&str; 8] = [
    "Frequency",
    "Field",
    "Current (dipole mode)",
    "Current1 (quadrupole mode)",
    "Current2 (quadrupole mode)",
    "Amplitude",
    "Phase",
    "S_param",
];

/// `(re+imj)`, the notation numpy-based tooling reads back as a complex number
pub(crate) fn format_complex(value: Complex64) -> String {
    format!("({}{:+}j)", value.re, value.im)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_complex() {
        assert_eq!(format_complex(Complex64::new(0.1, 0.05)), "(0.1+0.05j)");
        assert_eq!(format_complex(Complex64::new(-1.5, -2.0)), "(-1.5-2j)");
    }
}
