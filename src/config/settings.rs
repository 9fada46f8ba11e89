use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::{DipoleMode, FieldStep};
use crate::error::{Result, SweepError};
use crate::hal::VnaSettings;

/// Upper bound on generated sweep points, guards against a tiny range step
const MAX_SWEEP_POINTS: usize = 100_000;
/// Longest accepted dwell or timeout (s)
const MAX_TIMING_S: f64 = 3600.0;
/// Lowest accepted IF bandwidth (Hz)
const MIN_BANDWIDTH_HZ: f64 = 1.0;

/// Field sweep as entered: explicit values or `"start:step:stop"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSweepSpec {
    Values(Vec<f64>),
    Range(String),
}

impl FieldSweepSpec {
    /// Expand to field values in mT, rounded to 1e-10
    pub fn values(&self) -> Result<Vec<f64>> {
        let values = match self {
            Self::Values(values) => values.clone(),
            Self::Range(range) => expand_range(range)?,
        };

        if values.iter().any(|v| !v.is_finite()) {
            return Err(SweepError::InvalidConfiguration(
                "field sweep contains a non-finite value".to_string(),
            ));
        }

        Ok(values.into_iter().map(round_field).collect())
    }
}

fn round_field(value: f64) -> f64 {
    (value * 1e10).round() / 1e10
}

/// Inclusive `start:step:stop` expansion
fn expand_range(range: &str) -> Result<Vec<f64>> {
    let invalid = || {
        SweepError::InvalidConfiguration(format!(
            "field sweep range {:?} is not start:step:stop",
            range
        ))
    };

    let parts = range
        .split(':')
        .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>>>()?;

    let [start, step, stop] = parts[..] else {
        return Err(invalid());
    };

    if step == 0.0 || !step.is_finite() || (stop - start) * step < 0.0 {
        return Err(SweepError::InvalidConfiguration(format!(
            "field sweep range {:?} never reaches its stop value",
            range
        )));
    }

    // small tolerance so the stop value itself is included
    let intervals = ((stop - start) / step + 1e-5 / step.abs()).floor();
    if !(intervals < MAX_SWEEP_POINTS as f64) {
        return Err(SweepError::InvalidConfiguration(format!(
            "field sweep range {:?} expands to more than {} points",
            range, MAX_SWEEP_POINTS
        )));
    }
    let count = intervals as usize + 1;

    Ok((0..count).map(|i| start + step * i as f64).collect())
}

/// Dwell times and response timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepTiming {
    /// Wait after setting currents before acquiring
    pub settling_time_s: f64,
    /// Hold time of each demagnetization step
    pub demag_dwell_s: f64,
    /// Acknowledgment timeout of the supplies
    pub supply_timeout_s: f64,
}

impl SweepTiming {
    /// No waiting at all, for simulated hardware
    pub fn immediate() -> Self {
        Self {
            settling_time_s: 0.0,
            demag_dwell_s: 0.0,
            supply_timeout_s: 1.0,
        }
    }

    pub fn settling(&self) -> Duration {
        seconds(self.settling_time_s)
    }

    pub fn demag_dwell(&self) -> Duration {
        seconds(self.demag_dwell_s)
    }

    pub fn supply_timeout(&self) -> Duration {
        seconds(self.supply_timeout_s)
    }

    /// Every value must be finite, non-negative and at most an hour
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("settling_time_s", self.settling_time_s),
            ("demag_dwell_s", self.demag_dwell_s),
            ("supply_timeout_s", self.supply_timeout_s),
        ] {
            if !(0.0..=MAX_TIMING_S).contains(&value) {
                return invalid(format!(
                    "{} = {} s is outside 0..={} s",
                    label, value, MAX_TIMING_S
                ));
            }
        }
        Ok(())
    }
}

/// Negative and NaN become zero, anything too large saturates
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

impl Default for SweepTiming {
    fn default() -> Self {
        Self {
            settling_time_s: 2.0,
            demag_dwell_s: 0.5,
            supply_timeout_s: 2.0,
        }
    }
}

/// Everything a sweep needs, as loaded from a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub user_name: String,
    pub sample_name: String,
    pub measurement_name: String,
    #[serde(default)]
    pub description: String,
    /// 1 = dipole, 2 = quadrupole
    pub dipole_mode: u8,
    /// Label recorded in the metadata; all four parameters are always acquired
    pub s_parameter: String,
    /// Field direction in quadrupole mode (degrees)
    #[serde(default)]
    pub angle: f64,
    /// Reference field measured before the sweep (mT)
    pub ref_field: f64,
    pub avg_factor: u32,
    #[serde(default)]
    pub demagnetize: bool,
    #[serde(flatten)]
    pub vna: VnaSettings,
    #[serde(default)]
    pub timing: SweepTiming,
    /// Sweep values in mT, without the reference field
    pub field_sweep: FieldSweepSpec,
}

/// Validated form of a [`SweepConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    pub mode: DipoleMode,
    /// Reference field first
    pub steps: Vec<FieldStep>,
    pub angle_deg: f64,
    pub averages: u32,
}

impl SweepPlan {
    /// Field values in step order, reference field included
    pub fn fields(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.field_mt).collect()
    }
}

impl SweepConfig {
    /// Load from TOML (`.toml`) or JSON (anything else)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        Ok(config)
    }

    /// Check every field once and build the step sequence
    pub fn validate(&self) -> Result<SweepPlan> {
        let mode = DipoleMode::try_from(self.dipole_mode)?;

        for (label, value) in [
            ("user_name", &self.user_name),
            ("sample_name", &self.sample_name),
            ("measurement_name", &self.measurement_name),
        ] {
            validate_name(label, value)?;
        }

        if !is_s_parameter_label(&self.s_parameter) {
            return invalid(format!("{:?} is not an S-parameter label", self.s_parameter));
        }
        if self.avg_factor == 0 {
            return invalid("avg_factor must be at least 1".to_string());
        }
        if !self.angle.is_finite() || !self.ref_field.is_finite() {
            return invalid("angle and ref_field must be finite".to_string());
        }

        let vna = &self.vna;
        if vna.number_of_points == 0 {
            return invalid("number_of_points must be at least 1".to_string());
        }
        if !(vna.bandwidth >= MIN_BANDWIDTH_HZ && vna.bandwidth.is_finite()) {
            return invalid(format!(
                "bandwidth {} Hz must be at least {} Hz",
                vna.bandwidth, MIN_BANDWIDTH_HZ
            ));
        }
        if !(vna.start_frequency < vna.stop_frequency) || vna.start_frequency <= 0.0 {
            return invalid(format!(
                "frequency range {}..{} Hz is empty or negative",
                vna.start_frequency, vna.stop_frequency
            ));
        }
        if !vna.power.is_finite() {
            return invalid("power must be finite".to_string());
        }

        self.timing.validate()?;

        let sweep = self.field_sweep.values()?;
        if sweep.is_empty() {
            return invalid("field sweep is empty".to_string());
        }

        Ok(SweepPlan {
            mode,
            steps: FieldStep::sequence(round_field(self.ref_field), &sweep),
            angle_deg: self.angle,
            averages: self.avg_factor,
        })
    }
}

fn invalid<T>(message: String) -> Result<T> {
    Err(SweepError::InvalidConfiguration(message))
}

/// Names become directory components on disk
fn validate_name(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return invalid(format!("{} must not be empty", label));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return invalid(format!("{} {:?} is not a valid folder name", label, value));
    }
    Ok(())
}

/// `S` followed by two port numbers 1-4, e.g. `S21`
fn is_s_parameter_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    bytes.len() == 3
        && bytes[0] == b'S'
        && bytes[1..].iter().all(|b| (b'1'..=b'4').contains(b))
}
