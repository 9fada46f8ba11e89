use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::{SweepConfig, SweepPlan};
use crate::core::SParameter;
use crate::hal::VnaSettings;

/// Settings snapshot stored next to each series as `measurement_info.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementMetadata {
    pub user_name: String,
    pub sample_name: String,
    /// Series name, i.e. the measurement name suffixed with the S-parameter
    pub measurement_name: String,
    #[serde(default)]
    pub description: String,
    pub dipole_mode: u8,
    pub s_parameter: String,
    pub angle: f64,
    pub ref_field: f64,
    pub avg_factor: u32,
    #[serde(flatten)]
    pub vna: VnaSettings,
    pub datetime: String,
    /// Reference field first; kept last so the file stays readable
    pub field_sweep: Vec<f64>,
}

impl MeasurementMetadata {
    /// Snapshot of a validated configuration, not yet keyed to a parameter
    pub fn new(config: &SweepConfig, plan: &SweepPlan, started: DateTime<Local>) -> Self {
        Self {
            user_name: config.user_name.clone(),
            sample_name: config.sample_name.clone(),
            measurement_name: config.measurement_name.clone(),
            description: config.description.clone(),
            dipole_mode: plan.mode.into(),
            s_parameter: config.s_parameter.clone(),
            angle: plan.angle_deg,
            ref_field: config.ref_field,
            avg_factor: plan.averages,
            vna: config.vna.clone(),
            datetime: started.format("%Y-%m-%d %H:%M:%S").to_string(),
            field_sweep: plan.fields(),
        }
    }

    /// Copy keyed to one parameter's series
    pub fn for_parameter(&self, param: SParameter) -> Self {
        Self {
            measurement_name: format!("{}_{}", self.measurement_name, param),
            s_parameter: param.name().to_string(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> MeasurementMetadata {
        MeasurementMetadata {
            user_name: "alice".to_string(),
            sample_name: "yig".to_string(),
            measurement_name: "fmr".to_string(),
            description: String::new(),
            dipole_mode: 1,
            s_parameter: "S21".to_string(),
            angle: 0.0,
            ref_field: 0.0,
            avg_factor: 1,
            vna: VnaSettings {
                start_frequency: 1.0e9,
                stop_frequency: 2.0e9,
                bandwidth: 100.0,
                power: -10.0,
                number_of_points: 3,
                cal_name: String::new(),
            },
            datetime: "2024-05-01 12:00:00".to_string(),
            field_sweep: vec![0.0, 5.0, 10.0],
        }
    }

    #[test]
    fn test_field_sweep_is_serialized_last() {
        let json = serde_json::to_string_pretty(&metadata()).unwrap();
        let last_key = json.rfind("\"field_sweep\"").unwrap();

        for key in ["\"datetime\"", "\"number_of_points\"", "\"user_name\""] {
            assert!(json.find(key).unwrap() < last_key, "{} after field_sweep", key);
        }
    }

    #[test]
    fn test_for_parameter_suffixes_name() {
        let keyed = metadata().for_parameter(SParameter::S12);
        assert_eq!(keyed.measurement_name, "fmr_S12");
        assert_eq!(keyed.s_parameter, "S12");
        assert_eq!(keyed.field_sweep, vec![0.0, 5.0, 10.0]);
    }
}
