use serde::{Deserialize, Serialize};

/// One target field of the sweep; index 0 is always the reference field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldStep {
    pub index: u32,
    pub field_mt: f64,
}

impl FieldStep {
    /// Number the reference field followed by the user sweep
    pub fn sequence(reference_mt: f64, sweep_mt: &[f64]) -> Vec<FieldStep> {
        std::iter::once(reference_mt)
            .chain(sweep_mt.iter().copied())
            .enumerate()
            .map(|(index, field_mt)| FieldStep {
                index: index as u32,
                field_mt,
            })
            .collect()
    }
}

/// Per-channel drive currents in amperes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCurrents {
    pub primary: f64,
    /// Present only in quadrupole mode
    pub secondary: Option<f64>,
}

impl DriveCurrents {
    pub fn dipole(current: f64) -> Self {
        Self {
            primary: current,
            secondary: None,
        }
    }

    pub fn quadrupole(current1: f64, current2: f64) -> Self {
        Self {
            primary: current1,
            secondary: Some(current2),
        }
    }

    pub fn is_quadrupole(&self) -> bool {
        self.secondary.is_some()
    }

    /// Value of the `Current (dipole mode)` column
    pub fn dipole_column(&self) -> f64 {
        if self.is_quadrupole() {
            0.0
        } else {
            self.primary
        }
    }

    /// Values of the `Current1`/`Current2 (quadrupole mode)` columns
    pub fn quadrupole_columns(&self) -> (f64, f64) {
        match self.secondary {
            Some(secondary) => (self.primary, secondary),
            None => (0.0, 0.0),
        }
    }
}
