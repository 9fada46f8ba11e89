use serde::{Deserialize, Serialize};
use std::fmt;

use super::field::DriveCurrents;
use crate::error::{Result, SweepError};

/// Magnet configuration driven by the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DipoleMode {
    /// One electromagnet on the primary supply
    Dipole,
    /// Two orthogonal electromagnets, one per supply
    Quadrupole,
}

impl TryFrom<u8> for DipoleMode {
    type Error = SweepError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Dipole),
            2 => Ok(Self::Quadrupole),
            other => Err(SweepError::InvalidConfiguration(format!(
                "invalid dipole mode {}, expected 1 or 2",
                other
            ))),
        }
    }
}

impl From<DipoleMode> for u8 {
    fn from(mode: DipoleMode) -> u8 {
        match mode {
            DipoleMode::Dipole => 1,
            DipoleMode::Quadrupole => 2,
        }
    }
}

impl fmt::Display for DipoleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dipole => f.write_str("dipole"),
            Self::Quadrupole => f.write_str("quadrupole"),
        }
    }
}

/// Linear field/current calibration of one magnet channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelCalibration {
    /// Remanent field at zero current (mT)
    pub offset_mt: f64,
    /// Field per ampere (mT/A)
    pub conversion: f64,
}

impl ChannelCalibration {
    pub const fn new(offset_mt: f64, conversion: f64) -> Self {
        Self {
            offset_mt,
            conversion,
        }
    }

    pub fn current_for(&self, field_mt: f64) -> f64 {
        (field_mt - self.offset_mt) / self.conversion
    }
}

/// Field-to-current conversion for both magnet configurations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentMapper {
    pub dipole: ChannelCalibration,
    pub quadrupole: [ChannelCalibration; 2],
}

impl CurrentMapper {
    pub const DIPOLE: ChannelCalibration = ChannelCalibration::new(2.7001, 50.027);
    pub const QUADRUPOLE_1: ChannelCalibration = ChannelCalibration::new(1.7091, 43.884);
    pub const QUADRUPOLE_2: ChannelCalibration = ChannelCalibration::new(1.4364, 42.473);

    /// Map a target field to drive currents. `angle_deg` only matters in quadrupole mode.
    pub fn map(&self, field_mt: f64, angle_deg: f64, mode: DipoleMode) -> DriveCurrents {
        match mode {
            DipoleMode::Dipole => DriveCurrents::dipole(self.dipole.current_for(field_mt)),
            DipoleMode::Quadrupole => {
                let angle = angle_deg.to_radians();
                DriveCurrents::quadrupole(
                    self.quadrupole[0].current_for(field_mt * angle.cos()),
                    self.quadrupole[1].current_for(field_mt * angle.sin()),
                )
            }
        }
    }
}

impl Default for CurrentMapper {
    fn default() -> Self {
        Self {
            dipole: Self::DIPOLE,
            quadrupole: [Self::QUADRUPOLE_1, Self::QUADRUPOLE_2],
        }
    }
}

/// Map with the fixed lab calibration, validating the raw mode number
pub fn map_currents(field_mt: f64, angle_deg: f64, mode: u8) -> Result<DriveCurrents> {
    let mode = DipoleMode::try_from(mode)?;
    Ok(CurrentMapper::default().map(field_mt, angle_deg, mode))
}
