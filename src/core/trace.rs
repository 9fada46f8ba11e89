use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scattering parameter recorded by every acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SParameter {
    S11,
    S21,
    S12,
    S22,
}

impl SParameter {
    /// Order of the quarters in the analyzer's `SDAT` buffer
    pub const ALL: [SParameter; 4] = [Self::S11, Self::S21, Self::S12, Self::S22];

    pub fn name(&self) -> &'static str {
        match self {
            Self::S11 => "S11",
            Self::S21 => "S21",
            Self::S12 => "S12",
            Self::S22 => "S22",
        }
    }

    /// Position of this parameter in [`SParameter::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Self::S11 => 0,
            Self::S21 => 1,
            Self::S12 => 2,
            Self::S22 => 3,
        }
    }
}

impl fmt::Display for SParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Undecoded result of one analyzer acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrace {
    /// Flat `SDAT` buffer: four quarters of interleaved re/im pairs
    pub values: Vec<f64>,
    /// Stimulus axis shared by all four parameters
    pub frequencies: Vec<f64>,
}

impl RawTrace {
    pub fn new(values: Vec<f64>, frequencies: Vec<f64>) -> Self {
        Self { values, frequencies }
    }
}

/// One decoded S-parameter trace
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexTrace {
    pub frequencies: Vec<f64>,
    pub amplitude: Vec<f64>,
    pub phase_rad: Vec<f64>,
    pub complex: Vec<Complex64>,
}

impl ComplexTrace {
    /// Build a trace, deriving amplitude and phase from the complex samples
    pub fn from_complex(frequencies: Vec<f64>, complex: Vec<Complex64>) -> Self {
        let amplitude = complex.iter().map(|c| c.norm()).collect();
        let phase_rad = complex.iter().map(|c| c.arg()).collect();

        Self {
            frequencies,
            amplitude,
            phase_rad,
            complex,
        }
    }

    pub fn len(&self) -> usize {
        self.complex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.complex.is_empty()
    }
}

/// The four traces of one acquisition, in acquisition order
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSet {
    traces: [ComplexTrace; 4],
}

impl TraceSet {
    pub fn new(traces: [ComplexTrace; 4]) -> Self {
        Self { traces }
    }

    pub fn trace(&self, param: SParameter) -> &ComplexTrace {
        &self.traces[param.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SParameter, &ComplexTrace)> {
        SParameter::ALL.iter().copied().zip(self.traces.iter())
    }

    /// Samples per trace
    pub fn points(&self) -> usize {
        self.traces[0].len()
    }
}
