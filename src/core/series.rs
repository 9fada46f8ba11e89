use num_complex::Complex64;

use super::field::DriveCurrents;
use super::trace::{ComplexTrace, SParameter};

/// Append-only history of one S-parameter across the steps of a sweep.
///
/// Columns mirror the persisted table and always have equal length; every step appends one row
/// per frequency point.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesAccumulator {
    param: SParameter,
    steps: usize,
    pub frequency: Vec<f64>,
    pub field: Vec<f64>,
    pub current: Vec<f64>,
    pub current1: Vec<f64>,
    pub current2: Vec<f64>,
    pub amplitude: Vec<f64>,
    pub phase: Vec<f64>,
    pub complex: Vec<Complex64>,
}

impl SeriesAccumulator {
    pub fn new(param: SParameter) -> Self {
        Self {
            param,
            steps: 0,
            frequency: Vec::new(),
            field: Vec::new(),
            current: Vec::new(),
            current1: Vec::new(),
            current2: Vec::new(),
            amplitude: Vec::new(),
            phase: Vec::new(),
            complex: Vec::new(),
        }
    }

    /// One accumulator per parameter, in acquisition order
    pub fn for_all() -> [SeriesAccumulator; 4] {
        SParameter::ALL.map(Self::new)
    }

    pub fn param(&self) -> SParameter {
        self.param
    }

    /// Completed steps recorded so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn rows(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    /// Record one step: the trace plus the field and currents it was taken at
    pub fn append(&mut self, field_mt: f64, currents: &DriveCurrents, trace: &ComplexTrace) {
        let points = trace.len();
        let dipole = currents.dipole_column();
        let (current1, current2) = currents.quadrupole_columns();

        self.frequency.extend_from_slice(&trace.frequencies);
        self.field.extend(std::iter::repeat(field_mt).take(points));
        self.current.extend(std::iter::repeat(dipole).take(points));
        self.current1.extend(std::iter::repeat(current1).take(points));
        self.current2.extend(std::iter::repeat(current2).take(points));
        self.amplitude.extend_from_slice(&trace.amplitude);
        self.phase.extend_from_slice(&trace.phase_rad);
        self.complex.extend_from_slice(&trace.complex);
        self.steps += 1;
    }
}
