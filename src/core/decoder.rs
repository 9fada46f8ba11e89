//! Splits the analyzer's `SDAT` buffer into the four S-parameter traces.
//!
//! The buffer holds four equal quarters in the order S11, S21, S12, S22. Each quarter is a run of
//! interleaved `re, im` pairs, one pair per stimulus point.

use num_complex::Complex64;

use super::trace::{ComplexTrace, RawTrace, TraceSet};
use crate::error::{Result, SweepError};

/// Decode the interleaved buffer into four complex sequences of `len / 8` samples each
pub fn decode_complex(values: &[f64]) -> Result<[Vec<Complex64>; 4]> {
    if values.len() % 8 != 0 {
        return Err(SweepError::MalformedTrace(format!(
            "buffer length {} is not divisible by 8",
            values.len()
        )));
    }

    let quarter = values.len() / 4;
    if quarter == 0 {
        return Ok(Default::default());
    }

    // quarter length is even, so a re/im pair never straddles two quarters
    let mut quarters = values.chunks_exact(quarter).map(|chunk| {
        chunk
            .chunks_exact(2)
            .map(|pair| Complex64::new(pair[0], pair[1]))
            .collect::<Vec<_>>()
    });
    let mut next = || quarters.next().unwrap_or_default();

    Ok([next(), next(), next(), next()])
}

/// Decode a raw acquisition and attach the shared frequency axis to each trace
pub fn decode_trace(raw: &RawTrace) -> Result<TraceSet> {
    let [s11, s21, s12, s22] = decode_complex(&raw.values)?;

    if raw.frequencies.len() != s11.len() {
        return Err(SweepError::MalformedTrace(format!(
            "frequency axis has {} points, trace has {}",
            raw.frequencies.len(),
            s11.len()
        )));
    }

    let build = |complex| ComplexTrace::from_complex(raw.frequencies.clone(), complex);

    Ok(TraceSet::new([build(s11), build(s21), build(s12), build(s22)]))
}
