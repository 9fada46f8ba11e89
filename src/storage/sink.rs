use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::MeasurementMetadata;
use crate::core::{SParameter, SeriesAccumulator};
use crate::error::{Result, SweepError};

/// Where one parameter's series is stored
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesTarget {
    pub user: String,
    pub sample: String,
    pub measurement_name: String,
    pub param: SParameter,
}

impl SeriesTarget {
    pub fn new(user: &str, sample: &str, measurement_name: &str, param: SParameter) -> Self {
        Self {
            user: user.to_string(),
            sample: sample.to_string(),
            measurement_name: measurement_name.to_string(),
            param,
        }
    }

    /// `<measurement>_<Sxx>`, the folder and file stem of the series
    pub fn series_name(&self) -> String {
        format!("{}_{}", self.measurement_name, self.param)
    }
}

/// Incremental persistence of sweep results.
///
/// Every call replaces what was stored before for the same series: after step `k` the stored
/// history covers steps `0..=k` and nothing else.
pub trait DataSink: Send {
    fn save_series(&mut self, target: &SeriesTarget, series: &SeriesAccumulator) -> Result<()>;

    /// Store the settings snapshot keyed by `metadata.measurement_name`
    fn save_metadata(&mut self, metadata: &MeasurementMetadata) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryRecord {
    series: HashMap<String, SeriesAccumulator>,
    metadata: HashMap<String, MeasurementMetadata>,
    writes: usize,
}

/// Sink keeping everything in memory; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    record: Arc<Mutex<MemoryRecord>>,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every series write after the first `writes` succeeded
    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_after: Some(writes),
            ..Self::default()
        }
    }

    /// Latest history stored under `series_name`
    pub fn series(&self, series_name: &str) -> Option<SeriesAccumulator> {
        self.lock().series.get(series_name).cloned()
    }

    pub fn metadata(&self, series_name: &str) -> Option<MeasurementMetadata> {
        self.lock().metadata.get(series_name).cloned()
    }

    /// Successful series writes so far
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DataSink for MemorySink {
    fn save_series(&mut self, target: &SeriesTarget, series: &SeriesAccumulator) -> Result<()> {
        let mut record = self.lock();
        if self.fail_after.is_some_and(|limit| record.writes >= limit) {
            return Err(SweepError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory sink write limit reached",
            )));
        }

        record.series.insert(target.series_name(), series.clone());
        record.writes += 1;
        Ok(())
    }

    fn save_metadata(&mut self, metadata: &MeasurementMetadata) -> Result<()> {
        self.lock()
            .metadata
            .insert(metadata.measurement_name.clone(), metadata.clone());
        Ok(())
    }
}
