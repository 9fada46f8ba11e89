//! Persistence of sweep results: the [`DataSink`] contract, its CSV/JSON implementation and the
//! loader that reads a persisted series back.

pub mod csv_sink;
pub mod metadata;
pub mod reader;
pub mod sink;

pub use csv_sink::CsvDataSink;
pub use metadata::MeasurementMetadata;
pub use reader::{load_measurement, load_metadata, Measurement};
pub use sink::{DataSink, MemorySink, SeriesTarget};

use std::fs;
use std::path::Path;

/// Write to a temporary sibling first, then rename over the target
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)
}
