pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod hal;
pub mod observability;
pub mod storage;

pub use engine::{SweepController, SweepOutcome, SweepSession};
pub use error::{Result, SweepError};
