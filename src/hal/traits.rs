use async_trait::async_trait;

use super::types::{PowerSupplyState, VnaSettings};
use crate::core::RawTrace;
use crate::error::Result;

/// One controllable magnet supply, as seen by the sweep controller
#[async_trait]
pub trait CurrentSource: Send {
    /// Port or identifier used in log messages
    fn port(&self) -> &str;

    /// Set the output current. Output is switched on for nonzero currents and off for zero.
    async fn set_current(&mut self, amps: f64) -> Result<()>;

    /// Run the degaussing sequence, ending at zero current
    async fn demagnetize(&mut self) -> Result<()>;

    /// Last acknowledged state
    fn state(&self) -> &PowerSupplyState;

    /// Release the transport. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Network analyzer producing one raw four-parameter trace per acquisition
#[async_trait]
pub trait Analyzer: Send {
    /// Push acquisition settings; called once before the first acquisition
    async fn apply_configuration(&mut self, settings: &VnaSettings) -> Result<()>;

    /// Run `averages` blocking sweeps and fetch the raw buffer and stimulus axis
    async fn acquire(&mut self, averages: u32) -> Result<RawTrace>;

    /// Release the transport. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}
