pub mod metrics;
pub mod monitor;
pub mod reporter;

pub use metrics::SweepMetrics;
pub use monitor::SweepMonitor;
pub use reporter::Reporter;
