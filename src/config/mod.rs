pub mod settings;
pub mod store;

pub use settings::{FieldSweepSpec, SweepConfig, SweepPlan, SweepTiming};
pub use store::SettingsStore;
