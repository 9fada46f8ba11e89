pub mod session;
pub mod state;
pub mod sweep;

pub use session::{SupplySlot, SweepSession};
pub use state::SweepState;
pub use sweep::{SweepController, SweepOutcome};
