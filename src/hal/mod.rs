pub mod mock;
pub mod power_supply;
pub mod traits;
pub mod transport;
pub mod types;
pub mod vna;

pub use power_supply::PowerSupplyChannel;
pub use traits::{Analyzer, CurrentSource};
pub use transport::LineChannel;
pub use types::{ChannelState, PowerSupplyState, VnaSettings, MAX_CURRENT_A};
pub use vna::VnaSession;
