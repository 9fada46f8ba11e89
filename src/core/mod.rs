pub mod decoder;
pub mod field;
pub mod mapper;
pub mod series;
pub mod trace;

pub use decoder::{decode_complex, decode_trace};
pub use field::{DriveCurrents, FieldStep};
pub use mapper::{map_currents, ChannelCalibration, CurrentMapper, DipoleMode};
pub use series::SeriesAccumulator;
pub use trace::{ComplexTrace, RawTrace, SParameter, TraceSet};
