//! Core data types for Tally

pub mod meter_id;
pub mod tag;
pub mod time_unit;

pub use meter_id::{MeterId, MeterKind};
pub use tag::{Tag, Tags};
pub use time_unit::TimeUnit;
