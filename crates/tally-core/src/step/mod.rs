//! Step aggregation primitives
//!
//! Meters report the activity of the last completed step, not a running
//! total. The values here do the windowing lazily on every record and poll,
//! so there is no background task per meter.

pub mod atomic;
pub mod max;
pub mod tuple;
pub mod value;
mod window;

pub use atomic::AtomicF64;
pub use max::TimeWindowMax;
pub use tuple::StepTuple;
pub use value::{StepDouble, StepLong, StepNumber, StepValue};
