//! # Tally Core
//!
//! Meter registry, meter handles and step-windowed aggregation.
//!
//! ## Recording
//!
//! ```
//! use tally_core::MeterRegistry;
//! use tally_common::Tags;
//!
//! let registry = MeterRegistry::new();
//! let requests = registry.counter("requests", Tags::of([("method", "GET")])).unwrap();
//! requests.increment();
//! ```
//!
//! Recording never blocks on publishing and never fails. Values show up in
//! [`Meter::snapshot`] once the step they were recorded in has completed.

pub mod filter;
pub mod global;
pub mod meter;
pub mod registry;
pub mod step;

pub use filter::MeterFilter;
pub use meter::{
    Counter, CustomMeter, DistributionSnapshot, DistributionSummary, FunctionCounter,
    FunctionTimer, FunctionTimerSample, Gauge, LongTaskSample, LongTaskTimer, Measurement, Meter,
    MeterSnapshot, SnapshotValues, Statistic, TimeGauge, Timer,
};
pub use registry::{MeterRegistry, MeterRegistryBuilder};
pub use step::{StepDouble, StepLong, StepTuple, TimeWindowMax};
