//! # Tally Common
//!
//! Shared types, errors, clocks and configuration for the Tally metrics facade.
//!
//! ## Core Types
//!
//! - [`Tag`]/[`Tags`]: key/value dimensions, compared independent of insertion order
//! - [`MeterId`]: name + tag set + [`MeterKind`], the registry's identity key
//! - [`TimeUnit`]: base unit exporters want timer values in
//! - [`Clock`]: wall/monotonic time source, with [`MockClock`] for tests
//!
//! ## Configuration
//!
//! - [`config::PushRegistryConfig`]: step, enabled flag, batch size, publish-on-close

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

use std::time::Duration;

// Re-export commonly used types at crate root
pub use clock::{Clock, MockClock, SystemClock};
pub use config::PushRegistryConfig;
pub use error::{ExportError, Result, TallyError};
pub use types::{
    meter_id::{MeterId, MeterKind},
    tag::{Tag, Tags},
    time_unit::TimeUnit,
};

/// Tally version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default step size
pub const DEFAULT_STEP: Duration = Duration::from_secs(60);

/// Default maximum number of records per transport call
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
