//! # Tally Push
//!
//! Periodic export of a [`tally_core::MeterRegistry`] to monitoring backends.
//!
//! ## Pieces
//!
//! - [`PushRegistry`]: runs a [`Publisher`] once per step on the tokio runtime
//! - [`validity`]: what to do with NaN, infinite and out-of-range values
//! - [`naming`]: backend name, tag key and tag value rules
//! - [`backends`]: InfluxDB line protocol, CloudWatch metric data, logging
//! - [`sink`]: where serialized batches go
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_common::{PushRegistryConfig, Tags};
//! use tally_core::MeterRegistry;
//! use tally_push::{LoggingPublisher, PushRegistry};
//!
//! # async fn run() -> tally_common::Result<()> {
//! let config = PushRegistryConfig::default();
//! let registry = Arc::new(MeterRegistry::builder().config(&config).build()?);
//! let push = PushRegistry::new(registry.clone(), LoggingPublisher::new(), config)?;
//! push.start()?;
//!
//! registry.counter("jobs.completed", Tags::empty())?.increment();
//!
//! push.close().await;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod naming;
pub mod publisher;
pub mod sink;
pub mod validity;

pub use backends::{
    CloudWatchConfig, CloudWatchPublisher, InfluxConfig, InfluxPublisher, LoggingPublisher,
    MetricDatum,
};
pub use naming::NamingConvention;
pub use publisher::{PublishStats, PushRegistry, Publisher};
pub use sink::{InMemorySink, RecordSink, TracingSink};
pub use validity::{FieldPolicy, NumericPolicy};
