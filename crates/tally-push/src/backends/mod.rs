//! Backend publishers
//!
//! Each backend turns [`tally_core::MeterSnapshot`]s into its own wire
//! records and hands them to a [`crate::sink::RecordSink`].

pub mod cloudwatch;
pub mod influx;
pub mod logging;

pub use cloudwatch::{CloudWatchConfig, CloudWatchPublisher, Dimension, MetricDatum, StandardUnit};
pub use influx::{InfluxConfig, InfluxPublisher};
pub use logging::LoggingPublisher;
