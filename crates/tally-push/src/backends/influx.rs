//! InfluxDB line protocol
//!
//! One line per meter:
//!
//! ```text
//! http_server_requests,method=GET,metric_type=histogram sum=40,count=2,mean=20,upper=30 1700000000000
//! ```
//!
//! Fields that are not finite are left out of their line; a line without any
//! field is not written at all.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_common::{Clock, ExportError, MeterId, PushRegistryConfig, Result, SystemClock};
use tally_core::{MeterSnapshot, SnapshotValues};
use tracing::{debug, instrument};

use crate::naming::{convention_name, InfluxNamingConvention, NamingConvention};
use crate::publisher::Publisher;
use crate::sink::RecordSink;
use crate::validity::{FieldPolicy, NumericPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluxConfig {
    pub push: PushRegistryConfig,
    pub numeric_policy: NumericPolicy,
    pub field_policy: FieldPolicy,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            push: PushRegistryConfig::default(),
            numeric_policy: NumericPolicy::Drop,
            field_policy: FieldPolicy::Independent,
        }
    }
}

impl InfluxConfig {
    /// Load the push settings from `{prefix}_*` environment variables
    pub fn load(prefix: &str) -> Result<Self> {
        let config = Self {
            push: PushRegistryConfig::load(prefix)?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.push.validate()?;
        self.numeric_policy.validate()
    }
}

/// Publishes snapshots as line protocol strings
pub struct InfluxPublisher<S> {
    config: InfluxConfig,
    sink: S,
    naming: Box<dyn NamingConvention>,
    clock: Arc<dyn Clock>,
}

impl<S: RecordSink<String>> InfluxPublisher<S> {
    /// # Errors
    ///
    /// [`TallyError::InvalidConfiguration`](tally_common::TallyError::InvalidConfiguration)
    /// when the configuration is invalid.
    pub fn new(config: InfluxConfig, sink: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            naming: Box::new(InfluxNamingConvention::default()),
            clock: Arc::new(SystemClock::new()),
        })
    }

    pub fn with_naming(mut self, naming: impl NamingConvention + 'static) -> Self {
        self.naming = Box::new(naming);
        self
    }

    /// Clock used for line timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &InfluxConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Render every snapshot, skipping meters with nothing to write
    pub fn lines(&self, snapshots: &[MeterSnapshot]) -> Vec<String> {
        let timestamp = self.clock.wall_time_ms();
        snapshots
            .iter()
            .filter_map(|snapshot| self.line(snapshot, timestamp))
            .collect()
    }

    fn line(&self, snapshot: &MeterSnapshot, timestamp: u64) -> Option<String> {
        let (metric_type, fields): (&str, Vec<(String, f64)>) = match snapshot.values() {
            SnapshotValues::Counter { count } => ("counter", vec![("value".into(), *count)]),
            SnapshotValues::Gauge { value } => ("gauge", vec![("value".into(), *value)]),
            SnapshotValues::Timer(d) | SnapshotValues::Summary(d) => (
                "histogram",
                vec![
                    ("sum".into(), d.total),
                    ("count".into(), d.count as f64),
                    ("mean".into(), d.mean()),
                    ("upper".into(), d.max),
                ],
            ),
            SnapshotValues::FunctionTimer { count, total } => (
                "histogram",
                vec![
                    ("sum".into(), *total),
                    ("count".into(), *count as f64),
                    (
                        "mean".into(),
                        if *count == 0 {
                            0.0
                        } else {
                            *total / *count as f64
                        },
                    ),
                ],
            ),
            SnapshotValues::LongTaskTimer {
                active_tasks,
                duration,
                ..
            } => (
                "long_task_timer",
                vec![
                    ("active_tasks".into(), *active_tasks as f64),
                    ("duration".into(), *duration),
                ],
            ),
            SnapshotValues::Other { measurements } => (
                "other",
                measurements
                    .iter()
                    .map(|m| (m.statistic.to_string(), m.value))
                    .collect(),
            ),
        };

        let fields = self
            .config
            .field_policy
            .filter(&self.config.numeric_policy, fields);
        if fields.is_empty() {
            return None;
        }

        Some(format!(
            "{}{},metric_type={} {} {}",
            convention_name(snapshot.id(), self.naming.as_ref()),
            self.tag_segment(snapshot.id()),
            metric_type,
            fields
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join(","),
            timestamp
        ))
    }

    /// Blank values are skipped before escaping, which would make them non-blank
    fn tag_segment(&self, id: &MeterId) -> String {
        id.tags
            .iter()
            .filter(|tag| !tag.value.trim().is_empty())
            .map(|tag| {
                format!(
                    ",{}={}",
                    self.naming.tag_key(&tag.key),
                    self.naming.tag_value(&tag.value)
                )
            })
            .collect()
    }
}

#[async_trait]
impl<S> Publisher for InfluxPublisher<S>
where
    S: RecordSink<String> + 'static,
{
    fn name(&self) -> &str {
        "influx"
    }

    #[instrument(skip_all, fields(meters = snapshots.len()))]
    async fn publish(&self, snapshots: &[MeterSnapshot]) -> std::result::Result<(), ExportError> {
        let lines = self.lines(snapshots);
        for batch in lines.chunks(self.config.push.batch_size.max(1)) {
            self.sink.send(batch).await?;
            debug!(lines = batch.len(), "Sent line protocol batch");
        }
        Ok(())
    }
}
