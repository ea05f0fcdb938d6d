//! CloudWatch metric data
//!
//! Each meter becomes one or more [`MetricDatum`] points named after the
//! meter plus a statistic suffix (`requests.count`, `latency.max`, ...).
//! Values go through the CloudWatch clamp policy, tags become at most 30
//! dimensions and tags with blank values are dropped.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tally_common::{
    Clock, ExportError, MeterId, PushRegistryConfig, Result, SystemClock, TallyError, TimeUnit,
};
use tally_core::{MeterSnapshot, SnapshotValues};
use tracing::{debug, instrument};

use crate::naming::{convention_tags, CloudWatchNamingConvention, NamingConvention};
use crate::publisher::Publisher;
use crate::sink::RecordSink;
use crate::validity::NumericPolicy;

/// Most dimensions CloudWatch accepts per datum
pub const MAX_DIMENSIONS: usize = 30;

/// Most data points per `PutMetricData` call
pub const MAX_BATCH_SIZE: usize = 1000;

/// Unit timer data is reported in
pub const BASE_TIME_UNIT: TimeUnit = TimeUnit::Milliseconds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudWatchConfig {
    pub push: PushRegistryConfig,
    pub namespace: String,
    /// One second storage resolution instead of one minute
    pub high_resolution: bool,
    pub numeric_policy: NumericPolicy,
}

impl CloudWatchConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            push: PushRegistryConfig::default().with_batch_size(MAX_BATCH_SIZE),
            namespace: namespace.into(),
            high_resolution: false,
            numeric_policy: NumericPolicy::CLOUDWATCH,
        }
    }

    /// Load the push settings from `{prefix}_*` environment variables
    pub fn load(namespace: impl Into<String>, prefix: &str) -> Result<Self> {
        let defaults = Self::new(namespace);
        let config = Self {
            push: PushRegistryConfig::load(prefix)?,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.push.validate()?;
        if self.namespace.trim().is_empty() {
            return Err(TallyError::InvalidConfiguration(
                "namespace must not be empty".into(),
            ));
        }
        if self.push.batch_size > MAX_BATCH_SIZE {
            return Err(TallyError::InvalidConfiguration(format!(
                "batch_size must be at most {}, got {}",
                MAX_BATCH_SIZE, self.push.batch_size
            )));
        }
        self.numeric_policy.validate()
    }

    fn storage_resolution(&self) -> u32 {
        if self.high_resolution {
            1
        } else {
            60
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandardUnit {
    Seconds,
    Microseconds,
    Milliseconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Percent,
    Count,
    None,
}

impl StandardUnit {
    fn from_time_unit(unit: TimeUnit) -> Self {
        match unit {
            TimeUnit::Seconds => StandardUnit::Seconds,
            TimeUnit::Milliseconds => StandardUnit::Milliseconds,
            TimeUnit::Microseconds => StandardUnit::Microseconds,
            TimeUnit::Nanoseconds => StandardUnit::None,
        }
    }

    /// Map a meter's base unit, e.g. `bytes`, case-insensitively
    fn from_base_unit(unit: Option<&str>) -> Self {
        match unit.map(str::to_ascii_lowercase).as_deref() {
            Some("seconds") => StandardUnit::Seconds,
            Some("milliseconds") => StandardUnit::Milliseconds,
            Some("microseconds") => StandardUnit::Microseconds,
            Some("bytes") => StandardUnit::Bytes,
            Some("kilobytes") => StandardUnit::Kilobytes,
            Some("megabytes") => StandardUnit::Megabytes,
            Some("percent") => StandardUnit::Percent,
            Some("count") => StandardUnit::Count,
            _ => StandardUnit::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

/// One point of a `PutMetricData` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricDatum {
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub value: f64,
    pub unit: StandardUnit,
    pub timestamp: DateTime<Utc>,
    pub storage_resolution: u32,
}

/// Publishes snapshots as CloudWatch metric data
pub struct CloudWatchPublisher<S> {
    config: CloudWatchConfig,
    sink: S,
    naming: Box<dyn NamingConvention>,
    clock: Arc<dyn Clock>,
}

impl<S: RecordSink<MetricDatum>> CloudWatchPublisher<S> {
    /// # Errors
    ///
    /// [`TallyError::InvalidConfiguration`] when the configuration is invalid.
    pub fn new(config: CloudWatchConfig, sink: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            naming: Box::new(CloudWatchNamingConvention::default()),
            clock: Arc::new(SystemClock::new()),
        })
    }

    pub fn with_naming(mut self, naming: impl NamingConvention + 'static) -> Self {
        self.naming = Box::new(naming);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CloudWatchConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// All data points for one publish
    pub fn metric_data(&self, snapshots: &[MeterSnapshot]) -> Vec<MetricDatum> {
        let timestamp = Utc
            .timestamp_millis_opt(self.clock.wall_time_ms() as i64)
            .single()
            .unwrap_or_else(Utc::now);
        let time_unit = StandardUnit::from_time_unit(BASE_TIME_UNIT);

        let mut data = Vec::new();
        for snapshot in snapshots {
            let id = snapshot.id();
            let base_unit = StandardUnit::from_base_unit(id.base_unit.as_deref());
            let mut push = |id: &MeterId, suffix: Option<&str>, unit: StandardUnit, value: f64| {
                data.extend(self.datum(id, suffix, unit, value, timestamp));
            };

            match snapshot.values() {
                SnapshotValues::Counter { count } => {
                    push(id, Some("count"), StandardUnit::Count, *count);
                }
                SnapshotValues::Gauge { value } => push(id, Some("value"), base_unit, *value),
                SnapshotValues::Timer(d) => {
                    push(id, Some("sum"), time_unit, d.total);
                    push(id, Some("count"), StandardUnit::Count, d.count as f64);
                    if d.count > 0 {
                        push(id, Some("avg"), time_unit, d.mean());
                        push(id, Some("max"), time_unit, d.max);
                    }
                }
                SnapshotValues::FunctionTimer { count, total } => {
                    push(id, Some("sum"), time_unit, *total);
                    push(id, Some("count"), StandardUnit::Count, *count as f64);
                    if *count > 0 {
                        push(id, Some("avg"), time_unit, *total / *count as f64);
                    }
                }
                SnapshotValues::Summary(d) => {
                    push(id, Some("sum"), base_unit, d.total);
                    push(id, Some("count"), StandardUnit::Count, d.count as f64);
                    if d.count > 0 {
                        push(id, Some("avg"), base_unit, d.mean());
                        push(id, Some("max"), base_unit, d.max);
                    }
                }
                SnapshotValues::LongTaskTimer {
                    active_tasks,
                    duration,
                    ..
                } => {
                    push(id, Some("activeTasks"), StandardUnit::Count, *active_tasks as f64);
                    push(id, Some("duration"), time_unit, *duration);
                }
                SnapshotValues::Other { measurements } => {
                    for m in measurements {
                        let tagged = id.with_tag("statistic", m.statistic.to_string());
                        push(&tagged, None, base_unit, m.value);
                    }
                }
            }
        }
        data
    }

    fn datum(
        &self,
        id: &MeterId,
        suffix: Option<&str>,
        unit: StandardUnit,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<MetricDatum> {
        let value = self.config.numeric_policy.apply(value)?;

        let name = match suffix {
            Some(suffix) => format!("{}.{}", id.name, suffix),
            None => id.name.clone(),
        };

        let tags = convention_tags(id, self.naming.as_ref());
        if tags.len() > MAX_DIMENSIONS {
            debug!(
                meter = %id.name,
                tags = tags.len(),
                max = MAX_DIMENSIONS,
                "Meter has more tags than CloudWatch supports; some will be dropped"
            );
        }
        let dimensions = tags
            .into_iter()
            .filter(|tag| !tag.value.trim().is_empty())
            .take(MAX_DIMENSIONS)
            .map(|tag| Dimension {
                name: tag.key,
                value: tag.value,
            })
            .collect();

        Some(MetricDatum {
            metric_name: self.naming.name(&name, id.kind, id.base_unit.as_deref()),
            dimensions,
            value,
            unit,
            timestamp,
            storage_resolution: self.config.storage_resolution(),
        })
    }
}

#[async_trait]
impl<S> Publisher for CloudWatchPublisher<S>
where
    S: RecordSink<MetricDatum> + 'static,
{
    fn name(&self) -> &str {
        "cloudwatch"
    }

    fn base_time_unit(&self) -> TimeUnit {
        BASE_TIME_UNIT
    }

    #[instrument(skip_all, fields(namespace = %self.config.namespace, meters = snapshots.len()))]
    async fn publish(&self, snapshots: &[MeterSnapshot]) -> std::result::Result<(), ExportError> {
        let data = self.metric_data(snapshots);
        for batch in data.chunks(self.config.push.batch_size.max(1)) {
            self.sink.send(batch).await?;
            debug!(points = batch.len(), "Sent metric data batch");
        }
        Ok(())
    }
}
