//! Writes each step's snapshots to the log, one event per meter.

use async_trait::async_trait;
use tally_common::{ExportError, TimeUnit};
use tally_core::{MeterSnapshot, SnapshotValues};
use tracing::info;

use crate::publisher::Publisher;

#[derive(Debug, Clone)]
pub struct LoggingPublisher {
    time_unit: TimeUnit,
    /// Skip meters that saw no activity in the step
    skip_idle: bool,
}

impl LoggingPublisher {
    pub fn new() -> Self {
        Self {
            time_unit: TimeUnit::Milliseconds,
            skip_idle: true,
        }
    }

    pub fn with_time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = unit;
        self
    }

    pub fn with_skip_idle(mut self, skip_idle: bool) -> Self {
        self.skip_idle = skip_idle;
        self
    }

    /// One human readable line per snapshot
    pub fn render(&self, snapshots: &[MeterSnapshot]) -> Vec<String> {
        let unit = symbol(self.time_unit);
        snapshots
            .iter()
            .filter(|snapshot| !(self.skip_idle && is_idle(snapshot.values())))
            .map(|snapshot| {
                let values = match snapshot.values() {
                    SnapshotValues::Counter { count } => format!("count={}", count),
                    SnapshotValues::Gauge { value } => format!("value={}", value),
                    SnapshotValues::Timer(d) => format!(
                        "count={} total={}{unit} mean={}{unit} max={}{unit}",
                        d.count,
                        d.total,
                        d.mean(),
                        d.max,
                        unit = unit
                    ),
                    SnapshotValues::FunctionTimer { count, total } => format!(
                        "count={} total={}{unit}",
                        count,
                        total,
                        unit = unit
                    ),
                    SnapshotValues::Summary(d) => format!(
                        "count={} total={} mean={} max={}",
                        d.count,
                        d.total,
                        d.mean(),
                        d.max
                    ),
                    SnapshotValues::LongTaskTimer {
                        active_tasks,
                        duration,
                        max,
                    } => format!(
                        "active={} duration={}{unit} max={}{unit}",
                        active_tasks,
                        duration,
                        max,
                        unit = unit
                    ),
                    SnapshotValues::Other { measurements } => measurements
                        .iter()
                        .map(|m| format!("{}={}", m.statistic, m.value))
                        .collect::<Vec<_>>()
                        .join(" "),
                };
                format!("{} {}", snapshot.id(), values)
            })
            .collect()
    }
}

impl Default for LoggingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

fn symbol(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Nanoseconds => "ns",
        TimeUnit::Microseconds => "us",
        TimeUnit::Milliseconds => "ms",
        TimeUnit::Seconds => "s",
    }
}

fn is_idle(values: &SnapshotValues) -> bool {
    match values {
        SnapshotValues::Counter { count } => *count == 0.0,
        SnapshotValues::Timer(d) | SnapshotValues::Summary(d) => d.count == 0,
        SnapshotValues::FunctionTimer { count, .. } => *count == 0,
        SnapshotValues::LongTaskTimer { active_tasks, .. } => *active_tasks == 0,
        SnapshotValues::Gauge { .. } | SnapshotValues::Other { .. } => false,
    }
}

#[async_trait]
impl Publisher for LoggingPublisher {
    fn name(&self) -> &str {
        "logging"
    }

    fn base_time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    async fn publish(&self, snapshots: &[MeterSnapshot]) -> Result<(), ExportError> {
        for line in self.render(snapshots) {
            info!(target: "tally::logging", "{}", line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::{MeterId, MeterKind, Tags};
    use tally_core::DistributionSnapshot;

    fn counter(name: &str, count: f64) -> MeterSnapshot {
        MeterSnapshot::new(
            MeterId::new(name, Tags::empty(), MeterKind::Counter),
            SnapshotValues::Counter { count },
        )
    }

    #[test]
    fn test_idle_meters_are_skipped() {
        let publisher = LoggingPublisher::new();

        let lines = publisher.render(&[counter("busy", 2.0), counter("quiet", 0.0)]);

        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("busy"));
        assert!(lines[0].ends_with("count=2"));
    }

    #[test]
    fn test_idle_meters_kept_when_asked() {
        let publisher = LoggingPublisher::new().with_skip_idle(false);

        assert_eq!(publisher.render(&[counter("quiet", 0.0)]).len(), 1);
    }

    #[test]
    fn test_timer_line_carries_unit() {
        let publisher = LoggingPublisher::new().with_time_unit(TimeUnit::Seconds);
        let snapshot = MeterSnapshot::new(
            MeterId::new("latency", Tags::empty(), MeterKind::Timer),
            SnapshotValues::Timer(DistributionSnapshot {
                count: 2,
                total: 3.0,
                max: 2.0,
            }),
        );

        let lines = publisher.render(&[snapshot]);

        assert!(lines[0].contains("mean=1.5s"));
        assert_eq!(publisher.base_time_unit(), TimeUnit::Seconds);
    }

    #[tokio::test]
    async fn test_publish_never_fails() {
        let publisher = LoggingPublisher::new();
        assert!(publisher.publish(&[counter("busy", 1.0)]).await.is_ok());
    }
}
