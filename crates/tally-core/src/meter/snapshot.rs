//! Immutable per-step views of meters, handed to publishers

use serde::{Deserialize, Serialize};
use tally_common::MeterId;

/// What a measured value represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    /// Number of events in the step
    Count,
    /// Sum of recorded amounts in the step
    Total,
    /// Sum of recorded durations in the step
    TotalTime,
    /// Decaying maximum
    Max,
    /// Instantaneous value (gauges)
    Value,
    /// Tasks currently in flight
    ActiveTasks,
    /// Cumulative duration of in-flight tasks
    Duration,
    Unknown,
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Statistic::Count => "count",
            Statistic::Total => "total",
            Statistic::TotalTime => "total_time",
            Statistic::Max => "max",
            Statistic::Value => "value",
            Statistic::ActiveTasks => "active_tasks",
            Statistic::Duration => "duration",
            Statistic::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// One field of a meter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub statistic: Statistic,
    pub value: f64,
}

impl Measurement {
    pub fn new(statistic: Statistic, value: f64) -> Self {
        Self { statistic, value }
    }
}

/// Count, total and max of a timer or summary over one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSnapshot {
    pub count: u64,
    pub total: f64,
    pub max: f64,
}

impl DistributionSnapshot {
    /// Mean of the step, 0 when nothing was recorded
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Kind-specific values of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotValues {
    Counter {
        count: f64,
    },
    Gauge {
        value: f64,
    },
    /// Totals and max are in the publisher's base time unit
    Timer(DistributionSnapshot),
    Summary(DistributionSnapshot),
    /// Growth of a cumulative source since the previous publish; `total` is
    /// in the publisher's base time unit
    FunctionTimer {
        count: u64,
        total: f64,
    },
    LongTaskTimer {
        active_tasks: u64,
        duration: f64,
        max: f64,
    },
    Other {
        measurements: Vec<Measurement>,
    },
}

/// Read-only copy of one meter's values at publish time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterSnapshot {
    id: MeterId,
    values: SnapshotValues,
}

impl MeterSnapshot {
    pub fn new(id: MeterId, values: SnapshotValues) -> Self {
        Self { id, values }
    }

    pub fn id(&self) -> &MeterId {
        &self.id
    }

    pub fn values(&self) -> &SnapshotValues {
        &self.values
    }

    /// Flatten into statistic/value pairs
    pub fn measurements(&self) -> Vec<Measurement> {
        match &self.values {
            SnapshotValues::Counter { count } => vec![Measurement::new(Statistic::Count, *count)],
            SnapshotValues::Gauge { value } => vec![Measurement::new(Statistic::Value, *value)],
            SnapshotValues::Timer(d) => vec![
                Measurement::new(Statistic::Count, d.count as f64),
                Measurement::new(Statistic::TotalTime, d.total),
                Measurement::new(Statistic::Max, d.max),
            ],
            SnapshotValues::Summary(d) => vec![
                Measurement::new(Statistic::Count, d.count as f64),
                Measurement::new(Statistic::Total, d.total),
                Measurement::new(Statistic::Max, d.max),
            ],
            SnapshotValues::FunctionTimer { count, total } => vec![
                Measurement::new(Statistic::Count, *count as f64),
                Measurement::new(Statistic::TotalTime, *total),
            ],
            SnapshotValues::LongTaskTimer {
                active_tasks,
                duration,
                max,
            } => vec![
                Measurement::new(Statistic::ActiveTasks, *active_tasks as f64),
                Measurement::new(Statistic::Duration, *duration),
                Measurement::new(Statistic::Max, *max),
            ],
            SnapshotValues::Other { measurements } => measurements.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::{MeterKind, Tags};

    #[test]
    fn test_mean_of_empty_step_is_zero() {
        let empty = DistributionSnapshot {
            count: 0,
            total: 0.0,
            max: 0.0,
        };
        assert_eq!(empty.mean(), 0.0);

        let busy = DistributionSnapshot {
            count: 4,
            total: 10.0,
            max: 6.0,
        };
        assert_eq!(busy.mean(), 2.5);
    }

    #[test]
    fn test_timer_measurements() {
        let id = MeterId::new("db.query", Tags::empty(), MeterKind::Timer);
        let snapshot = MeterSnapshot::new(
            id,
            SnapshotValues::Timer(DistributionSnapshot {
                count: 2,
                total: 30.0,
                max: 20.0,
            }),
        );

        let stats: Vec<_> = snapshot
            .measurements()
            .iter()
            .map(|m| m.statistic)
            .collect();
        assert_eq!(
            stats,
            vec![Statistic::Count, Statistic::TotalTime, Statistic::Max]
        );
    }

    #[test]
    fn test_snapshot_serializes_with_type_tag() {
        let id = MeterId::new("queue.depth", Tags::empty(), MeterKind::Gauge);
        let snapshot = MeterSnapshot::new(id, SnapshotValues::Gauge { value: 7.0 });

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["values"]["type"], "gauge");
        assert_eq!(json["values"]["value"], 7.0);
        assert_eq!(json["id"]["name"], "queue.depth");
    }
}
