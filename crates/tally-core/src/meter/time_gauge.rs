//! Gauges whose value is a duration
//!
//! The supplier reports in a unit of its choosing; snapshots convert to the
//! publisher's base time unit like timers do.

use std::sync::Arc;

use tally_common::{MeterId, TimeUnit};

use super::Gauge;

/// Time gauge handle. Cloning shares the underlying meter.
#[derive(Debug, Clone)]
pub struct TimeGauge {
    gauge: Gauge,
    unit: TimeUnit,
}

impl TimeGauge {
    /// Time gauge over a weakly held object whose `f` reports in `unit`
    pub fn weak<T, F>(id: MeterId, target: &Arc<T>, unit: TimeUnit, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        Self {
            gauge: Gauge::weak(id, target, f),
            unit,
        }
    }

    pub fn id(&self) -> &MeterId {
        self.gauge.id()
    }

    /// Current value converted to `unit`. NaN once the target is gone.
    pub fn value(&self, unit: TimeUnit) -> f64 {
        unit.from_nanos(self.gauge.value() * self.unit.nanos_per_unit())
    }

    pub(crate) fn ptr_eq(&self, other: &TimeGauge) -> bool {
        self.gauge.ptr_eq(&other.gauge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::{MeterKind, Tags};

    #[test]
    fn test_value_converts_units() {
        let uptime = Arc::new(90.0);
        let id = MeterId::new("process.uptime", Tags::empty(), MeterKind::Gauge);
        let gauge = TimeGauge::weak(id, &uptime, TimeUnit::Seconds, |s| *s);

        assert_eq!(gauge.value(TimeUnit::Milliseconds), 90_000.0);
        assert_eq!(gauge.value(TimeUnit::Seconds), 90.0);

        drop(uptime);
        assert!(gauge.value(TimeUnit::Seconds).is_nan());
    }
}
