//! Meter handles
//!
//! Every meter kind is a cheap-to-clone handle around shared state. [`Meter`]
//! is the closed set of kinds the registry stores; publishers only ever see
//! it through [`Meter::snapshot`] or [`Meter::measure`].

pub mod counter;
pub mod custom;
pub mod function_counter;
pub mod function_timer;
pub mod gauge;
pub mod long_task_timer;
pub mod snapshot;
pub mod summary;
pub mod time_gauge;
pub mod timer;

pub use counter::Counter;
pub use custom::CustomMeter;
pub use function_counter::FunctionCounter;
pub use function_timer::{FunctionTimer, FunctionTimerSample};
pub use gauge::Gauge;
pub use long_task_timer::{LongTaskSample, LongTaskTimer};
pub use snapshot::{DistributionSnapshot, Measurement, MeterSnapshot, SnapshotValues, Statistic};
pub use summary::DistributionSummary;
pub use time_gauge::TimeGauge;
pub use timer::Timer;

use tally_common::{MeterId, MeterKind, TimeUnit};

/// A registered meter of any kind
#[derive(Debug, Clone)]
pub enum Meter {
    Counter(Counter),
    Gauge(Gauge),
    Timer(Timer),
    DistributionSummary(DistributionSummary),
    LongTaskTimer(LongTaskTimer),
    FunctionCounter(FunctionCounter),
    FunctionTimer(FunctionTimer),
    TimeGauge(TimeGauge),
    Other(CustomMeter),
}

impl Meter {
    pub fn id(&self) -> &MeterId {
        match self {
            Meter::Counter(m) => m.id(),
            Meter::Gauge(m) => m.id(),
            Meter::Timer(m) => m.id(),
            Meter::DistributionSummary(m) => m.id(),
            Meter::LongTaskTimer(m) => m.id(),
            Meter::FunctionCounter(m) => m.id(),
            Meter::FunctionTimer(m) => m.id(),
            Meter::TimeGauge(m) => m.id(),
            Meter::Other(m) => m.id(),
        }
    }

    pub fn kind(&self) -> MeterKind {
        match self {
            Meter::Counter(_) | Meter::FunctionCounter(_) => MeterKind::Counter,
            Meter::Gauge(_) | Meter::TimeGauge(_) => MeterKind::Gauge,
            Meter::Timer(_) | Meter::FunctionTimer(_) => MeterKind::Timer,
            Meter::DistributionSummary(_) => MeterKind::DistributionSummary,
            Meter::LongTaskTimer(_) => MeterKind::LongTaskTimer,
            Meter::Other(_) => MeterKind::Other,
        }
    }

    /// Current fields as statistic/value pairs, timers in nanoseconds
    pub fn measure(&self) -> Vec<Measurement> {
        self.snapshot(TimeUnit::Nanoseconds).measurements()
    }

    /// Freeze the meter's current view for one publish.
    ///
    /// Function counters and function timers report the growth of their
    /// source since the previous snapshot, so each snapshot consumes it.
    pub fn snapshot(&self, unit: TimeUnit) -> MeterSnapshot {
        let values = match self {
            Meter::Counter(c) => SnapshotValues::Counter { count: c.count() },
            Meter::Gauge(g) => SnapshotValues::Gauge { value: g.value() },
            Meter::Timer(t) => SnapshotValues::Timer(t.snapshot(unit)),
            Meter::DistributionSummary(s) => SnapshotValues::Summary(s.snapshot()),
            Meter::LongTaskTimer(l) => SnapshotValues::LongTaskTimer {
                active_tasks: l.active_tasks(),
                duration: l.duration(unit),
                max: l.max(unit),
            },
            Meter::FunctionCounter(f) => SnapshotValues::Counter { count: f.count() },
            Meter::FunctionTimer(f) => {
                let taken = f.take(unit);
                SnapshotValues::FunctionTimer {
                    count: taken.count,
                    total: taken.total,
                }
            }
            Meter::TimeGauge(g) => SnapshotValues::Gauge {
                value: g.value(unit),
            },
            Meter::Other(c) => SnapshotValues::Other {
                measurements: c.measure(),
            },
        };
        MeterSnapshot::new(self.id().clone(), values)
    }

    /// Stop accepting recordings
    pub(crate) fn detach(&self) {
        match self {
            Meter::Counter(c) => c.detach(),
            Meter::Timer(t) => t.detach(),
            Meter::DistributionSummary(s) => s.detach(),
            Meter::LongTaskTimer(l) => l.detach(),
            Meter::FunctionCounter(f) => f.detach(),
            Meter::FunctionTimer(f) => f.detach(),
            Meter::Gauge(_) | Meter::TimeGauge(_) | Meter::Other(_) => {}
        }
    }

    pub(crate) fn closing_rollover(&self) {
        match self {
            Meter::Counter(c) => c.closing_rollover(),
            Meter::Timer(t) => t.closing_rollover(),
            Meter::DistributionSummary(s) => s.closing_rollover(),
            // function meters hold no step window; the final publish drains them
            Meter::Gauge(_)
            | Meter::LongTaskTimer(_)
            | Meter::FunctionCounter(_)
            | Meter::FunctionTimer(_)
            | Meter::TimeGauge(_)
            | Meter::Other(_) => {}
        }
    }

    /// True when both handles share the same underlying meter
    pub fn same_instance(&self, other: &Meter) -> bool {
        match (self, other) {
            (Meter::Counter(a), Meter::Counter(b)) => a.ptr_eq(b),
            (Meter::Gauge(a), Meter::Gauge(b)) => a.ptr_eq(b),
            (Meter::Timer(a), Meter::Timer(b)) => a.ptr_eq(b),
            (Meter::DistributionSummary(a), Meter::DistributionSummary(b)) => a.ptr_eq(b),
            (Meter::LongTaskTimer(a), Meter::LongTaskTimer(b)) => a.ptr_eq(b),
            (Meter::FunctionCounter(a), Meter::FunctionCounter(b)) => a.ptr_eq(b),
            (Meter::FunctionTimer(a), Meter::FunctionTimer(b)) => a.ptr_eq(b),
            (Meter::TimeGauge(a), Meter::TimeGauge(b)) => a.ptr_eq(b),
            (Meter::Other(a), Meter::Other(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}
