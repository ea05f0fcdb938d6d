//! Distribution summary: count, total and max of arbitrary amounts
//! (payload sizes, batch lengths, ...)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_common::{Clock, MeterId};

use super::snapshot::DistributionSnapshot;
use crate::step::{StepTuple, TimeWindowMax};

#[derive(Debug)]
struct SummaryInner {
    id: MeterId,
    /// count and total amount
    recorded: StepTuple,
    max: TimeWindowMax,
    detached: AtomicBool,
}

/// Distribution summary handle
#[derive(Debug, Clone)]
pub struct DistributionSummary {
    inner: Arc<SummaryInner>,
}

impl DistributionSummary {
    pub fn new(id: MeterId, clock: Arc<dyn Clock>, step: Duration) -> Self {
        Self {
            inner: Arc::new(SummaryInner {
                id,
                recorded: StepTuple::new(clock.clone(), step),
                max: TimeWindowMax::new(clock, step),
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.inner.id
    }

    /// Record one amount. Negative and NaN amounts are ignored.
    pub fn record(&self, amount: f64) {
        if self.inner.detached.load(Ordering::Relaxed) || !(amount >= 0.0) {
            return;
        }
        self.inner.recorded.record(1, amount);
        self.inner.max.record(amount);
    }

    pub fn count(&self) -> u64 {
        self.inner.recorded.poll().0
    }

    pub fn total_amount(&self) -> f64 {
        self.inner.recorded.poll().1
    }

    pub fn max(&self) -> f64 {
        self.inner.max.poll()
    }

    pub fn mean(&self) -> f64 {
        self.snapshot().mean()
    }

    pub fn snapshot(&self) -> DistributionSnapshot {
        let (count, total) = self.inner.recorded.poll();
        DistributionSnapshot {
            count,
            total,
            max: self.max(),
        }
    }

    pub(crate) fn detach(&self) {
        self.inner.detached.store(true, Ordering::Relaxed);
    }

    pub(crate) fn closing_rollover(&self) {
        self.inner.recorded.closing_rollover();
    }

    pub(crate) fn ptr_eq(&self, other: &DistributionSummary) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::{MeterKind, MockClock, Tags};

    const STEP: Duration = Duration::from_secs(10);

    #[test]
    fn test_summary_statistics() {
        let clock = Arc::new(MockClock::new());
        let id = MeterId::new("payload.size", Tags::empty(), MeterKind::DistributionSummary)
            .with_base_unit("bytes");
        let summary = DistributionSummary::new(id, clock.clone(), STEP);

        summary.record(100.0);
        summary.record(300.0);
        summary.record(-5.0);
        summary.record(f64::NAN);
        clock.add(STEP);

        assert_eq!(summary.count(), 2);
        assert_eq!(summary.total_amount(), 400.0);
        assert_eq!(summary.max(), 300.0);
        assert_eq!(summary.mean(), 200.0);
    }

    #[test]
    fn test_closing_rollover_flushes_count_and_total_together() {
        let clock = Arc::new(MockClock::new());
        let id = MeterId::new("batch.size", Tags::empty(), MeterKind::DistributionSummary);
        let summary = DistributionSummary::new(id, clock.clone(), STEP);

        summary.record(8.0);
        clock.add(STEP);
        summary.record(2.0);
        summary.closing_rollover();

        let snapshot = summary.snapshot();
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.total, 2.0);
    }
}
