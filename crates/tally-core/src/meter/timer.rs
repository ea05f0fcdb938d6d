//! Timer: count, total time and decaying max of recorded durations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_common::{Clock, MeterId, TimeUnit};

use super::snapshot::DistributionSnapshot;
use crate::step::{StepTuple, TimeWindowMax};

#[derive(Debug)]
struct TimerInner {
    id: MeterId,
    clock: Arc<dyn Clock>,
    /// count and total nanoseconds
    recorded: StepTuple,
    max_nanos: TimeWindowMax,
    detached: AtomicBool,
}

/// Timer handle
#[derive(Debug, Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

impl Timer {
    pub fn new(id: MeterId, clock: Arc<dyn Clock>, step: Duration) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                id,
                recorded: StepTuple::new(clock.clone(), step),
                max_nanos: TimeWindowMax::new(clock.clone(), step),
                clock,
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.inner.id
    }

    pub fn record(&self, duration: Duration) {
        if self.inner.detached.load(Ordering::Relaxed) {
            return;
        }
        let nanos = duration.as_nanos() as f64;
        self.inner.recorded.record(1, nanos);
        self.inner.max_nanos.record(nanos);
    }

    /// Run `f` and record how long it took on the registry clock
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = self.inner.clock.monotonic_nanos();
        let result = f();
        let elapsed = self.inner.clock.monotonic_nanos().saturating_sub(start);
        self.record(Duration::from_nanos(elapsed));
        result
    }

    /// Number of recordings in the last completed step
    pub fn count(&self) -> u64 {
        self.inner.recorded.poll().0
    }

    pub fn total_time(&self, unit: TimeUnit) -> f64 {
        unit.from_nanos(self.inner.recorded.poll().1)
    }

    pub fn max(&self, unit: TimeUnit) -> f64 {
        unit.from_nanos(self.inner.max_nanos.poll())
    }

    pub fn mean(&self, unit: TimeUnit) -> f64 {
        self.snapshot(unit).mean()
    }

    /// Count and total come from the same step
    pub fn snapshot(&self, unit: TimeUnit) -> DistributionSnapshot {
        let (count, total_nanos) = self.inner.recorded.poll();
        DistributionSnapshot {
            count,
            total: unit.from_nanos(total_nanos),
            max: self.max(unit),
        }
    }

    pub(crate) fn detach(&self) {
        self.inner.detached.store(true, Ordering::Relaxed);
    }

    pub(crate) fn closing_rollover(&self) {
        self.inner.recorded.closing_rollover();
    }

    pub(crate) fn ptr_eq(&self, other: &Timer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::{MeterKind, MockClock, Tags};

    const STEP: Duration = Duration::from_secs(60);

    fn timer() -> (Arc<MockClock>, Timer) {
        let clock = Arc::new(MockClock::new());
        let id = MeterId::new("http.server.requests", Tags::empty(), MeterKind::Timer);
        (clock.clone(), Timer::new(id, clock, STEP))
    }

    #[test]
    fn test_record_aggregates_per_step() {
        let (clock, timer) = timer();

        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(30));
        clock.add(STEP);

        assert_eq!(timer.count(), 2);
        assert_eq!(timer.total_time(TimeUnit::Milliseconds), 40.0);
        assert_eq!(timer.max(TimeUnit::Milliseconds), 30.0);
        assert_eq!(timer.mean(TimeUnit::Milliseconds), 20.0);
        assert_eq!(timer.total_time(TimeUnit::Seconds), 0.04);
    }

    #[test]
    fn test_time_uses_monotonic_clock() {
        let (clock, timer) = timer();

        let answer = timer.time(|| {
            clock.add_millis(250);
            42
        });
        assert_eq!(answer, 42);

        clock.add(STEP);
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.max(TimeUnit::Milliseconds), 250.0);
    }

    #[test]
    fn test_idle_steps_reset_every_statistic() {
        let (clock, timer) = timer();

        timer.record(Duration::from_secs(2));
        clock.add(STEP * 2);

        assert_eq!(timer.count(), 0);
        assert_eq!(timer.max(TimeUnit::Seconds), 0.0);
    }

    /// Moves one step forward on the n-th wall clock read
    #[derive(Debug)]
    struct JumpingClock {
        inner: MockClock,
        reads: std::sync::atomic::AtomicUsize,
        jump_at: usize,
    }

    impl Clock for JumpingClock {
        fn wall_time_ms(&self) -> u64 {
            if self.reads.fetch_add(1, Ordering::SeqCst) + 1 == self.jump_at {
                self.inner.add(STEP);
            }
            self.inner.wall_time_ms()
        }

        fn monotonic_nanos(&self) -> u64 {
            self.inner.monotonic_nanos()
        }
    }

    #[test]
    fn test_boundary_during_record_keeps_snapshot_whole() {
        for jump_at in 1..8 {
            let clock = Arc::new(JumpingClock {
                inner: MockClock::new(),
                reads: Default::default(),
                jump_at,
            });
            let id = MeterId::new("db.query", Tags::empty(), MeterKind::Timer);
            let timer = Timer::new(id, clock.clone(), STEP);

            timer.record(Duration::from_millis(100));
            for _ in 0..3 {
                let snapshot = timer.snapshot(TimeUnit::Milliseconds);
                assert_eq!(
                    snapshot.total,
                    snapshot.count as f64 * 100.0,
                    "jump at read {}: {:?}",
                    jump_at,
                    snapshot
                );
                clock.inner.add(STEP);
            }
        }
    }
}
