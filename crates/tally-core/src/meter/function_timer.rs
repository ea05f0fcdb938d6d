//! Timers over cumulative count and total time kept by someone else
//!
//! Same model as [`FunctionCounter`](super::FunctionCounter): the source
//! exposes running totals, and each read drains the growth of both since the
//! previous read. Count and total are sampled and drained under one lock so a
//! read never pairs the count of one sample with the total of another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tally_common::{Clock, MeterId, TimeUnit};

use crate::step::{StepDouble, StepLong};

type Source = dyn Fn() -> Option<(u64, f64)> + Send + Sync;

/// Count and total time grown since the previous read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionTimerSample {
    pub count: u64,
    pub total: f64,
}

impl FunctionTimerSample {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

struct FunctionTimerInner {
    id: MeterId,
    source: Box<Source>,
    /// Source count and total nanoseconds at the previous sample
    last: Mutex<(u64, f64)>,
    pending_count: StepLong,
    pending_nanos: StepDouble,
    detached: AtomicBool,
}

impl std::fmt::Debug for FunctionTimerInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTimerInner")
            .field("id", &self.id)
            .finish()
    }
}

/// Function timer handle. Cloning shares the underlying meter.
#[derive(Debug, Clone)]
pub struct FunctionTimer {
    inner: Arc<FunctionTimerInner>,
}

impl FunctionTimer {
    /// `total_time` is read in `total_unit`
    pub fn new<T, C, F>(
        id: MeterId,
        target: &Arc<T>,
        count: C,
        total_time: F,
        total_unit: TimeUnit,
        clock: Arc<dyn Clock>,
        step: Duration,
    ) -> Self
    where
        T: Send + Sync + 'static,
        C: Fn(&T) -> u64 + Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let target: Weak<T> = Arc::downgrade(target);
        let nanos_per_unit = total_unit.nanos_per_unit();
        Self {
            inner: Arc::new(FunctionTimerInner {
                id,
                source: Box::new(move || {
                    target
                        .upgrade()
                        .map(|t| (count(&t), total_time(&t) * nanos_per_unit))
                }),
                last: Mutex::new((0, 0.0)),
                pending_count: StepLong::new(clock.clone(), step),
                pending_nanos: StepDouble::new(clock, step),
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.inner.id
    }

    /// Fold the growth of the source since the last sample into the pending
    /// values. A count below the previous one means the source restarted.
    pub fn sample(&self) {
        let mut last = self.inner.last.lock();
        self.sample_locked(&mut last);
    }

    /// Growth since the previous call, total in `unit`. Each call consumes
    /// what it returns.
    pub fn take(&self, unit: TimeUnit) -> FunctionTimerSample {
        let mut last = self.inner.last.lock();
        self.sample_locked(&mut last);
        FunctionTimerSample {
            count: self.inner.pending_count.poll_and_reset(),
            total: unit.from_nanos(self.inner.pending_nanos.poll_and_reset()),
        }
    }

    fn sample_locked(&self, last: &mut (u64, f64)) {
        if self.inner.detached.load(Ordering::Relaxed) {
            return;
        }
        let Some((count, nanos)) = (self.inner.source)() else {
            return;
        };
        if !nanos.is_finite() {
            return;
        }

        let (last_count, last_nanos) = *last;
        let (count_growth, nanos_growth) = if count >= last_count && nanos >= last_nanos {
            (count - last_count, nanos - last_nanos)
        } else {
            (count, nanos)
        };
        *last = (count, nanos);
        self.inner.pending_count.accumulate(count_growth);
        self.inner.pending_nanos.accumulate(nanos_growth);
    }

    pub(crate) fn detach(&self) {
        self.inner.detached.store(true, Ordering::Relaxed);
    }

    pub(crate) fn ptr_eq(&self, other: &FunctionTimer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::{MeterKind, MockClock, Tags};

    const STEP: Duration = Duration::from_secs(60);

    #[derive(Default)]
    struct Pool {
        acquired: Mutex<(u64, f64)>,
    }

    fn timer(pool: &Arc<Pool>) -> FunctionTimer {
        let id = MeterId::new("pool.acquire", Tags::empty(), MeterKind::Timer);
        FunctionTimer::new(
            id,
            pool,
            |p| p.acquired.lock().0,
            |p| p.acquired.lock().1,
            TimeUnit::Milliseconds,
            Arc::new(MockClock::new()),
            STEP,
        )
    }

    #[test]
    fn test_reports_growth_in_requested_unit() {
        let pool = Arc::new(Pool::default());
        *pool.acquired.lock() = (3, 53.0);
        let timer = timer(&pool);

        let first = timer.take(TimeUnit::Milliseconds);
        assert_eq!(first.count, 3);
        assert_eq!(first.total, 53.0);

        *pool.acquired.lock() = (5, 2053.0);
        let second = timer.take(TimeUnit::Seconds);
        assert_eq!(second.count, 2);
        assert_eq!(second.total, 2.0);
        assert_eq!(second.mean(), 1.0);

        assert_eq!(timer.take(TimeUnit::Milliseconds).count, 0);
    }

    #[test]
    fn test_sampling_does_not_double_count() {
        let pool = Arc::new(Pool::default());
        let timer = timer(&pool);

        *pool.acquired.lock() = (1, 10.0);
        timer.sample();
        timer.sample();
        *pool.acquired.lock() = (4, 40.0);
        timer.sample();

        let taken = timer.take(TimeUnit::Milliseconds);
        assert_eq!(taken.count, 4);
        assert_eq!(taken.total, 40.0);
    }

    #[test]
    fn test_sampled_growth_survives_dropped_source() {
        let pool = Arc::new(Pool::default());
        let timer = timer(&pool);
        *pool.acquired.lock() = (2, 8.0);

        timer.sample();
        drop(pool);

        let taken = timer.take(TimeUnit::Milliseconds);
        assert_eq!(taken.count, 2);
        assert_eq!(taken.total, 8.0);
    }
}
