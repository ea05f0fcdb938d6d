//! Counters over a cumulative total owned by someone else
//!
//! A [`FunctionCounter`] watches a monotonically increasing total (bytes read
//! by a socket, evictions of a cache) and reports how much it grew. Windowing
//! is driven by the reader rather than the clock: every [`count`] drains the
//! growth seen since the previous read, so a publisher that reads once per
//! step sees each unit of growth exactly once.
//!
//! The source is held weakly. Growth already sampled with [`sample`] is still
//! reported after the source is dropped.
//!
//! [`count`]: FunctionCounter::count
//! [`sample`]: FunctionCounter::sample

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tally_common::{Clock, MeterId};

use crate::step::StepDouble;

type Source = dyn Fn() -> Option<f64> + Send + Sync;

struct FunctionCounterInner {
    id: MeterId,
    source: Box<Source>,
    /// Source total at the previous sample
    last: Mutex<f64>,
    pending: StepDouble,
    detached: AtomicBool,
}

impl std::fmt::Debug for FunctionCounterInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCounterInner")
            .field("id", &self.id)
            .field("last", &*self.last.lock())
            .finish()
    }
}

/// Function counter handle. Cloning shares the underlying meter.
#[derive(Debug, Clone)]
pub struct FunctionCounter {
    inner: Arc<FunctionCounterInner>,
}

impl FunctionCounter {
    pub fn new<T, F>(
        id: MeterId,
        target: &Arc<T>,
        f: F,
        clock: Arc<dyn Clock>,
        step: Duration,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let target: Weak<T> = Arc::downgrade(target);
        Self {
            inner: Arc::new(FunctionCounterInner {
                id,
                source: Box::new(move || target.upgrade().map(|t| f(&t))),
                last: Mutex::new(0.0),
                pending: StepDouble::new(clock, step),
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.inner.id
    }

    /// Fold the growth of the source since the last sample into the pending
    /// count. A total below the previous one means the source restarted from
    /// zero. Non-finite totals are skipped.
    pub fn sample(&self) {
        if self.inner.detached.load(Ordering::Relaxed) {
            return;
        }
        let Some(total) = (self.inner.source)() else {
            return;
        };
        if !total.is_finite() {
            return;
        }

        let mut last = self.inner.last.lock();
        let growth = if total >= *last { total - *last } else { total };
        *last = total;
        self.inner.pending.accumulate(growth);
    }

    /// Growth since the previous call. Each call consumes what it returns.
    pub fn count(&self) -> f64 {
        self.sample();
        self.inner.pending.poll_and_reset()
    }

    pub(crate) fn detach(&self) {
        self.inner.detached.store(true, Ordering::Relaxed);
    }

    pub(crate) fn ptr_eq(&self, other: &FunctionCounter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
