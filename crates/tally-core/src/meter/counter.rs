//! Monotonic counter reporting the increments of the last completed step

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_common::{Clock, MeterId};

use crate::step::StepDouble;

#[derive(Debug)]
struct CounterInner {
    id: MeterId,
    value: StepDouble,
    detached: AtomicBool,
}

/// Counter handle. Cloning shares the underlying meter.
#[derive(Debug, Clone)]
pub struct Counter {
    inner: Arc<CounterInner>,
}

impl Counter {
    pub fn new(id: MeterId, clock: Arc<dyn Clock>, step: Duration) -> Self {
        Self {
            inner: Arc::new(CounterInner {
                id,
                value: StepDouble::new(clock, step),
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.inner.id
    }

    /// Add one
    pub fn increment(&self) {
        self.increment_by(1.0);
    }

    /// Add `amount`. Negative and NaN amounts are ignored; counters only go up.
    pub fn increment_by(&self, amount: f64) {
        if self.inner.detached.load(Ordering::Relaxed) || !(amount >= 0.0) {
            return;
        }
        self.inner.value.record(amount);
    }

    /// Increments during the last completed step
    pub fn count(&self) -> f64 {
        self.inner.value.poll()
    }

    pub(crate) fn detach(&self) {
        self.inner.detached.store(true, Ordering::Relaxed);
    }

    pub(crate) fn closing_rollover(&self) {
        self.inner.value.closing_rollover();
    }

    pub(crate) fn ptr_eq(&self, other: &Counter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
