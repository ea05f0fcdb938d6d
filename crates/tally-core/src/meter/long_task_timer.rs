//! Long task timer
//!
//! Tracks tasks that are still running, e.g. a nightly batch job. Each
//! [`LongTaskTimer::start`] registers a task; the returned
//! [`LongTaskSample`] removes it on [`stop`](LongTaskSample::stop) or drop.
//! There is no step state: values are read at publish time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tally_common::{Clock, MeterId, TimeUnit};

#[derive(Debug)]
struct LongTaskInner {
    id: MeterId,
    clock: Arc<dyn Clock>,
    /// task id -> monotonic start nanos
    active: DashMap<u64, u64>,
    next_task: AtomicU64,
    detached: AtomicBool,
}

/// Long task timer handle
#[derive(Debug, Clone)]
pub struct LongTaskTimer {
    inner: Arc<LongTaskInner>,
}

impl LongTaskTimer {
    pub fn new(id: MeterId, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(LongTaskInner {
                id,
                clock,
                active: DashMap::new(),
                next_task: AtomicU64::new(0),
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.inner.id
    }

    /// Begin timing a task. On a detached timer the sample is inert.
    pub fn start(&self) -> LongTaskSample {
        if self.inner.detached.load(Ordering::Relaxed) {
            return LongTaskSample {
                timer: self.inner.clone(),
                task: None,
            };
        }
        let task = self.inner.next_task.fetch_add(1, Ordering::Relaxed);
        self.inner
            .active
            .insert(task, self.inner.clock.monotonic_nanos());
        LongTaskSample {
            timer: self.inner.clone(),
            task: Some(task),
        }
    }

    pub fn active_tasks(&self) -> u64 {
        self.inner.active.len() as u64
    }

    /// Sum of the running time of all active tasks
    pub fn duration(&self, unit: TimeUnit) -> f64 {
        let now = self.inner.clock.monotonic_nanos();
        let nanos: u64 = self
            .inner
            .active
            .iter()
            .map(|entry| now.saturating_sub(*entry.value()))
            .sum();
        unit.from_nanos(nanos as f64)
    }

    /// Running time of the oldest active task
    pub fn max(&self, unit: TimeUnit) -> f64 {
        let now = self.inner.clock.monotonic_nanos();
        let oldest = self
            .inner
            .active
            .iter()
            .map(|entry| *entry.value())
            .min()
            .map(|start| now.saturating_sub(start))
            .unwrap_or(0);
        unit.from_nanos(oldest as f64)
    }

    pub(crate) fn detach(&self) {
        self.inner.detached.store(true, Ordering::Relaxed);
        self.inner.active.clear();
    }

    pub(crate) fn ptr_eq(&self, other: &LongTaskTimer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A running task. Stops when dropped.
#[derive(Debug)]
pub struct LongTaskSample {
    timer: Arc<LongTaskInner>,
    task: Option<u64>,
}

impl LongTaskSample {
    /// Stop the task and return how long it ran
    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    /// Elapsed time so far, zero once stopped
    pub fn elapsed(&self) -> Duration {
        self.task
            .and_then(|task| self.timer.active.get(&task).map(|start| *start))
            .map(|start| {
                Duration::from_nanos(self.timer.clock.monotonic_nanos().saturating_sub(start))
            })
            .unwrap_or_default()
    }

    fn finish(&mut self) -> Duration {
        match self.task.take() {
            Some(task) => match self.timer.active.remove(&task) {
                Some((_, start)) => Duration::from_nanos(
                    self.timer.clock.monotonic_nanos().saturating_sub(start),
                ),
                None => Duration::ZERO,
            },
            None => Duration::ZERO,
        }
    }
}

impl Drop for LongTaskSample {
    fn drop(&mut self) {
        self.finish();
    }
}
