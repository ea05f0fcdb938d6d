//! Step position and rollover gate shared by the step cells
//!
//! The position is the index of the live step (`wall_ms / step_ms`). A
//! rollover CAS-es it to `ROLLING`, waits until no writer is inside the live
//! window, drains, then stores the new position. Writers register themselves
//! before checking the position, so a writer either sees `ROLLING` and backs
//! off, or is waited for by the roller. Both sides use `SeqCst` for that
//! handshake.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_common::Clock;

const ROLLING: u64 = u64::MAX;
const CLOSED: u64 = u64::MAX - 1;

#[derive(Debug)]
pub(crate) struct StepWindow {
    clock: Arc<dyn Clock>,
    step_ms: u64,
    position: AtomicU64,
    writers: AtomicU64,
}

/// A writer inside the live window; rollover waits for it to drop
pub(crate) struct WriteGuard<'a> {
    writers: &'a AtomicU64,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.writers.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StepWindow {
    pub(crate) fn new(clock: Arc<dyn Clock>, step: Duration) -> Self {
        let step_ms = u64::try_from(step.as_millis()).unwrap_or(u64::MAX).max(1);
        let position = clock.wall_time_ms() / step_ms;
        Self {
            clock,
            step_ms,
            position: AtomicU64::new(position),
            writers: AtomicU64::new(0),
        }
    }

    /// Roll if a boundary passed since the last roll.
    ///
    /// `drain(adjacent)` runs with no writer inside the window; `adjacent` is
    /// false when more than one boundary passed, so the completed step saw no
    /// writes. Returns `false` once closed.
    pub(crate) fn roll(&self, drain: impl Fn(bool)) -> bool {
        let step = self.clock.wall_time_ms() / self.step_ms;
        loop {
            match self.position.load(Ordering::SeqCst) {
                CLOSED => return false,
                ROLLING => std::hint::spin_loop(),
                p if p >= step => return true,
                p => {
                    if self
                        .position
                        .compare_exchange(p, ROLLING, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        self.wait_for_writers();
                        drain(p + 1 == step);
                        self.position.store(step, Ordering::SeqCst);
                        return true;
                    }
                }
            }
        }
    }

    /// Roll if needed and enter the live window. `None` once closed.
    pub(crate) fn enter(&self, drain: impl Fn(bool)) -> Option<WriteGuard<'_>> {
        loop {
            if !self.roll(&drain) {
                return None;
            }
            self.writers.fetch_add(1, Ordering::SeqCst);
            let guard = WriteGuard {
                writers: &self.writers,
            };
            match self.position.load(Ordering::SeqCst) {
                ROLLING | CLOSED => drop(guard),
                _ => return Some(guard),
            }
        }
    }

    /// Stop rolling for good. `drain` runs once, with no writer inside.
    pub(crate) fn close(&self, drain: impl FnOnce()) {
        loop {
            match self.position.load(Ordering::SeqCst) {
                CLOSED => return,
                ROLLING => std::hint::spin_loop(),
                p => {
                    if self
                        .position
                        .compare_exchange(p, ROLLING, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        self.wait_for_writers();
                        drain();
                        self.position.store(CLOSED, Ordering::SeqCst);
                        return;
                    }
                }
            }
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.position.load(Ordering::SeqCst) == CLOSED
    }

    /// Current position, or `None` while a roll is in progress
    pub(crate) fn settled_position(&self) -> Option<u64> {
        match self.position.load(Ordering::SeqCst) {
            ROLLING => None,
            p => Some(p),
        }
    }

    fn wait_for_writers(&self) {
        while self.writers.load(Ordering::SeqCst) != 0 {
            std::hint::spin_loop();
        }
    }
}
