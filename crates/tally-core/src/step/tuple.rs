//! Count and total rolled over as one unit
//!
//! Timers and summaries report a count together with a total. Keeping them in
//! two independent [`StepValue`](super::StepValue)s lets a record that races a
//! boundary put its count in one step and its amount in the next. A
//! [`StepTuple`] shares one window between both fields, so a record and a
//! rollover never interleave and a polled pair always belongs to one step.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_common::Clock;

use super::atomic::add_bits;
use super::window::StepWindow;

#[derive(Debug)]
pub struct StepTuple {
    window: StepWindow,
    current_count: AtomicU64,
    current_total: AtomicU64,
    previous_count: AtomicU64,
    previous_total: AtomicU64,
}

impl StepTuple {
    pub fn new(clock: Arc<dyn Clock>, step: Duration) -> Self {
        Self {
            window: StepWindow::new(clock, step),
            current_count: AtomicU64::new(0),
            current_total: AtomicU64::new(0f64.to_bits()),
            previous_count: AtomicU64::new(0),
            previous_total: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Add to both fields of the live window. Returns `false` once closed.
    pub fn record(&self, count: u64, total: f64) -> bool {
        match self.window.enter(|adjacent| self.drain(adjacent)) {
            Some(_guard) => {
                self.current_count.fetch_add(count, Ordering::AcqRel);
                add_bits(&self.current_total, total);
                true
            }
            None => false,
        }
    }

    /// `(count, total)` of the last completed step
    pub fn poll(&self) -> (u64, f64) {
        loop {
            self.window.roll(|adjacent| self.drain(adjacent));
            let Some(before) = self.window.settled_position() else {
                std::hint::spin_loop();
                continue;
            };
            let count = self.previous_count.load(Ordering::Acquire);
            let total = f64::from_bits(self.previous_total.load(Ordering::Acquire));
            // a roll in between may have replaced one field but not the other
            if self.window.settled_position() == Some(before) {
                return (count, total);
            }
        }
    }

    /// Flush the partial live window into the polled slot and stop rolling
    pub fn closing_rollover(&self) {
        self.window.close(|| self.drain(true));
    }

    pub fn is_closed(&self) -> bool {
        self.window.is_closed()
    }

    fn drain(&self, adjacent: bool) {
        let count = self.current_count.swap(0, Ordering::AcqRel);
        let total = self.current_total.swap(0f64.to_bits(), Ordering::AcqRel);
        let (count, total) = if adjacent {
            (count, total)
        } else {
            (0, 0f64.to_bits())
        };
        self.previous_count.store(count, Ordering::Release);
        self.previous_total.store(total, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use tally_common::MockClock;

    const STEP: Duration = Duration::from_secs(60);

    /// Jumps one step forward on the n-th wall clock read
    #[derive(Debug)]
    struct JumpingClock {
        inner: MockClock,
        reads: AtomicUsize,
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
    fn test_record_is_never_split_across_steps() {
        // a boundary passing at any clock read keeps count and total together
        for jump_at in 1..6 {
            let clock = Arc::new(JumpingClock {
                inner: MockClock::new(),
                reads: AtomicUsize::new(0),
                jump_at,
            });
            let tuple = StepTuple::new(clock.clone(), STEP);

            tuple.record(1, 100.0);
            for _ in 0..3 {
                let (count, total) = tuple.poll();
                assert_eq!(count as f64 * 100.0, total, "jump at read {}", jump_at);
                clock.inner.add(STEP);
            }
        }
    }

    #[test]
    fn test_idle_gap_resets_both_fields() {
        let clock = Arc::new(MockClock::new());
        let tuple = StepTuple::new(clock.clone(), STEP);

        tuple.record(3, 30.0);
        clock.add(STEP * 4);

        assert_eq!(tuple.poll(), (0, 0.0));
    }

    #[test]
    fn test_closing_rollover_flushes_pair() {
        let clock = Arc::new(MockClock::new());
        let tuple = StepTuple::new(clock.clone(), STEP);

        tuple.record(2, 5.0);
        tuple.closing_rollover();

        assert_eq!(tuple.poll(), (2, 5.0));
        assert!(!tuple.record(1, 1.0));
        clock.add(STEP);
        assert_eq!(tuple.poll(), (2, 5.0));
    }

    #[test]
    fn test_concurrent_records_keep_pairs_consistent() {
        let clock = Arc::new(MockClock::new());
        let tuple = Arc::new(StepTuple::new(clock.clone(), STEP));

        let writers: Vec<_> = (0..8)
            .map(|_| {
                let tuple = tuple.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        tuple.record(1, 2.0);
                    }
                })
            })
            .collect();

        clock.add(STEP);
        let (count, total) = tuple.poll();
        assert_eq!(total, count as f64 * 2.0);

        for w in writers {
            w.join().unwrap();
        }
        clock.add(STEP);
        let (next_count, next_total) = tuple.poll();

        assert_eq!(count + next_count, 80_000);
        assert_eq!(next_total, next_count as f64 * 2.0);
    }
}
