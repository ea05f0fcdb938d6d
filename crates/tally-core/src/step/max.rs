//! Decaying maximum
//!
//! Keeps the largest sample of the live step and of the step before it, so a
//! spike stays visible for at least one full step after it was recorded and
//! disappears once two boundaries have passed without a larger sample.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_common::Clock;

use super::atomic::max_bits;
use super::window::StepWindow;

/// Max over the live step and the last completed step
#[derive(Debug)]
pub struct TimeWindowMax {
    window: StepWindow,
    current: AtomicU64,
    previous: AtomicU64,
}

impl TimeWindowMax {
    pub fn new(clock: Arc<dyn Clock>, step: Duration) -> Self {
        Self {
            window: StepWindow::new(clock, step),
            current: AtomicU64::new(0f64.to_bits()),
            previous: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Offer a sample. NaN and negative samples never raise the max.
    pub fn record(&self, sample: f64) {
        if let Some(_guard) = self.window.enter(|adjacent| self.rotate(adjacent)) {
            max_bits(&self.current, sample);
        }
    }

    pub fn poll(&self) -> f64 {
        self.window.roll(|adjacent| self.rotate(adjacent));
        let current = f64::from_bits(self.current.load(Ordering::Acquire));
        let previous = f64::from_bits(self.previous.load(Ordering::Acquire));
        current.max(previous)
    }

    fn rotate(&self, adjacent: bool) {
        let zero = 0f64.to_bits();
        let last = self.current.swap(zero, Ordering::AcqRel);
        let carried = if adjacent { last } else { zero };
        self.previous.store(carried, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::MockClock;

    const STEP: Duration = Duration::from_secs(60);

    #[test]
    fn test_spike_decays_after_two_steps() {
        let clock = Arc::new(MockClock::new());
        let max = TimeWindowMax::new(clock.clone(), STEP);

        max.record(100.0);
        max.record(20.0);
        assert_eq!(max.poll(), 100.0);

        clock.add(STEP);
        max.record(5.0);
        assert_eq!(max.poll(), 100.0);

        clock.add(STEP);
        assert_eq!(max.poll(), 5.0);

        clock.add(STEP);
        assert_eq!(max.poll(), 0.0);
    }

    #[test]
    fn test_idle_gap_clears_both_slots() {
        let clock = Arc::new(MockClock::new());
        let max = TimeWindowMax::new(clock.clone(), STEP);

        max.record(42.0);
        clock.add(STEP * 3);

        assert_eq!(max.poll(), 0.0);
    }

    #[test]
    fn test_nan_is_ignored() {
        let clock = Arc::new(MockClock::new());
        let max = TimeWindowMax::new(clock, STEP);

        max.record(f64::NAN);
        max.record(1.5);
        max.record(f64::NAN);

        assert_eq!(max.poll(), 1.5);
    }
}
