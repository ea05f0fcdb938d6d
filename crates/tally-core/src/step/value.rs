//! Step-windowed accumulation
//!
//! A [`StepValue`] accumulates into a live window and, once the wall clock
//! crosses a step boundary, moves the live total into `previous` where it
//! stays readable for the whole following step.
//!
//! Rollover is a single-slot swap done by exactly one thread through
//! `StepWindow`: it waits out writers already inside the live window,
//! drains the live accumulator into `previous` and then publishes the new
//! position. Every recorded value is drained exactly once, so a value racing
//! a rollover is counted in exactly one of the two windows.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_common::Clock;

use super::atomic::add_bits;
use super::window::StepWindow;

/// Numeric type a [`StepValue`] can accumulate
pub trait StepNumber: Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + 'static {
    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;
    fn accumulate(cell: &AtomicU64, value: Self);
}

impl StepNumber for u64 {
    fn to_bits(self) -> u64 {
        self
    }

    fn from_bits(bits: u64) -> Self {
        bits
    }

    fn accumulate(cell: &AtomicU64, value: Self) {
        cell.fetch_add(value, Ordering::AcqRel);
    }
}

impl StepNumber for f64 {
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }

    fn accumulate(cell: &AtomicU64, value: Self) {
        add_bits(cell, value);
    }
}

/// Step-windowed sum of f64 values
pub type StepDouble = StepValue<f64>;

/// Step-windowed sum of u64 values
pub type StepLong = StepValue<u64>;

/// Live accumulator plus the frozen total of the last completed step
#[derive(Debug)]
pub struct StepValue<N: StepNumber> {
    window: StepWindow,
    current: AtomicU64,
    previous: AtomicU64,
    _number: PhantomData<N>,
}

impl<N: StepNumber> StepValue<N> {
    pub fn new(clock: Arc<dyn Clock>, step: Duration) -> Self {
        Self {
            window: StepWindow::new(clock, step),
            current: AtomicU64::new(N::default().to_bits()),
            previous: AtomicU64::new(N::default().to_bits()),
            _number: PhantomData,
        }
    }

    /// Add a value to the live window, rolling first if a boundary passed.
    /// Returns `false` when the value was ignored because the value is closed.
    pub fn record(&self, value: N) -> bool {
        match self.window.enter(|adjacent| self.drain(adjacent)) {
            Some(_guard) => {
                N::accumulate(&self.current, value);
                true
            }
            None => false,
        }
    }

    /// Total of the last completed step
    pub fn poll(&self) -> N {
        self.window.roll(|adjacent| self.drain(adjacent));
        N::from_bits(self.previous.load(Ordering::Acquire))
    }

    /// Add to the live window without consulting the clock. Pairs with
    /// [`poll_and_reset`](Self::poll_and_reset) for callers that drive
    /// windowing themselves.
    pub fn accumulate(&self, value: N) {
        N::accumulate(&self.current, value);
    }

    /// Read and reset the live window in one operation, without consulting
    /// the clock. For callers that drive windowing themselves; do not mix
    /// with [`poll`](Self::poll) on the same value.
    pub fn poll_and_reset(&self) -> N {
        N::from_bits(self.current.swap(N::default().to_bits(), Ordering::AcqRel))
    }

    /// Move the partial live window into `previous` and stop rolling.
    /// Records still in flight land before the flush; later ones are ignored
    /// and `poll` keeps returning the flushed total.
    pub fn closing_rollover(&self) {
        self.window.close(|| {
            let flushed = self.current.swap(N::default().to_bits(), Ordering::AcqRel);
            self.previous.store(flushed, Ordering::Release);
        });
    }

    pub fn is_closed(&self) -> bool {
        self.window.is_closed()
    }

    fn drain(&self, adjacent: bool) {
        let drained = self.current.swap(N::default().to_bits(), Ordering::AcqRel);
        // More than one boundary passed: the completed step saw no writes.
        let completed = if adjacent {
            drained
        } else {
            N::default().to_bits()
        };
        self.previous.store(completed, Ordering::Release);
    }
}
