//! Lock-free f64 cell stored as bits in an `AtomicU64`

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Replace the value, returning the previous one
    pub fn swap(&self, value: f64) -> f64 {
        f64::from_bits(self.bits.swap(value.to_bits(), Ordering::AcqRel))
    }

    pub fn add(&self, delta: f64) {
        add_bits(&self.bits, delta);
    }

    /// Raise the stored value to `candidate` if it is larger. NaN never wins.
    pub fn fetch_max(&self, candidate: f64) {
        max_bits(&self.bits, candidate);
    }
}

/// CAS-add an f64 into a bit cell
pub(crate) fn add_bits(cell: &AtomicU64, delta: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(current) + delta).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

pub(crate) fn max_bits(cell: &AtomicU64, candidate: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        // `!(a > b)` rather than `a <= b` so a NaN candidate is rejected
        if !(candidate > f64::from_bits(current)) {
            return;
        }
        match cell.compare_exchange_weak(
            current,
            candidate.to_bits(),
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_and_swap() {
        let cell = AtomicF64::new(1.5);
        cell.add(2.0);

        assert_eq!(cell.swap(0.0), 3.5);
        assert_eq!(cell.load(), 0.0);
    }

    #[test]
    fn test_fetch_max_ignores_smaller_and_nan() {
        let cell = AtomicF64::default();
        cell.fetch_max(10.0);
        cell.fetch_max(3.0);
        cell.fetch_max(f64::NAN);

        assert_eq!(cell.load(), 10.0);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let cell = Arc::new(AtomicF64::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.add(1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cell.load(), 8000.0);
    }
}
