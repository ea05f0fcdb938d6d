//! Clocks
//!
//! Step boundaries are derived from wall time; durations (timers, long task
//! timers) from monotonic time. [`MockClock`] lets tests move both by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time source for meters and registries
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall time in Unix milliseconds
    fn wall_time_ms(&self) -> u64;

    /// Monotonic nanoseconds from an arbitrary origin
    fn monotonic_nanos(&self) -> u64;
}

/// Clock backed by the operating system
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_time_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn monotonic_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Manually advanced clock for tests
#[derive(Debug)]
pub struct MockClock {
    wall_ms: AtomicU64,
    monotonic_ns: AtomicU64,
}

impl MockClock {
    /// Starts at 1ms wall time, i.e. inside the first step of any step size
    pub fn new() -> Self {
        Self::at(1)
    }

    /// Start at a given wall time
    pub fn at(wall_ms: u64) -> Self {
        Self {
            wall_ms: AtomicU64::new(wall_ms),
            monotonic_ns: AtomicU64::new(1),
        }
    }

    /// Advance wall and monotonic time together
    pub fn add(&self, duration: Duration) {
        self.wall_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        self.monotonic_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn add_millis(&self, millis: u64) {
        self.add(Duration::from_millis(millis));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn wall_time_ms(&self) -> u64 {
        self.wall_ms.load(Ordering::SeqCst)
    }

    fn monotonic_nanos(&self) -> u64 {
        self.monotonic_ns.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advances_both_timelines() {
        let clock = MockClock::new();
        clock.add(Duration::from_secs(2));

        assert_eq!(clock.wall_time_ms(), 2001);
        assert_eq!(clock.monotonic_nanos(), 2_000_000_001);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic_nanos();
        let b = clock.monotonic_nanos();

        assert!(b >= a);
        assert!(clock.wall_time_ms() > 0);
    }
}
