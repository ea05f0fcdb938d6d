//! Time units used when exporting timer values

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base time unit a backend expects timer values in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl TimeUnit {
    /// Nanoseconds in one unit
    pub fn nanos_per_unit(self) -> f64 {
        match self {
            TimeUnit::Nanoseconds => 1.0,
            TimeUnit::Microseconds => 1_000.0,
            TimeUnit::Milliseconds => 1_000_000.0,
            TimeUnit::Seconds => 1_000_000_000.0,
        }
    }

    /// Convert a nanosecond amount into this unit
    pub fn from_nanos(self, nanos: f64) -> f64 {
        nanos / self.nanos_per_unit()
    }

    pub fn from_duration(self, duration: Duration) -> f64 {
        self.from_nanos(duration.as_nanos() as f64)
    }

    /// Unit name as exporters spell it
    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
