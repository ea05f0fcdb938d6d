//! Push registry configuration
//!
//! Values come from defaults overridden by prefixed environment variables
//! (`TALLY_STEP=10s`, `TALLY_ENABLED=false`, `TALLY_BATCH_SIZE=500`,
//! `TALLY_PUBLISH_ON_CLOSE=false`). A `.env` file is honoured when present.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Result, TallyError};
use crate::{DEFAULT_BATCH_SIZE, DEFAULT_STEP};

/// Configuration shared by every push registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRegistryConfig {
    /// Step size, i.e. the reporting frequency
    pub step: Duration,
    /// `false` disables scheduled publishing entirely
    pub enabled: bool,
    /// Upper bound on records per transport call
    pub batch_size: usize,
    /// Publish once more when the registry is closed
    pub publish_on_close: bool,
}

impl Default for PushRegistryConfig {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            enabled: true,
            batch_size: DEFAULT_BATCH_SIZE,
            publish_on_close: true,
        }
    }
}

/// Raw, unvalidated values as they come out of the config sources
#[derive(Debug, Default, Deserialize)]
struct RawPushConfig {
    step: Option<String>,
    enabled: Option<bool>,
    batch_size: Option<i64>,
    publish_on_close: Option<bool>,
}

impl PushRegistryConfig {
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_publish_on_close(mut self, publish_on_close: bool) -> Self {
        self.publish_on_close = publish_on_close;
        self
    }

    /// Load configuration from the process environment
    pub fn load(prefix: &str) -> Result<Self> {
        // Try to load .env file
        if let Err(e) = dotenvy::dotenv() {
            trace!(error = %e, "No .env file loaded");
        }

        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix).try_parsing(true))
            .build()?;
        Self::from_raw(settings.try_deserialize()?)
    }

    /// Load configuration from an explicit variable map instead of the
    /// process environment
    pub fn load_from(prefix: &str, vars: HashMap<String, String>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(prefix)
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .build()?;
        Self::from_raw(settings.try_deserialize()?)
    }

    fn from_raw(raw: RawPushConfig) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(step) = raw.step {
            cfg.step = parse_duration(&step)?;
        }
        if let Some(enabled) = raw.enabled {
            cfg.enabled = enabled;
        }
        if let Some(batch_size) = raw.batch_size {
            if batch_size <= 0 {
                return Err(TallyError::InvalidConfiguration(format!(
                    "batch_size must be positive, got {}",
                    batch_size
                )));
            }
            cfg.batch_size = batch_size as usize;
        }
        if let Some(publish_on_close) = raw.publish_on_close {
            cfg.publish_on_close = publish_on_close;
        }

        cfg.validate()?;
        debug!(
            step_ms = cfg.step_millis(),
            enabled = cfg.enabled,
            batch_size = cfg.batch_size,
            "Loaded push registry configuration"
        );
        Ok(cfg)
    }

    /// Check invariants that defaults and builders cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.step.is_zero() {
            return Err(TallyError::InvalidConfiguration(
                "step must be greater than zero".into(),
            ));
        }
        if self.step.as_millis() == 0 {
            return Err(TallyError::InvalidConfiguration(format!(
                "step must be at least 1ms, got {:?}",
                self.step
            )));
        }
        if self.batch_size == 0 {
            return Err(TallyError::InvalidConfiguration(
                "batch_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Step size in whole milliseconds
    pub fn step_millis(&self) -> u64 {
        u64::try_from(self.step.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Parse a duration such as `500ms`, `10s`, `1.5m`, `2h`, `1d` or an
/// ISO-8601 `PT1M30S`. A bare number is read as milliseconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    let invalid = || TallyError::InvalidConfiguration(format!("invalid duration '{}'", input));

    if trimmed.is_empty() {
        return Err(invalid());
    }

    let upper = trimmed.to_ascii_uppercase();
    if let Some(rest) = upper.strip_prefix("PT") {
        return parse_iso_time(rest).ok_or_else(invalid);
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number.parse().map_err(|_| invalid())?;

    let millis_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "ms" => 1.0,
        "s" => 1_000.0,
        "m" => 60_000.0,
        "h" => 3_600_000.0,
        "d" => 86_400_000.0,
        _ => return Err(invalid()),
    };

    let micros = (value * millis_per_unit * 1_000.0).round();
    // u64::MAX as f64 rounds up to 2^64, so equality is already out of range
    if !micros.is_finite() || micros < 0.0 || micros >= u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_micros(micros as u64))
}

fn parse_iso_time(rest: &str) -> Option<Duration> {
    if rest.is_empty() {
        return None;
    }

    let mut total_secs = 0f64;
    let mut number = String::new();
    for c in rest.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'H' | 'M' | 'S' => {
                let value: f64 = number.parse().ok()?;
                number.clear();
                total_secs += match c {
                    'H' => value * 3_600.0,
                    'M' => value * 60.0,
                    _ => value,
                };
            }
            _ => return None,
        }
    }

    if !number.is_empty() || !total_secs.is_finite() {
        return None;
    }
    Duration::try_from_secs_f64(total_secs).ok()
}
