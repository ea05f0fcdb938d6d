//! Error types for Tally
//!
//! Provides a unified error type and the export-side error variants

use thiserror::Error;

use crate::types::MeterKind;

/// Result type alias using TallyError
pub type Result<T> = std::result::Result<T, TallyError>;

/// Unified error type for Tally operations
#[derive(Debug, Error)]
pub enum TallyError {
    // Registration errors
    #[error("Meter '{name}' is already registered as {existing}, cannot register it as {requested}")]
    ConflictingMeterType {
        name: String,
        existing: MeterKind,
        requested: MeterKind,
    },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // Export errors
    #[error("Export failure: {0}")]
    Export(#[from] ExportError),

    // Scheduling errors
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

/// Errors raised while serializing or sending one publish tick
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Publish panicked: {0}")]
    Panicked(String),
}

impl From<anyhow::Error> for ExportError {
    fn from(err: anyhow::Error) -> Self {
        ExportError::Transport(format!("{:#}", err))
    }
}

impl From<config::ConfigError> for TallyError {
    fn from(err: config::ConfigError) -> Self {
        TallyError::InvalidConfiguration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_type_display() {
        let err = TallyError::ConflictingMeterType {
            name: "requests".to_string(),
            existing: MeterKind::Counter,
            requested: MeterKind::Timer,
        };
        let msg = err.to_string();
        assert!(msg.contains("requests"));
        assert!(msg.contains("counter"));
        assert!(msg.contains("timer"));
    }

    #[test]
    fn test_transport_error_from_anyhow() {
        let err: ExportError = anyhow::anyhow!("connection refused").into();
        assert!(matches!(err, ExportError::Transport(ref m) if m.contains("connection refused")));

        let err: TallyError = err.into();
        assert!(err.to_string().starts_with("Export failure"));
    }
}
