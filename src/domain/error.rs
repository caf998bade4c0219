//! Domain error types.
//!
//! Recoverable classes (data source, malformed observation, venue) are
//! absorbed by the stages or the driver; configuration errors and invariant
//! violations propagate to the CLI and end the run.

use chrono::NaiveDateTime;

/// Top-level error type for cmftrader.
#[derive(Debug, thiserror::Error)]
pub enum CmfError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key {key}")]
    ConfigMissing { key: String },

    #[error("invalid config value {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("malformed observation for {symbol}: {reason}")]
    MalformedObservation { symbol: String, reason: String },

    #[error("execution venue error: {reason}")]
    Venue { reason: String },

    #[error("invariant violation at {timestamp} on {symbol}: {reason}")]
    InvariantViolation {
        timestamp: NaiveDateTime,
        symbol: String,
        reason: String,
    },

    #[error("unsupported: {reason}")]
    Unsupported { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CmfError {
    /// Errors a running simulation absorbs by skipping the tick or rejecting the fill.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CmfError::DataSource { .. }
                | CmfError::MalformedObservation { .. }
                | CmfError::Venue { .. }
        )
    }
}

impl From<&CmfError> for std::process::ExitCode {
    fn from(err: &CmfError) -> Self {
        let code: u8 = match err {
            CmfError::Io(_) | CmfError::Csv(_) => 1,
            CmfError::ConfigParse { .. }
            | CmfError::ConfigMissing { .. }
            | CmfError::ConfigInvalid { .. } => 2,
            CmfError::DataSource { .. } | CmfError::MalformedObservation { .. } => 3,
            CmfError::Venue { .. } => 4,
            CmfError::InvariantViolation { .. } => 5,
            CmfError::Unsupported { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
