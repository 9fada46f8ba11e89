use std::time::Duration;

/// Errors raised while configuring hardware, acquiring traces or persisting a sweep
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// Transport could not be opened, or a write/read on it failed
    #[error("Connection error on {port}: {detail}")]
    Connection { port: String, detail: String },

    /// Device answered with something unexpected, or not at all
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Raw trace buffer violates the four-quarter interleaved layout
    #[error("Malformed trace: {0}")]
    MalformedTrace(String),

    /// Analyzer did not signal sweep completion in time
    #[error("Acquisition did not complete within {waited:?}")]
    AcquisitionTimeout { waited: Duration },

    /// Rejected before any hardware action
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Requested current beyond the supply safety bound; nothing was sent
    #[error("Requested current {requested:+} A exceeds the {limit} A limit")]
    CurrentLimitExceeded { requested: f64, limit: f64 },

    /// Sweep state machine was asked to make a move its transition table forbids
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SweepError {
    pub fn connection(port: impl Into<String>, detail: impl ToString) -> Self {
        Self::Connection {
            port: port.into(),
            detail: detail.to_string(),
        }
    }

    /// Whether the sweep must abort; only a rejected over-limit current lets it go on
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CurrentLimitExceeded { .. })
    }

    /// Persistence failures (file system, serialization)
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Csv(_) | Self::Json(_) | Self::Toml(_))
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
