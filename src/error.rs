//! Error types for callpipe
//!
//! Each layer has its own thiserror enum; `CallpipeError` covers everything
//! outside the analysis core (config, prompt loading, transcripts, storage).

use std::time::Duration;

use thiserror::Error;

use crate::domain::{BatchResult, RecordFailure};

/// Failure of the external analysis transport after its own retries.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },
}

impl TransportError {
    /// Whether the transport layer may retry the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::RateLimited { .. } => true,
            TransportError::Api { status, .. } => *status >= 500,
            TransportError::Network(_) => true,
            TransportError::Timeout(_) => true,
            TransportError::InvalidResponse(_) => false,
            TransportError::MissingApiKey { .. } => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::InvalidResponse(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Terminal failure of the retry-until-valid loop for one record.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No valid JSON after {attempts} attempt(s)")]
    ValidationExhausted { attempts: u32, last_output: String },
}

/// The analysis payload could not be turned into an artifact.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Analysis payload is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single record ended in the failed state.
#[derive(Debug, Error)]
pub enum RecordFailureCause {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("Worker panicked: {0}")]
    Panicked(String),

    #[error("Cancelled ({})", cancel_label(.attempted))]
    Cancelled { attempted: bool },
}

fn cancel_label(attempted: &bool) -> &'static str {
    if *attempted { "in flight" } else { "never attempted" }
}

impl RecordFailureCause {
    /// Whether the record reached the external service at all.
    pub fn was_attempted(&self) -> bool {
        !matches!(self, RecordFailureCause::Cancelled { attempted: false })
    }
}

/// Aggregate failure of a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// One or more records failed. `partial` holds every failure cause and
    /// every artifact that was still produced.
    #[error("Batch failed: {} of {} record(s) failed", .partial.failures.len(), .partial.total())]
    BatchFailed { partial: BatchResult },
}

impl BatchError {
    pub fn failures(&self) -> &[RecordFailure] {
        match self {
            BatchError::BatchFailed { partial } => &partial.failures,
        }
    }

    pub fn partial(&self) -> &BatchResult {
        match self {
            BatchError::BatchFailed { partial } => partial,
        }
    }

    pub fn into_partial(self) -> BatchResult {
        match self {
            BatchError::BatchFailed { partial } => partial,
        }
    }
}

/// Errors outside the analysis core
#[derive(Debug, Error)]
pub enum CallpipeError {
    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Prompt template could not be loaded
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Transcription document is malformed
    #[error("Transcript error: {0}")]
    Transcript(String),

    /// Artifact persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for callpipe operations
pub type Result<T> = std::result::Result<T, CallpipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_is_retryable() {
        assert!(
            TransportError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .is_retryable()
        );
        assert!(
            TransportError::Api {
                status: 503,
                message: "unavailable".to_string()
            }
            .is_retryable()
        );
        assert!(
            !TransportError::Api {
                status: 401,
                message: "unauthorized".to_string()
            }
            .is_retryable()
        );
        assert!(TransportError::Timeout(Duration::from_secs(120)).is_retryable());
        assert!(!TransportError::InvalidResponse("bad".to_string()).is_retryable());
        assert!(
            !TransportError::MissingApiKey {
                env_var: "OPENAI_API_KEY".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_validation_exhausted_message() {
        let err = AnalysisError::ValidationExhausted {
            attempts: 3,
            last_output: "not json".to_string(),
        };
        assert_eq!(err.to_string(), "No valid JSON after 3 attempt(s)");
    }

    #[test]
    fn test_transport_wraps_into_analysis_error() {
        let err: AnalysisError = TransportError::Network("connection reset".to_string()).into();
        assert!(matches!(err, AnalysisError::Transport(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_cancelled_cause_display() {
        let never = RecordFailureCause::Cancelled { attempted: false };
        let in_flight = RecordFailureCause::Cancelled { attempted: true };
        assert_eq!(never.to_string(), "Cancelled (never attempted)");
        assert_eq!(in_flight.to_string(), "Cancelled (in flight)");
        assert!(!never.was_attempted());
        assert!(in_flight.was_attempted());
    }

    #[test]
    fn test_record_cause_is_transparent() {
        let cause: RecordFailureCause = AnalysisError::ValidationExhausted {
            attempts: 2,
            last_output: String::new(),
        }
        .into();
        assert_eq!(cause.to_string(), "No valid JSON after 2 attempt(s)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CallpipeError = io_err.into();
        assert!(matches!(err, CallpipeError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: CallpipeError = json_err.into();
        assert!(matches!(err, CallpipeError::Json(_)));
    }

    #[test]
    fn test_config_error() {
        let err = CallpipeError::Config("batch.max-workers must be > 0".to_string());
        assert_eq!(err.to_string(), "Config error: batch.max-workers must be > 0");
    }
}
