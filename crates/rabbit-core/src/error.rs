//! ============================================================================
//! Error Taxonomy - Failures surfaced by the completion pipeline
//! ============================================================================
//! Configuration problems are caught before any network call. Transient HTTP
//! and transport failures are retried inside the client; only the final
//! outcome reaches callers. The progression engine has no error type.
//! ============================================================================

use thiserror::Error;

/// Placeholder returned when a successful response carries no message content
pub const EMPTY_COMPLETION: &str = "No response generated";

#[derive(Debug, Error)]
pub enum RabbitError {
    /// Missing or invalid credentials/parameters. Fix by editing settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Non-success HTTP status after retries were exhausted
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Network-level failure after retries were exhausted
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller aborted the request
    #[error("Request was cancelled")]
    Cancelled,

    /// Model output did not match the interactive task shape
    #[error("Invalid task structure: {0}")]
    InvalidTaskStructure(String),

    /// 2xx response whose body could not be decoded
    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RabbitError {
    /// Cancellation is user-initiated and should not surface error UI
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RabbitError::Cancelled)
    }

    /// Whether the user can fix this by editing settings
    pub fn is_configuration(&self) -> bool {
        matches!(self, RabbitError::Configuration(_))
    }
}

/// 429 and every 5xx are worth another attempt
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub type Result<T> = std::result::Result<T, RabbitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(599));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn test_api_error_display() {
        let err = RabbitError::Api {
            status: 401,
            body: "invalid key".to_string(),
        };
        assert_eq!(err.to_string(), "API error (401): invalid key");
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_is_distinct() {
        assert!(RabbitError::Cancelled.is_cancelled());
        assert!(!RabbitError::Transport("reset".into()).is_cancelled());
        assert!(RabbitError::Configuration("no key".into()).is_configuration());
    }
}
