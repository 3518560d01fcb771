//! Error types for the chat client

use thiserror::Error;

/// Chat client error types
#[derive(Error, Debug)]
pub enum AiError {
    /// Transport-level failure before or during the response stream.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the chat API.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// The request was cancelled by the caller.
    #[error("Request cancelled")]
    Aborted,

    /// A single stream line could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An operation was called in a state that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl AiError {
    /// Whether a fresh attempt of the same request may succeed.
    ///
    /// Only pre-stream failures are ever retried; callers never retry once
    /// the first byte has been consumed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Network(_) => true,
            AiError::Http { status, .. } => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    /// Server-provided retry delay, when one was sent.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AiError::Http {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, AiError::Aborted)
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Network(err.to_string())
    }
}

/// Result type alias for chat client operations
pub type Result<T> = std::result::Result<T, AiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> AiError {
        AiError::Http {
            status,
            message: "x".to_string(),
            retry_after_secs: None,
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AiError::Network("connection refused".to_string()).is_retryable());
        assert!(http(429).is_retryable());
        assert!(http(503).is_retryable());
        assert!(!http(400).is_retryable());
        assert!(!http(401).is_retryable());
        assert!(!AiError::Aborted.is_retryable());
        assert!(!AiError::Parse("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_http_display_uses_message() {
        let err = AiError::Http {
            status: 500,
            message: "model overloaded".to_string(),
            retry_after_secs: Some(3),
        };
        assert_eq!(err.to_string(), "HTTP 500: model overloaded");
        assert_eq!(err.retry_after(), Some(3));
    }
}
