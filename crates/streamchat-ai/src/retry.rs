use std::time::Duration;

use reqwest::Response;
use serde::{Deserialize, Serialize};

use crate::error::AiError;

// Truncate error bodies so large or sensitive responses are not surfaced verbatim.
const MAX_ERROR_BODY: usize = 512;

/// Retry policy for requests that fail before the response stream starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 250,
            max_delay_ms: 4_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after_secs {
            return Duration::from_millis(seconds.saturating_mul(1_000).min(self.max_delay_ms));
        }

        let multiplier = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let delay = (self.initial_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

pub fn parse_retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// Convert a non-2xx response into [`AiError::Http`].
pub async fn response_to_error(response: Response) -> AiError {
    let status = response.status();
    let retry_after = parse_retry_after(&response);
    let body = response.text().await.unwrap_or_default();

    AiError::Http {
        status: status.as_u16(),
        message: error_message_from_body(status.as_u16(), &body),
        retry_after_secs: retry_after,
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Message from the body's `error` field when present, else a generic
/// status-code message.
pub(crate) fn error_message_from_body(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error.trim().is_empty() => truncate(parsed.error.trim()),
        _ => format!("Request failed with status {status}"),
    }
}

fn truncate(message: &str) -> String {
    if message.len() <= MAX_ERROR_BODY {
        return message.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &message[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_progression() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2, None), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(4, None), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(5, None), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(6, None), Duration::from_millis(4000));
    }

    #[test]
    fn test_retry_after_is_capped_by_max_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, Some(2)), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1, Some(60)), Duration::from_millis(4000));
    }

    #[test]
    fn test_huge_retry_after_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, Some(u64::MAX)), Duration::from_millis(4000));
        assert_eq!(
            policy.delay_for(1, Some(u64::MAX / 10)),
            Duration::from_millis(4000)
        );
    }

    #[test]
    fn test_error_field_is_preferred() {
        assert_eq!(
            error_message_from_body(400, r#"{"error":"user_input is required"}"#),
            "user_input is required"
        );
    }

    #[test]
    fn test_generic_message_without_error_field() {
        assert_eq!(
            error_message_from_body(502, "<html>Bad Gateway</html>"),
            "Request failed with status 502"
        );
        assert_eq!(
            error_message_from_body(500, r#"{"error":"  "}"#),
            "Request failed with status 500"
        );
    }

    #[test]
    fn test_long_error_is_truncated() {
        let body = serde_json::json!({ "error": "é".repeat(400) }).to_string();
        let message = error_message_from_body(500, &body);
        assert!(message.ends_with("... [truncated]"));
        assert!(message.len() < 600);
    }
}
