//! Error types for orchat-api

use thiserror::Error;

/// Result type alias using orchat-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to OpenRouter
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication failed (401)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// No API key available
    #[error("missing API key: set OPENROUTER_API_KEY or pass a key explicitly")]
    MissingApiKey,

    /// Rate limit exceeded (429)
    #[error("rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Server-side failure (5xx)
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other API error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Server-sent events framing error
    #[error("SSE error: {0}")]
    Sse(String),
}

impl Error {
    /// Classify a non-success HTTP status plus response body
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Error::Auth(extract_message(&body)),
            429 => Error::RateLimited { retry_after: None },
            s if s >= 500 => Error::Server {
                status: s,
                message: extract_message(&body),
            },
            s => Error::Api {
                status: s,
                message: extract_message(&body),
            },
        }
    }

    /// Check if this error is worth retrying at the transport layer
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::RateLimited { .. } | Error::Server { .. } | Error::Sse(_)
        )
    }
}

/// Pull a human-readable message out of an OpenRouter error body.
/// Bodies look like `{"error": {"message": "...", "code": ...}}`; anything
/// else is passed through verbatim.
fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_auth() {
        assert!(matches!(Error::from_status(401, "nope"), Error::Auth(_)));
        assert!(matches!(Error::from_status(403, "nope"), Error::Auth(_)));
    }

    #[test]
    fn test_from_status_rate_limited() {
        assert!(matches!(
            Error::from_status(429, ""),
            Error::RateLimited { .. }
        ));
    }

    #[test]
    fn test_from_status_server() {
        match Error::from_status(503, "overloaded") {
            Error::Server { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[test]
    fn test_from_status_other() {
        assert!(matches!(Error::from_status(400, "bad"), Error::Api { .. }));
    }

    #[test]
    fn test_extract_message_from_error_body() {
        let body = r#"{"error": {"message": "model not found", "code": 404}}"#;
        match Error::from_status(404, body) {
            Error::Api { message, .. } => assert_eq!(message, "model not found"),
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_message_passthrough() {
        match Error::from_status(404, "plain text") {
            Error::Api { message, .. } => assert_eq!(message, "plain text"),
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
        assert!(
            Error::Server {
                status: 500,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(Error::Sse("reset".into()).is_retryable());
        assert!(!Error::Auth("bad key".into()).is_retryable());
        assert!(!Error::MissingApiKey.is_retryable());
    }
}
