//! Gateway error types

use std::time::Duration;

/// Gateway error types
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    // Rejections: surfaced before any upstream call
    #[error("unauthenticated")]
    Unauthenticated,

    /// Missing, deleted, or foreign conversation. Ownership failures deliberately
    /// share this variant so they are indistinguishable from a missing id.
    #[error("conversation not found")]
    ConversationNotFound,

    #[error("invalid model configuration: {0}")]
    InvalidModelConfiguration(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("model not found upstream: {0}")]
    ModelNotFound(String),

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    #[error("empty response from model")]
    EmptyResponse,

    // Persistence
    #[error("store error: {0}")]
    Store(String),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),

    // Wrapped llm crate error
    #[error("LLM error: {0}")]
    Llm(String),
}

impl GatewayError {
    /// Whether a retry of the same upstream call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::RateLimited { .. } | GatewayError::Http(_) | GatewayError::Stream(_) => {
                true
            }
            GatewayError::Api { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }

    /// Provider-supplied backoff hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Client-side rejection: the request never reached an upstream provider.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            GatewayError::Unauthenticated
                | GatewayError::ConversationNotFound
                | GatewayError::InvalidModelConfiguration(_)
                | GatewayError::InvalidRequest(_)
        )
    }
}

impl From<llm::error::LLMError> for GatewayError {
    fn from(err: llm::error::LLMError) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("rate limit") || lower.contains("429") {
            GatewayError::RateLimited { retry_after: None }
        } else if lower.contains("authentication")
            || lower.contains("401")
            || lower.contains("invalid api key")
        {
            GatewayError::AuthenticationFailed
        } else if lower.contains("not found") || lower.contains("404") {
            GatewayError::ModelNotFound(msg)
        } else if lower.contains("timed out") || lower.contains("connection") {
            GatewayError::Http(msg)
        } else {
            GatewayError::Llm(msg)
        }
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_not_transient() {
        for err in [
            GatewayError::Unauthenticated,
            GatewayError::ConversationNotFound,
            GatewayError::InvalidModelConfiguration("gpt-x".into()),
            GatewayError::InvalidRequest("empty".into()),
        ] {
            assert!(err.is_rejection(), "{err} should be a rejection");
            assert!(!err.is_transient(), "{err} should not be transient");
        }
    }

    #[test]
    fn upstream_errors_are_not_rejections() {
        assert!(!GatewayError::AuthenticationFailed.is_rejection());
        assert!(!GatewayError::Llm("boom".into()).is_rejection());
        assert!(!GatewayError::Store("disk".into()).is_rejection());
    }

    #[test]
    fn api_status_classification() {
        let server = GatewayError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        let client = GatewayError::Api {
            status: 400,
            message: "bad".into(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let err = GatewayError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(GatewayError::Http("reset".into()).retry_after(), None);
    }
}
