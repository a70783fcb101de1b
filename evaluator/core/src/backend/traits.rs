//! Scoring Backend Traits
//!
//! Trait definitions for scoring backends. This abstraction lets the engine
//! work with different model providers (Ollama, hosted APIs, scripted test
//! doubles) without changing core logic.

use async_trait::async_trait;
use thiserror::Error;

use crate::request::Tier;

/// One dimension to score on one backend
#[derive(Clone, Copy, Debug)]
pub struct ScoreCall<'a> {
    /// Request this call belongs to
    pub request_id: &'a str,
    /// Backend chosen by the strategy
    pub backend_id: &'a str,
    /// Dimension being scored
    pub dimension: &'a str,
    /// Content under evaluation
    pub content: &'a serde_json::Value,
    /// Requested depth
    pub tier: Tier,
}

/// Raw reply from a scoring backend
#[derive(Clone, Debug, PartialEq)]
pub struct BackendReply {
    /// Reply text, parsed later by a `ResponseParser`
    pub text: String,
    /// Cost charged for the call
    pub cost: f64,
    /// Time the call took
    pub latency_ms: u64,
}

/// Errors a scoring backend can return
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The call did not complete in time
    #[error("Backend {backend} timed out")]
    Timeout { backend: String },

    /// The backend could not be reached
    #[error("Connection to backend {backend} failed: {message}")]
    Connection { backend: String, message: String },

    /// The backend answered with an error status
    #[error("Backend {backend} returned {status}: {body}")]
    Status {
        backend: String,
        status: u16,
        body: String,
    },

    /// The backend asked us to slow down
    #[error("Backend {backend} rate limited the request")]
    RateLimited { backend: String },

    /// The reply could not be read at all
    #[error("Backend {backend} sent an unreadable reply: {message}")]
    InvalidReply { backend: String, message: String },

    /// No backend with this id is configured
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),
}

impl BackendError {
    /// Whether retrying the same call may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connection { .. } | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::InvalidReply { .. } | Self::UnknownBackend(_) => false,
        }
    }

    /// Whether the call timed out
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Scoring backend trait
///
/// Implement this trait to add support for a model provider.
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Get the backend name (e.g., "Ollama", "Scripted")
    fn name(&self) -> &str;

    /// Score one dimension of the content
    async fn score(&self, call: &ScoreCall<'_>) -> Result<BackendReply, BackendError>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let backend = "b".to_string();
        assert!(BackendError::Timeout { backend: backend.clone() }.is_transient());
        assert!(BackendError::RateLimited { backend: backend.clone() }.is_transient());
        assert!(BackendError::Status {
            backend: backend.clone(),
            status: 503,
            body: String::new(),
        }
        .is_transient());
        assert!(!BackendError::Status {
            backend: backend.clone(),
            status: 400,
            body: String::new(),
        }
        .is_transient());
        assert!(!BackendError::InvalidReply {
            backend,
            message: "garbage".to_string(),
        }
        .is_transient());
        assert!(!BackendError::UnknownBackend("x".to_string()).is_transient());
    }
}
