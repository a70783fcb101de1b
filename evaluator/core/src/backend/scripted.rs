//! Scripted Backend
//!
//! Deterministic in-memory backend for tests and offline runs. Replies are
//! looked up per dimension, then per backend, then from a default reply.
//! Every call is recorded so tests can verify what was dispatched.
//!
//! # Usage
//!
//! ```ignore
//! let backend = ScriptedBackend::new()
//!     .with_reply("seo", ScriptedReply::scored(64.0, 80.0).with_cost(0.03))
//!     .with_failure("market-research", BackendError::Timeout { backend: "gpt-4o".into() });
//!
//! // After the evaluation, verify which dimensions were dispatched
//! assert_eq!(backend.call_count(), 2);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{BackendError, BackendReply, ScoreCall, ScoringBackend};

/// Canned reply for the scripted backend
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptedReply {
    /// Reply text handed to the parser
    pub text: String,
    /// Cost reported for the call
    pub cost: f64,
    /// Simulated call duration
    pub latency: Duration,
}

impl ScriptedReply {
    /// Reply with arbitrary text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cost: 0.0,
            latency: Duration::ZERO,
        }
    }

    /// Well-formed JSON reply
    #[must_use]
    pub fn scored(score: f64, confidence: f64) -> Self {
        Self::text(
            serde_json::json!({
                "score": score,
                "confidence": confidence,
                "reasoning": "scripted reply",
            })
            .to_string(),
        )
    }

    /// Set the reported cost
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Set the simulated latency
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for ScriptedReply {
    fn default() -> Self {
        Self::scored(80.0, 85.0).with_cost(0.005)
    }
}

/// Captured call for test verification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub request_id: String,
    pub backend_id: String,
    pub dimension: String,
}

#[derive(Debug)]
struct TransientFailure {
    remaining: u32,
    error: BackendError,
}

/// Deterministic scoring backend
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    default_reply: ScriptedReply,
    by_dimension: HashMap<String, ScriptedReply>,
    by_backend: HashMap<String, ScriptedReply>,
    failures: HashMap<String, BackendError>,
    transient: Mutex<HashMap<String, TransientFailure>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    /// Create a backend answering every call with the default reply
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default reply
    #[must_use]
    pub fn with_default_reply(mut self, reply: ScriptedReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Reply used for one dimension
    #[must_use]
    pub fn with_reply(mut self, dimension: impl Into<String>, reply: ScriptedReply) -> Self {
        self.by_dimension.insert(dimension.into(), reply);
        self
    }

    /// Reply used for one backend id (dimension replies take precedence)
    #[must_use]
    pub fn with_backend_reply(mut self, backend_id: impl Into<String>, reply: ScriptedReply) -> Self {
        self.by_backend.insert(backend_id.into(), reply);
        self
    }

    /// Fail every call for a dimension
    #[must_use]
    pub fn with_failure(mut self, dimension: impl Into<String>, error: BackendError) -> Self {
        self.failures.insert(dimension.into(), error);
        self
    }

    /// Fail the first `times` calls for a dimension, then reply normally
    #[must_use]
    pub fn with_transient_failures(
        self,
        dimension: impl Into<String>,
        times: u32,
        error: BackendError,
    ) -> Self {
        self.transient.lock().insert(
            dimension.into(),
            TransientFailure {
                remaining: times,
                error,
            },
        );
        self
    }

    /// All calls received so far, in arrival order
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of calls received so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Dimensions dispatched so far, in arrival order
    #[must_use]
    pub fn dispatched_dimensions(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.dimension.clone()).collect()
    }

    fn reply_for(&self, call: &ScoreCall<'_>) -> &ScriptedReply {
        self.by_dimension
            .get(call.dimension)
            .or_else(|| self.by_backend.get(call.backend_id))
            .unwrap_or(&self.default_reply)
    }

    fn take_transient(&self, dimension: &str) -> Option<BackendError> {
        let mut transient = self.transient.lock();
        let failure = transient.get_mut(dimension)?;
        if failure.remaining == 0 {
            return None;
        }
        failure.remaining -= 1;
        Some(failure.error.clone())
    }
}

#[async_trait]
impl ScoringBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    async fn score(&self, call: &ScoreCall<'_>) -> Result<BackendReply, BackendError> {
        self.calls.lock().push(RecordedCall {
            request_id: call.request_id.to_string(),
            backend_id: call.backend_id.to_string(),
            dimension: call.dimension.to_string(),
        });

        if let Some(error) = self.failures.get(call.dimension) {
            return Err(error.clone());
        }
        if let Some(error) = self.take_transient(call.dimension) {
            return Err(error);
        }

        let reply = self.reply_for(call).clone();
        if !reply.latency.is_zero() {
            tokio::time::sleep(reply.latency).await;
        }

        Ok(BackendReply {
            text: reply.text,
            cost: reply.cost,
            latency_ms: u64::try_from(reply.latency.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Tier;

    fn call<'a>(dimension: &'a str, backend_id: &'a str, content: &'a serde_json::Value) -> ScoreCall<'a> {
        ScoreCall {
            request_id: "r1",
            backend_id,
            dimension,
            content,
            tier: Tier::Standard,
        }
    }

    #[tokio::test]
    async fn test_reply_precedence() {
        let content = serde_json::json!("text");
        let backend = ScriptedBackend::new()
            .with_reply("seo", ScriptedReply::text("dimension").with_cost(0.1))
            .with_backend_reply("gpt-4o", ScriptedReply::text("backend"));

        let by_dim = backend.score(&call("seo", "gpt-4o", &content)).await.unwrap();
        assert_eq!(by_dim.text, "dimension");
        assert_eq!(by_dim.cost, 0.1);

        let by_backend = backend.score(&call("other", "gpt-4o", &content)).await.unwrap();
        assert_eq!(by_backend.text, "backend");

        let default = backend.score(&call("other", "claude-3-haiku", &content)).await.unwrap();
        assert_eq!(default, BackendReply {
            text: ScriptedReply::default().text,
            cost: 0.005,
            latency_ms: 0,
        });

        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.calls()[0].backend_id, "gpt-4o");
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let content = serde_json::json!("text");
        let backend = ScriptedBackend::new().with_transient_failures(
            "seo",
            2,
            BackendError::Timeout {
                backend: "b".to_string(),
            },
        );

        assert!(backend.score(&call("seo", "b", &content)).await.is_err());
        assert!(backend.score(&call("seo", "b", &content)).await.is_err());
        assert!(backend.score(&call("seo", "b", &content)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_latency() {
        let content = serde_json::json!("text");
        let backend = ScriptedBackend::new()
            .with_default_reply(ScriptedReply::scored(70.0, 70.0).with_latency(Duration::from_secs(2)));

        let start = tokio::time::Instant::now();
        let reply = backend.score(&call("seo", "b", &content)).await.unwrap();
        assert_eq!(reply.latency_ms, 2_000);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
