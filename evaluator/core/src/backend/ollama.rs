//! Ollama Scoring Backend
//!
//! Scores content with models served by a local Ollama server.
//!
//! # Ollama API
//!
//! Uses the non-streaming `/api/generate` endpoint with `format = "json"`.
//! The reply's `response` field is handed to the response parser unchanged.
//!
//! # Backend Ids and Pricing
//!
//! The engine picks backend ids from the performance registry (`gpt-4o`,
//! `claude-3-haiku`, ...). Each id is mapped to a local model name; ids with
//! no mapping use the default model. Local inference has no invoice, so cost
//! is estimated from token counts at a configurable per-1k-token rate.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::traits::{BackendError, BackendReply, ScoreCall, ScoringBackend};

/// Default per-1k-token price used to estimate local call cost
pub const DEFAULT_PRICE_PER_1K_TOKENS: f64 = 0.002;

/// Ollama-backed scorer
#[derive(Clone, Debug)]
pub struct OllamaScorer {
    /// Host address
    host: String,
    /// Port number
    port: u16,
    /// Backend id -> local model name
    models: HashMap<String, String>,
    /// Model used for unmapped backend ids
    default_model: String,
    /// Estimated price per 1k tokens
    price_per_1k_tokens: f64,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OllamaScorer {
    /// Create a new scorer
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            models: HashMap::new(),
            default_model: "llama3".to_string(),
            price_per_1k_tokens: DEFAULT_PRICE_PER_1K_TOKENS,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port: u16 = std::env::var("OLLAMA_PORT")
            .unwrap_or_else(|_| "11434".to_string())
            .parse()
            .unwrap_or(11434);

        let mut scorer = Self::new(host, port);
        if let Ok(model) = std::env::var("EVALUATOR_OLLAMA_MODEL") {
            scorer.default_model = model;
        }
        if let Some(price) = std::env::var("EVALUATOR_PRICE_PER_1K_TOKENS")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            scorer.price_per_1k_tokens = price;
        }
        scorer
    }

    /// Map a backend id to a local model
    #[must_use]
    pub fn with_model(mut self, backend_id: impl Into<String>, model: impl Into<String>) -> Self {
        self.models.insert(backend_id.into(), model.into());
        self
    }

    /// Set the model used for unmapped backend ids
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the per-1k-token price
    #[must_use]
    pub fn with_price_per_1k_tokens(mut self, price: f64) -> Self {
        self.price_per_1k_tokens = price;
        self
    }

    /// Get the base URL
    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get generate endpoint URL
    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url())
    }

    /// Get tags endpoint URL
    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url())
    }

    /// Local model for a backend id
    fn model_for(&self, backend_id: &str) -> &str {
        self.models
            .get(backend_id)
            .map_or(self.default_model.as_str(), String::as_str)
    }

    /// Estimated cost of a call
    fn cost_for(&self, tokens: u64) -> f64 {
        tokens as f64 / 1000.0 * self.price_per_1k_tokens
    }

    /// Build the scoring instruction for one dimension
    fn build_prompt(call: &ScoreCall<'_>) -> String {
        let content = match call.content {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };

        format!(
            "Evaluate the content below on the dimension \"{}\" ({} review).\n\
             Reply with JSON only: {{\"score\": <0-100>, \"confidence\": <0-100>, \"reasoning\": \"<one sentence>\"}}\n\n\
             Content:\n{content}",
            call.dimension, call.tier
        )
    }

    fn map_error(&self, backend: &str, error: &reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::Timeout {
                backend: backend.to_string(),
            }
        } else if error.is_decode() {
            BackendError::InvalidReply {
                backend: backend.to_string(),
                message: error.to_string(),
            }
        } else {
            BackendError::Connection {
                backend: backend.to_string(),
                message: format!("{}: {error}", self.base_url()),
            }
        }
    }
}

impl Default for OllamaScorer {
    fn default() -> Self {
        Self::new("localhost", 11434)
    }
}

#[async_trait]
impl ScoringBackend for OllamaScorer {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn score(&self, call: &ScoreCall<'_>) -> Result<BackendReply, BackendError> {
        let start = Instant::now();
        let model = self.model_for(call.backend_id);

        let json_request = serde_json::json!({
            "model": model,
            "prompt": Self::build_prompt(call),
            "stream": false,
            "format": "json",
        });

        let response = self
            .http_client
            .post(self.generate_url())
            .json(&json_request)
            .send()
            .await
            .map_err(|e| self.map_error(call.backend_id, &e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(BackendError::RateLimited {
                backend: call.backend_id.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                backend: call.backend_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.map_error(call.backend_id, &e))?;

        let text = data
            .get("response")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
            .to_string();

        let tokens: u64 = ["prompt_eval_count", "eval_count"]
            .iter()
            .filter_map(|field| data.get(*field).and_then(serde_json::Value::as_u64))
            .sum();

        tracing::debug!(
            backend = call.backend_id,
            model,
            dimension = call.dimension,
            tokens,
            "Ollama scored dimension"
        );

        Ok(BackendReply {
            text,
            cost: self.cost_for(tokens),
            latency_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }
}
