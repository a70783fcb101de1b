//! Evaluation Results

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend name recorded on locally synthesized results
pub const FALLBACK_BACKEND: &str = "fallback";

/// Score given to a dimension whose backend call failed
pub const FALLBACK_SCORE: f64 = 50.0;

/// Confidence given to a dimension whose backend call failed
pub const FALLBACK_CONFIDENCE: f64 = 30.0;

/// Outcome of scoring a single dimension
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    /// Score (0-100)
    pub score: f64,
    /// Confidence in the score (0-100)
    pub confidence: f64,
    /// Backend's explanation, or a failure summary
    pub reasoning: String,
    /// Backend that produced the score
    pub backend_used: String,
    /// Cost observed for this dimension
    pub cost: f64,
}

impl DimensionResult {
    /// Low-confidence stand-in for a failed dimension
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            score: FALLBACK_SCORE,
            confidence: FALLBACK_CONFIDENCE,
            reasoning: reason.into(),
            backend_used: FALLBACK_BACKEND.to_string(),
            cost: 0.0,
        }
    }

    /// Whether this result was synthesized locally
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.backend_used == FALLBACK_BACKEND
    }
}

/// How much a recommendation would move the overall result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

/// What a recommendation is about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationKind {
    /// The content scored poorly on a dimension
    Improvement,
    /// Spend per dimension is close to the budget
    CostOptimization,
    /// A dimension was scored with low confidence
    BackendUpgrade,
}

/// Actionable suggestion derived from an evaluation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    /// Dimension the suggestion refers to, if any
    pub dimension: Option<String>,
    pub impact: Impact,
    pub message: String,
}

/// Complete result of one evaluation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Request this result answers
    pub request_id: String,
    /// Mean of present dimension scores
    pub overall_score: f64,
    /// Mean of present dimension confidences
    pub confidence: f64,
    /// Per-dimension outcomes; dimensions not evaluated are absent
    pub dimension_scores: BTreeMap<String, DimensionResult>,
    /// Total spend of this evaluation
    pub actual_cost: f64,
    /// Wall-clock duration of this evaluation
    pub actual_latency_ms: u64,
    /// Backends dispatched to, in first-use order
    pub backends_used: Vec<String>,
    /// Whether the result was served from the cache
    pub cache_hit: bool,
    /// Strategy that drove backend selection
    pub strategy_name: String,
    /// `actual_cost / cost_budget * 100`, or 0 without a budget
    pub budget_utilization_pct: f64,
    /// Named reasons for fallbacks and early termination
    pub fallbacks_used: Vec<String>,
    /// Suggestions, at most eight
    pub recommendations: Vec<Recommendation>,
    /// When the evaluation completed
    pub evaluated_at: DateTime<Utc>,
}
