//! Evaluation Requests
//!
//! An [`EvaluationRequest`] names the content to score, the dimensions to
//! score it on, and the constraints the engine must respect while doing so.
//! Requests are immutable once submitted; the evaluator only ever borrows them.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;

// ============================================================================
// Tier
// ============================================================================

/// Depth of evaluation the caller is asking for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Fast, speed-biased evaluation
    Quick,
    /// Balanced evaluation (per-dimension backend preferences)
    #[default]
    Standard,
    /// Thorough, quality-biased evaluation
    Comprehensive,
}

impl Tier {
    /// Stable name used in cache keys and logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Caller-assigned priority, carried through to logs and metrics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work
    Low,
    /// Default priority
    #[default]
    Normal,
    /// User is waiting
    High,
    /// Must not be delayed
    Critical,
}

// ============================================================================
// Constraints
// ============================================================================

/// Soft ceilings and quality targets for one evaluation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Maximum spend, in currency units
    pub cost_budget: Option<f64>,
    /// Wall-clock deadline in milliseconds
    pub latency_target_ms: Option<u64>,
    /// Minimum acceptable quality (0-100)
    pub quality_threshold: Option<f64>,
}

impl Constraints {
    /// Latency target as a `Duration`
    #[must_use]
    pub fn latency_target(&self) -> Option<Duration> {
        self.latency_target_ms.map(Duration::from_millis)
    }
}

// ============================================================================
// Evaluation Request
// ============================================================================

/// A request to score content along several dimensions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationRequest {
    /// Unique request ID
    pub request_id: String,

    /// Opaque content payload
    pub content: serde_json::Value,

    /// Dimension names, evaluated in this order
    pub dimensions: Vec<String>,

    /// Evaluation depth
    pub tier: Tier,

    /// Budget, deadline and quality constraints
    pub constraints: Constraints,

    /// Whether results may be served from / written to the cache
    pub caching_enabled: bool,

    /// Caller priority
    pub priority: Priority,

    /// Cache TTL override for the stored result
    #[serde(with = "optional_secs")]
    pub cache_ttl: Option<Duration>,
}

impl Default for EvaluationRequest {
    fn default() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            content: serde_json::Value::Null,
            dimensions: Vec::new(),
            tier: Tier::Standard,
            constraints: Constraints::default(),
            caching_enabled: true,
            priority: Priority::Normal,
            cache_ttl: None,
        }
    }
}

impl EvaluationRequest {
    /// Create a request for the given content
    pub fn new(content: impl Into<serde_json::Value>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Set the dimensions to evaluate
    #[must_use]
    pub fn with_dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the tier
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Set a cost budget
    #[must_use]
    pub fn with_cost_budget(mut self, budget: f64) -> Self {
        self.constraints.cost_budget = Some(budget);
        self
    }

    /// Set a latency target in milliseconds
    #[must_use]
    pub fn with_latency_target_ms(mut self, target_ms: u64) -> Self {
        self.constraints.latency_target_ms = Some(target_ms);
        self
    }

    /// Set a quality threshold
    #[must_use]
    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.constraints.quality_threshold = Some(threshold);
        self
    }

    /// Enable or disable caching
    #[must_use]
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    /// Set priority
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Override the cache TTL for this request's result
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Set an explicit request ID
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Check the request is structurally valid
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::InvalidRequest`] naming the violating field.
    pub fn validate(&self, require_dimensions: bool) -> Result<(), EvaluationError> {
        let invalid = |field: &'static str, reason: &str| EvaluationError::InvalidRequest {
            request_id: self.request_id.clone(),
            field,
            reason: reason.to_string(),
        };

        if require_dimensions && self.dimensions.is_empty() {
            return Err(invalid("dimensions", "at least one dimension is required"));
        }

        let mut seen = HashSet::new();
        for dimension in &self.dimensions {
            if dimension.trim().is_empty() {
                return Err(invalid("dimensions", "dimension names must not be blank"));
            }
            if !seen.insert(dimension.as_str()) {
                return Err(invalid(
                    "dimensions",
                    &format!("dimension `{dimension}` is listed more than once"),
                ));
            }
        }

        if let Some(budget) = self.constraints.cost_budget {
            if !budget.is_finite() {
                return Err(invalid("constraints.cost_budget", "must be a finite number"));
            }
            if budget < 0.0 {
                return Err(invalid("constraints.cost_budget", "must not be negative"));
            }
        }

        if let Some(threshold) = self.constraints.quality_threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(invalid(
                    "constraints.quality_threshold",
                    "must be between 0 and 100",
                ));
            }
        }

        Ok(())
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
