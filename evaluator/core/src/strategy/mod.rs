//! Strategy Selection
//!
//! Picks an optimization strategy and the candidate backends for a request.
//!
//! # Decision Order
//!
//! ```text
//! 1. cost budget set and below threshold        -> cost-optimized
//! 2. latency target set and below threshold     -> speed-optimized
//! 3. quality threshold set and above threshold  -> quality-optimized
//! 4. tier: quick -> speed, comprehensive -> quality, standard -> balanced
//! ```
//!
//! The first matching rule wins. Balanced routing maps each dimension on its
//! own through the [`DimensionPreferences`] table; every other strategy sends
//! all dimensions to the top-ranked candidate.

pub mod preferences;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::registry::{Objective, PerformanceRegistry};
use crate::request::{EvaluationRequest, Tier};

pub use preferences::DimensionPreferences;

// ============================================================================
// Strategy Kinds
// ============================================================================

/// Family of optimization strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Cheapest backends first
    CostOptimized,
    /// Fastest backends first
    SpeedOptimized,
    /// Most accurate backends first
    QualityOptimized,
    /// Per-dimension preference lists
    Balanced,
}

impl StrategyKind {
    /// Strategy name reported on results
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CostOptimized => "cost-optimized",
            Self::SpeedOptimized => "speed-optimized",
            Self::QualityOptimized => "quality-optimized",
            Self::Balanced => "balanced",
        }
    }

    fn objective(self) -> Objective {
        match self {
            Self::CostOptimized => Objective::Cost,
            Self::SpeedOptimized => Objective::Latency,
            Self::QualityOptimized | Self::Balanced => Objective::Accuracy,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Optimization Strategy
// ============================================================================

/// Backend plan for one request
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationStrategy {
    pub kind: StrategyKind,
    /// Ranked candidate backends
    pub candidates: Vec<String>,
    /// Per-dimension backend overrides (balanced strategy)
    pub assignments: HashMap<String, String>,
    /// Sum of the chosen backends' average cost
    pub estimated_cost: f64,
    /// Serial sum, or max when dimensions can run in parallel
    pub estimated_latency_ms: f64,
    /// Whether dimensions are independent of each other
    pub parallelizable: bool,
    /// Why this strategy was chosen
    pub rationale: String,
}

impl OptimizationStrategy {
    /// Strategy name reported on results
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Backend that should score a dimension
    #[must_use]
    pub fn backend_for(&self, dimension: &str) -> Option<&str> {
        self.assignments
            .get(dimension)
            .or_else(|| self.candidates.first())
            .map(String::as_str)
    }
}

// ============================================================================
// Strategy Selector
// ============================================================================

/// Chooses strategies from request constraints and registry data
#[derive(Clone, Debug)]
pub struct StrategySelector {
    config: StrategyConfig,
    preferences: DimensionPreferences,
}

impl StrategySelector {
    /// Create a selector
    #[must_use]
    pub fn new(config: StrategyConfig, preferences: DimensionPreferences) -> Self {
        Self {
            config,
            preferences,
        }
    }

    /// Preference table used for balanced routing
    #[must_use]
    pub fn preferences(&self) -> &DimensionPreferences {
        &self.preferences
    }

    /// Build the strategy for a request
    #[must_use]
    pub fn select(
        &self,
        request: &EvaluationRequest,
        registry: &PerformanceRegistry,
    ) -> OptimizationStrategy {
        let (kind, rationale) = self.choose_kind(request);
        let top_n = self.config.candidate_count.max(1);

        let mut assignments = HashMap::new();
        let candidates = if kind == StrategyKind::Balanced {
            for dimension in &request.dimensions {
                if let Some(backend) = self.preferences.resolve(dimension, registry) {
                    assignments.insert(dimension.clone(), backend);
                }
            }
            let defaults: Vec<String> = self
                .preferences
                .defaults()
                .iter()
                .filter(|b| registry.contains(b))
                .take(top_n)
                .cloned()
                .collect();
            if defaults.is_empty() {
                registry.rank(kind.objective(), top_n)
            } else {
                defaults
            }
        } else {
            registry.rank(kind.objective(), top_n)
        };

        let mut strategy = OptimizationStrategy {
            kind,
            candidates,
            assignments,
            estimated_cost: 0.0,
            estimated_latency_ms: 0.0,
            parallelizable: request.dimensions.len() > 1,
            rationale,
        };
        self.estimate(&mut strategy, request, registry);

        tracing::debug!(
            request_id = %request.request_id,
            strategy = strategy.name(),
            candidates = ?strategy.candidates,
            estimated_cost = strategy.estimated_cost,
            estimated_latency_ms = strategy.estimated_latency_ms,
            "Selected strategy"
        );

        strategy
    }

    fn choose_kind(&self, request: &EvaluationRequest) -> (StrategyKind, String) {
        let constraints = &request.constraints;

        if let Some(budget) = constraints.cost_budget {
            if budget < self.config.cost_budget_threshold {
                return (
                    StrategyKind::CostOptimized,
                    format!(
                        "cost budget {budget} is below {}",
                        self.config.cost_budget_threshold
                    ),
                );
            }
        }

        if let Some(target) = constraints.latency_target_ms {
            if target < self.config.latency_target_threshold_ms {
                return (
                    StrategyKind::SpeedOptimized,
                    format!(
                        "latency target {target}ms is below {}ms",
                        self.config.latency_target_threshold_ms
                    ),
                );
            }
        }

        if let Some(threshold) = constraints.quality_threshold {
            if threshold > self.config.quality_threshold {
                return (
                    StrategyKind::QualityOptimized,
                    format!(
                        "quality threshold {threshold} is above {}",
                        self.config.quality_threshold
                    ),
                );
            }
        }

        match request.tier {
            Tier::Quick => (
                StrategyKind::SpeedOptimized,
                "quick tier favours speed".to_string(),
            ),
            Tier::Comprehensive => (
                StrategyKind::QualityOptimized,
                "comprehensive tier favours accuracy".to_string(),
            ),
            Tier::Standard => (
                StrategyKind::Balanced,
                "no binding constraint; per-dimension preferences".to_string(),
            ),
        }
    }

    fn estimate(
        &self,
        strategy: &mut OptimizationStrategy,
        request: &EvaluationRequest,
        registry: &PerformanceRegistry,
    ) {
        let mut total_cost = 0.0;
        let mut total_latency = 0.0;
        let mut max_latency: f64 = 0.0;

        for dimension in &request.dimensions {
            let Some(backend) = strategy.backend_for(dimension) else {
                continue;
            };
            let profile = registry.profile_or_default(backend);
            total_cost += profile.avg_cost_per_call;
            total_latency += profile.avg_latency_ms;
            max_latency = max_latency.max(profile.avg_latency_ms);
        }

        strategy.estimated_cost = total_cost;
        strategy.estimated_latency_ms = if strategy.parallelizable {
            max_latency
        } else {
            total_latency
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelPerformanceProfile;

    fn selector() -> StrategySelector {
        StrategySelector::new(StrategyConfig::default(), DimensionPreferences::default())
    }

    #[test]
    fn test_cost_rule_wins_over_everything() {
        let registry = PerformanceRegistry::with_seed_defaults();
        let request = EvaluationRequest::new("x")
            .with_dimensions(["seo"])
            .with_cost_budget(0.05)
            .with_latency_target_ms(1_000)
            .with_quality_threshold(95.0)
            .with_tier(Tier::Comprehensive);

        let strategy = selector().select(&request, &registry);
        assert_eq!(strategy.kind, StrategyKind::CostOptimized);
        assert_eq!(strategy.candidates[0], "claude-3-haiku");
        assert_eq!(strategy.backend_for("seo"), Some("claude-3-haiku"));
    }

    #[test]
    fn test_budget_at_threshold_is_not_cost_optimized() {
        let registry = PerformanceRegistry::with_seed_defaults();
        let request = EvaluationRequest::new("x")
            .with_cost_budget(0.10)
            .with_latency_target_ms(3_000);

        let strategy = selector().select(&request, &registry);
        assert_eq!(strategy.kind, StrategyKind::SpeedOptimized);
    }

    #[test]
    fn test_quality_rule() {
        let registry = PerformanceRegistry::with_seed_defaults();
        let request = EvaluationRequest::new("x").with_quality_threshold(90.0);

        let strategy = selector().select(&request, &registry);
        assert_eq!(strategy.kind, StrategyKind::QualityOptimized);
        assert_eq!(strategy.candidates[0], "claude-3-opus");

        let at_threshold = EvaluationRequest::new("x").with_quality_threshold(85.0);
        assert_eq!(
            selector().select(&at_threshold, &registry).kind,
            StrategyKind::Balanced
        );
    }

    #[test]
    fn test_tier_dispatch() {
        let registry = PerformanceRegistry::with_seed_defaults();
        let quick = EvaluationRequest::new("x").with_tier(Tier::Quick);
        let deep = EvaluationRequest::new("x").with_tier(Tier::Comprehensive);
        let standard = EvaluationRequest::new("x");

        assert_eq!(selector().select(&quick, &registry).kind, StrategyKind::SpeedOptimized);
        assert_eq!(selector().select(&deep, &registry).kind, StrategyKind::QualityOptimized);
        assert_eq!(selector().select(&standard, &registry).kind, StrategyKind::Balanced);
    }

    #[test]
    fn test_balanced_maps_each_dimension() {
        let registry = PerformanceRegistry::with_seed_defaults();
        let request = EvaluationRequest::new("x").with_dimensions([
            "content-quality",
            "seo",
            "brand-new-dimension",
        ]);

        let strategy = selector().select(&request, &registry);
        assert_eq!(strategy.kind, StrategyKind::Balanced);
        assert_eq!(strategy.backend_for("content-quality"), Some("claude-3-opus"));
        assert_eq!(strategy.backend_for("seo"), Some("llama-3-70b"));
        assert_eq!(strategy.backend_for("brand-new-dimension"), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_estimates_serial_and_parallel() {
        let registry = PerformanceRegistry::new();
        registry.register(ModelPerformanceProfile::new("a", 0.01, 1_000.0, 80.0, 90.0));
        registry.register(ModelPerformanceProfile::new("b", 0.02, 3_000.0, 70.0, 90.0));

        let single = EvaluationRequest::new("x")
            .with_dimensions(["one"])
            .with_cost_budget(0.05);
        let strategy = selector().select(&single, &registry);
        assert!(!strategy.parallelizable);
        assert!((strategy.estimated_cost - 0.01).abs() < 1e-9);
        assert!((strategy.estimated_latency_ms - 1_000.0).abs() < 1e-9);

        let many = EvaluationRequest::new("x")
            .with_dimensions(["one", "two", "three"])
            .with_cost_budget(0.05);
        let strategy = selector().select(&many, &registry);
        assert!(strategy.parallelizable);
        assert!((strategy.estimated_cost - 0.03).abs() < 1e-9);
        assert!((strategy.estimated_latency_ms - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_registry_yields_no_candidates() {
        let registry = PerformanceRegistry::new();
        let request = EvaluationRequest::new("x").with_dimensions(["seo"]);
        let strategy = selector().select(&request, &registry);
        assert!(strategy.candidates.is_empty());
        assert_eq!(strategy.backend_for("seo"), None);
    }
}
