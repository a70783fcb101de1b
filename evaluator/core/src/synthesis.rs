//! Result Synthesis
//!
//! Folds a finished [`Ledger`] into an [`EvaluationResult`]: averages,
//! budget utilization and recommendations.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;

use crate::engine::Ledger;
use crate::request::EvaluationRequest;
use crate::result::{DimensionResult, EvaluationResult, Impact, Recommendation, RecommendationKind};

/// Maximum number of recommendations on a result
pub const MAX_RECOMMENDATIONS: usize = 8;

/// Scores below this get an improvement recommendation
pub const IMPROVEMENT_THRESHOLD: f64 = 70.0;

/// Scores below this make that recommendation high impact
pub const HIGH_IMPACT_THRESHOLD: f64 = 50.0;

/// Confidences below this get a backend upgrade recommendation
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 60.0;

/// Mean per-dimension spend above this share of the budget gets a cost hint
pub const COST_PRESSURE_RATIO: f64 = 0.8;

/// Build the final result for a request
#[must_use]
pub fn synthesize(
    request: &EvaluationRequest,
    strategy_name: &str,
    ledger: Ledger,
    elapsed: Duration,
) -> EvaluationResult {
    let overall_score = mean(ledger.dimension_scores.values().map(|d| d.score));
    let confidence = mean(ledger.dimension_scores.values().map(|d| d.confidence));
    let budget_utilization_pct = budget_utilization(ledger.actual_cost, request.constraints.cost_budget);
    let recommendations = recommendations(request, &ledger.dimension_scores);

    EvaluationResult {
        request_id: request.request_id.clone(),
        overall_score,
        confidence,
        dimension_scores: ledger.dimension_scores,
        actual_cost: ledger.actual_cost,
        actual_latency_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        backends_used: ledger.backends_used,
        cache_hit: false,
        strategy_name: strategy_name.to_string(),
        budget_utilization_pct,
        fallbacks_used: ledger.fallbacks_used,
        recommendations,
        evaluated_at: Utc::now(),
    }
}

/// `actual / budget * 100`, or 0 without a usable budget
#[must_use]
pub fn budget_utilization(actual_cost: f64, budget: Option<f64>) -> f64 {
    match budget {
        Some(budget) if budget > 0.0 => actual_cost / budget * 100.0,
        _ => 0.0,
    }
}

/// Suggestions for a set of dimension results, in request order
#[must_use]
pub fn recommendations(
    request: &EvaluationRequest,
    scores: &BTreeMap<String, DimensionResult>,
) -> Vec<Recommendation> {
    let present: Vec<(&String, &DimensionResult)> = request
        .dimensions
        .iter()
        .filter_map(|name| scores.get(name).map(|result| (name, result)))
        .collect();

    let mut recommendations = Vec::new();

    for (name, result) in &present {
        if result.score < IMPROVEMENT_THRESHOLD {
            let impact = if result.score < HIGH_IMPACT_THRESHOLD {
                Impact::High
            } else {
                Impact::Medium
            };
            recommendations.push(Recommendation {
                kind: RecommendationKind::Improvement,
                dimension: Some((*name).clone()),
                impact,
                message: format!(
                    "Improve {name}: scored {:.0}, below the {IMPROVEMENT_THRESHOLD:.0} target",
                    result.score
                ),
            });
        }
    }

    if let Some(budget) = request.constraints.cost_budget {
        if !present.is_empty() {
            let mean_cost = mean(present.iter().map(|(_, r)| r.cost));
            if mean_cost > COST_PRESSURE_RATIO * budget {
                recommendations.push(Recommendation {
                    kind: RecommendationKind::CostOptimization,
                    dimension: None,
                    impact: Impact::Medium,
                    message: format!(
                        "Average cost per dimension ({mean_cost:.4}) is above 80% of the budget \
                         ({budget:.4}); raise the budget or choose cheaper backends"
                    ),
                });
            }
        }
    }

    for (name, result) in &present {
        if result.confidence < LOW_CONFIDENCE_THRESHOLD {
            recommendations.push(Recommendation {
                kind: RecommendationKind::BackendUpgrade,
                dimension: Some((*name).clone()),
                impact: Impact::Low,
                message: format!(
                    "Use a higher-accuracy backend for {name}: confidence was {:.0}",
                    result.confidence
                ),
            });
        }
    }

    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}
