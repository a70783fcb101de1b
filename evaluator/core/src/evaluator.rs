//! Evaluator
//!
//! The public entry point. An [`Evaluator`] owns the shared services (registry,
//! cache, metrics) and runs each request through the same pipeline:
//!
//! ```text
//! validate -> cache lookup -> select strategy -> execute -> synthesize -> cache store
//! ```
//!
//! Everything after validation is infallible: dimension failures, budget and
//! deadline breaches all end up in the returned result.

use std::sync::Arc;
use std::time::Instant as StdInstant;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::backend::ScoringBackend;
use crate::cache::{content_hash, EvaluationCache};
use crate::config::EvaluatorConfig;
use crate::engine::ExecutionEngine;
use crate::error::EvaluationError;
use crate::maintenance::{MaintenanceHandle, MaintenanceTask};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::parser::{HeuristicParser, ResponseParser};
use crate::registry::{ModelPerformanceProfile, PerformanceRegistry};
use crate::request::{EvaluationRequest, Tier};
use crate::result::EvaluationResult;
use crate::retry::RetryPolicy;
use crate::strategy::StrategySelector;
use crate::synthesis::synthesize;

/// Cache and spend statistics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently cached
    pub size: usize,
    /// Rolling hit rate
    pub hit_rate_pct: f64,
    /// Spend across every evaluation so far
    pub total_cost_spent: f64,
    /// Evaluations completed so far (cache hits included)
    pub total_evaluations: u64,
    /// `total_cost_spent / total_evaluations`
    pub avg_cost_per_evaluation: f64,
}

#[derive(Debug, Default)]
struct Totals {
    cost: f64,
    evaluations: u64,
}

/// Adaptive multi-backend evaluator
pub struct Evaluator {
    backend: Arc<dyn ScoringBackend>,
    parser: Arc<dyn ResponseParser>,
    metrics: Arc<dyn MetricsSink>,
    registry: Arc<PerformanceRegistry>,
    cache: Arc<EvaluationCache>,
    selector: StrategySelector,
    config: EvaluatorConfig,
    totals: Mutex<Totals>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("backend", &self.backend.name())
            .field("registry", &self.registry.len())
            .field("cache", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    /// Create an evaluator with seeded profiles and an empty cache
    pub fn new(backend: Arc<dyn ScoringBackend>, config: EvaluatorConfig) -> Self {
        Self {
            backend,
            parser: Arc::new(HeuristicParser::new()),
            metrics: Arc::new(NoopMetrics),
            registry: Arc::new(PerformanceRegistry::with_seed_defaults()),
            cache: Arc::new(EvaluationCache::new(&config.cache)),
            selector: StrategySelector::new(config.strategy.clone(), config.dimension_preferences()),
            config,
            totals: Mutex::new(Totals::default()),
        }
    }

    /// Use a shared registry
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<PerformanceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use a shared cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<EvaluationCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Use a different reply parser
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Report to a metrics sink
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Shared registry
    #[must_use]
    pub fn registry(&self) -> &Arc<PerformanceRegistry> {
        &self.registry
    }

    /// Evaluate a request
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::InvalidRequest`] for a malformed request and
    /// [`EvaluationError::NoBackends`] when no backend profile is registered.
    /// Both are raised before any cache lookup or dispatch.
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EvaluationError> {
        request.validate(self.config.execution.require_dimensions)?;
        if self.registry.is_empty() {
            return Err(EvaluationError::NoBackends {
                request_id: request.request_id.clone(),
            });
        }

        let started = Instant::now();

        let cache_key = if request.caching_enabled {
            match content_hash(request) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(
                        request_id = %request.request_id,
                        error = %e,
                        "Cache unavailable for request, evaluating without it"
                    );
                    None
                }
            }
        } else {
            None
        };

        if let Some(ref key) = cache_key {
            if let Some(cached) = self.cache.lookup_at(key, StdInstant::now()) {
                let result = EvaluationResult {
                    request_id: request.request_id.clone(),
                    actual_cost: 0.0,
                    actual_latency_ms: elapsed_ms(started),
                    cache_hit: true,
                    budget_utilization_pct: 0.0,
                    evaluated_at: Utc::now(),
                    ..cached
                };
                tracing::debug!(
                    request_id = %request.request_id,
                    overall_score = result.overall_score,
                    "Served evaluation from cache"
                );
                self.finish(&result);
                return Ok(result);
            }
        }

        let strategy = self.selector.select(request, &self.registry);
        let ledger = self.engine().execute(request, &strategy).await;
        let result = synthesize(request, strategy.name(), ledger, started.elapsed());

        if let Some(key) = cache_key {
            let stored = self
                .cache
                .store_at(key, &result, request.cache_ttl, StdInstant::now());
            tracing::debug!(request_id = %request.request_id, stored, "Cache store");
        }

        tracing::info!(
            request_id = %request.request_id,
            strategy = %result.strategy_name,
            priority = ?request.priority,
            overall_score = result.overall_score,
            confidence = result.confidence,
            actual_cost = result.actual_cost,
            latency_ms = result.actual_latency_ms,
            dimensions = result.dimension_scores.len(),
            fallbacks = result.fallbacks_used.len(),
            "Evaluation complete"
        );
        self.finish(&result);
        Ok(result)
    }

    /// Fast, speed-biased evaluation with a small budget
    ///
    /// # Errors
    ///
    /// See [`Evaluator::evaluate`].
    pub async fn quick_evaluate<I, S>(
        &self,
        content: impl Into<serde_json::Value>,
        dimensions: I,
    ) -> Result<EvaluationResult, EvaluationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let presets = &self.config.presets;
        let request = EvaluationRequest::new(content)
            .with_dimensions(dimensions)
            .with_tier(Tier::Quick)
            .with_cost_budget(presets.quick_cost_budget)
            .with_latency_target_ms(presets.quick_latency_target_ms);
        self.evaluate(&request).await
    }

    /// Thorough, quality-biased evaluation over the configured wide dimension set
    ///
    /// # Errors
    ///
    /// See [`Evaluator::evaluate`].
    pub async fn comprehensive_evaluate(
        &self,
        content: impl Into<serde_json::Value>,
    ) -> Result<EvaluationResult, EvaluationError> {
        let presets = &self.config.presets;
        let request = EvaluationRequest::new(content)
            .with_dimensions(presets.comprehensive_dimensions.iter().cloned())
            .with_tier(Tier::Comprehensive)
            .with_quality_threshold(presets.comprehensive_quality_threshold)
            .with_cache_ttl(self.config.cache.comprehensive_ttl());
        self.evaluate(&request).await
    }

    /// Snapshot of every backend profile, sorted by id
    #[must_use]
    pub fn model_profiles(&self) -> Vec<ModelPerformanceProfile> {
        self.registry.profiles()
    }

    /// Cache and spend statistics
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        let totals = self.totals.lock();
        CacheStats {
            size: self.cache.len(),
            hit_rate_pct: self.cache.hit_rate_pct(),
            total_cost_spent: totals.cost,
            total_evaluations: totals.evaluations,
            avg_cost_per_evaluation: if totals.evaluations == 0 {
                0.0
            } else {
                totals.cost / totals.evaluations as f64
            },
        }
    }

    /// Drop every cached result
    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("Evaluation cache cleared");
    }

    /// Start background maintenance, unless disabled in configuration
    #[must_use]
    pub fn start_maintenance(&self) -> Option<MaintenanceHandle> {
        if !self.config.maintenance.enabled {
            tracing::debug!("Maintenance disabled by configuration");
            return None;
        }
        let task = MaintenanceTask::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.registry),
            self.config.maintenance.interval(),
        );
        Some(task.spawn())
    }

    fn engine(&self) -> ExecutionEngine {
        ExecutionEngine::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.parser),
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
        )
        .with_retry(RetryPolicy::new(self.config.retry.clone()))
        .with_max_in_flight(self.config.execution.max_in_flight)
    }

    fn finish(&self, result: &EvaluationResult) {
        {
            let mut totals = self.totals.lock();
            totals.cost += result.actual_cost;
            totals.evaluations += 1;
        }
        self.metrics.record_evaluation(result);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
