//! Evaluation Metrics
//!
//! Observability for the evaluator including:
//! - Evaluation latencies and outcomes
//! - Per-backend call counts, failures, latencies and spend
//! - Cache hits, fallbacks and budget/latency truncations
//!
//! The engine reports through the fire-and-forget [`MetricsSink`] trait.
//! [`EvaluationMetrics`] keeps everything in memory and can export a summary
//! or Prometheus text; [`NoopMetrics`] discards everything.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::engine::{BUDGET_EXCEEDED, LATENCY_EXCEEDED};
use crate::result::EvaluationResult;

/// Spend is accumulated in millionths of a currency unit
const COST_SCALE: f64 = 1_000_000.0;

/// Upper bounds of the latency buckets, in milliseconds
pub const LATENCY_BUCKETS_MS: [u64; 10] =
    [50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000, 60_000];

const SLOTS: usize = LATENCY_BUCKETS_MS.len() + 1;

fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

fn read(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

// ============================================================================
// Sink
// ============================================================================

/// Receiver of evaluation observations
pub trait MetricsSink: Send + Sync {
    /// One backend call completed (successfully or not)
    fn record_call(&self, backend: &str, latency_ms: u64, cost: f64, success: bool);

    /// One evaluation completed
    fn record_evaluation(&self, result: &EvaluationResult);
}

/// Sink that drops every observation
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_call(&self, _backend: &str, _latency_ms: u64, _cost: f64, _success: bool) {}

    fn record_evaluation(&self, _result: &EvaluationResult) {}
}

// ============================================================================
// Latency Histogram
// ============================================================================

/// Millisecond latency distribution over [`LATENCY_BUCKETS_MS`]
///
/// Observations above the last bound land in an overflow slot instead of
/// being folded into the last bucket.
#[derive(Debug)]
pub struct LatencyHistogram {
    slots: [AtomicU64; SLOTS],
    sum_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_ms: AtomicU64::new(0),
            max_ms: AtomicU64::new(0),
        }
    }
}

impl LatencyHistogram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one latency
    pub fn observe(&self, latency_ms: u64) {
        let slot = LATENCY_BUCKETS_MS.partition_point(|&bound| bound < latency_ms);
        bump(&self.slots[slot], 1);
        bump(&self.sum_ms, latency_ms);
        self.max_ms.fetch_max(latency_ms, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            slots: self.slots.each_ref().map(read),
            sum_ms: read(&self.sum_ms),
            max_ms: read(&self.max_ms),
        }
    }
}

/// Point-in-time copy of a [`LatencyHistogram`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatencySnapshot {
    /// Per-bucket counts; the last entry is the overflow slot
    pub slots: [u64; SLOTS],
    pub sum_ms: u64,
    pub max_ms: u64,
}

impl LatencySnapshot {
    /// Number of observations
    #[must_use]
    pub fn count(&self) -> u64 {
        self.slots.iter().sum()
    }

    /// Upper bound of the bucket holding quantile `q` (0.0-1.0)
    ///
    /// Quantiles that fall in the overflow slot report the largest
    /// observation. An empty histogram reports 0.
    #[must_use]
    pub fn quantile(&self, q: f64) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        let rank = ((count as f64 * q.clamp(0.0, 1.0)).ceil() as u64).max(1);
        let mut seen = 0;
        for (bound, n) in LATENCY_BUCKETS_MS.iter().zip(self.slots) {
            seen += n;
            if seen >= rank {
                return *bound;
            }
        }
        self.max_ms
    }

    #[must_use]
    pub fn p50(&self) -> u64 {
        self.quantile(0.5)
    }

    #[must_use]
    pub fn p99(&self) -> u64 {
        self.quantile(0.99)
    }

    /// Cumulative `(le, count)` pairs in Prometheus bucket order, ending with `+Inf`
    #[must_use]
    pub fn cumulative(&self) -> Vec<(String, u64)> {
        let mut running = 0;
        let mut buckets: Vec<(String, u64)> = LATENCY_BUCKETS_MS
            .iter()
            .zip(self.slots)
            .map(|(bound, n)| {
                running += n;
                (bound.to_string(), running)
            })
            .collect();
        buckets.push(("+Inf".to_string(), self.count()));
        buckets
    }
}

// ============================================================================
// Per-Backend Metrics
// ============================================================================

/// Call statistics for one backend
#[derive(Debug)]
pub struct BackendMetrics {
    pub backend_id: String,
    calls: AtomicU64,
    failures: AtomicU64,
    cost_micros: AtomicU64,
    latency: LatencyHistogram,
}

impl BackendMetrics {
    #[must_use]
    pub fn new(backend_id: String) -> Self {
        Self {
            backend_id,
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            cost_micros: AtomicU64::new(0),
            latency: LatencyHistogram::new(),
        }
    }

    fn record(&self, latency_ms: u64, cost: f64, success: bool) {
        bump(&self.calls, 1);
        if !success {
            bump(&self.failures, 1);
        }
        bump(&self.cost_micros, (cost.max(0.0) * COST_SCALE).round() as u64);
        self.latency.observe(latency_ms);
    }

    #[must_use]
    pub fn summary(&self) -> BackendMetricsSummary {
        let calls = read(&self.calls);
        let failures = read(&self.failures);
        BackendMetricsSummary {
            backend_id: self.backend_id.clone(),
            calls,
            failures,
            error_rate: if calls == 0 {
                0.0
            } else {
                failures as f64 / calls as f64
            },
            total_cost: read(&self.cost_micros) as f64 / COST_SCALE,
            latency: self.latency.snapshot(),
        }
    }
}

/// Snapshot of one backend's call statistics
#[derive(Clone, Debug)]
pub struct BackendMetricsSummary {
    pub backend_id: String,
    pub calls: u64,
    pub failures: u64,
    pub error_rate: f64,
    pub total_cost: f64,
    pub latency: LatencySnapshot,
}

// ============================================================================
// Evaluation Metrics
// ============================================================================

/// In-memory metrics collector for the evaluator
#[derive(Debug)]
pub struct EvaluationMetrics {
    backends: DashMap<String, Arc<BackendMetrics>>,
    evaluations: AtomicU64,
    cache_hits: AtomicU64,
    dimension_fallbacks: AtomicU64,
    budget_truncations: AtomicU64,
    latency_truncations: AtomicU64,
    evaluation_latency: LatencyHistogram,
    started_at: Instant,
}

impl Default for EvaluationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: DashMap::new(),
            evaluations: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            dimension_fallbacks: AtomicU64::new(0),
            budget_truncations: AtomicU64::new(0),
            latency_truncations: AtomicU64::new(0),
            evaluation_latency: LatencyHistogram::new(),
            started_at: Instant::now(),
        }
    }

    /// Get or create metrics for a backend
    pub fn backend_metrics(&self, backend_id: &str) -> Arc<BackendMetrics> {
        if let Some(metrics) = self.backends.get(backend_id) {
            return Arc::clone(metrics.value());
        }
        Arc::clone(
            self.backends
                .entry(backend_id.to_string())
                .or_insert_with(|| Arc::new(BackendMetrics::new(backend_id.to_string())))
                .value(),
        )
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Summaries for every backend, sorted by id
    #[must_use]
    pub fn backend_summaries(&self) -> Vec<BackendMetricsSummary> {
        let mut summaries: Vec<_> = self.backends.iter().map(|m| m.value().summary()).collect();
        summaries.sort_by(|a, b| a.backend_id.cmp(&b.backend_id));
        summaries
    }

    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let latency = self.evaluation_latency.snapshot();
        let backends = self.backend_summaries();
        MetricsSummary {
            uptime_seconds: self.uptime().as_secs(),
            evaluations: read(&self.evaluations),
            cache_hits: read(&self.cache_hits),
            dimension_fallbacks: read(&self.dimension_fallbacks),
            budget_truncations: read(&self.budget_truncations),
            latency_truncations: read(&self.latency_truncations),
            evaluation_latency_p50_ms: latency.p50(),
            evaluation_latency_p99_ms: latency.p99(),
            backend_calls: backends.iter().map(|b| b.calls).sum(),
            total_cost: backends.iter().map(|b| b.total_cost).sum(),
        }
    }

    /// Export as Prometheus text format
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let summary = self.summary();
        let mut out = String::new();

        family(&mut out, "evaluator_evaluations_total", "counter", "Evaluations completed");
        let _ = writeln!(out, "evaluator_evaluations_total {}", summary.evaluations);

        family(&mut out, "evaluator_cache_hits_total", "counter", "Evaluations served from cache");
        let _ = writeln!(out, "evaluator_cache_hits_total {}", summary.cache_hits);

        family(&mut out, "evaluator_truncations_total", "counter", "Evaluations stopped early");
        let _ = writeln!(
            out,
            "evaluator_truncations_total{{reason=\"cost\"}} {}",
            summary.budget_truncations
        );
        let _ = writeln!(
            out,
            "evaluator_truncations_total{{reason=\"latency\"}} {}",
            summary.latency_truncations
        );

        family(
            &mut out,
            "evaluator_dimension_fallbacks_total",
            "counter",
            "Dimensions replaced by a fallback",
        );
        let _ = writeln!(
            out,
            "evaluator_dimension_fallbacks_total {}",
            summary.dimension_fallbacks
        );

        let backends = self.backend_summaries();
        if backends.is_empty() {
            return out;
        }

        family(&mut out, "evaluator_backend_calls_total", "counter", "Backend calls");
        for b in &backends {
            let _ = writeln!(
                out,
                "evaluator_backend_calls_total{{backend=\"{}\"}} {}",
                b.backend_id, b.calls
            );
        }

        family(&mut out, "evaluator_backend_failures_total", "counter", "Backend calls without a usable reply");
        for b in &backends {
            let _ = writeln!(
                out,
                "evaluator_backend_failures_total{{backend=\"{}\"}} {}",
                b.backend_id, b.failures
            );
        }

        family(&mut out, "evaluator_backend_cost_total", "counter", "Spend charged by the backend");
        for b in &backends {
            let _ = writeln!(
                out,
                "evaluator_backend_cost_total{{backend=\"{}\"}} {}",
                b.backend_id, b.total_cost
            );
        }

        family(&mut out, "evaluator_backend_latency_ms", "histogram", "Backend call latency in milliseconds");
        for b in &backends {
            for (le, count) in b.latency.cumulative() {
                let _ = writeln!(
                    out,
                    "evaluator_backend_latency_ms_bucket{{backend=\"{}\",le=\"{le}\"}} {count}",
                    b.backend_id
                );
            }
            let _ = writeln!(
                out,
                "evaluator_backend_latency_ms_sum{{backend=\"{}\"}} {}",
                b.backend_id, b.latency.sum_ms
            );
            let _ = writeln!(
                out,
                "evaluator_backend_latency_ms_count{{backend=\"{}\"}} {}",
                b.backend_id,
                b.latency.count()
            );
        }

        out
    }
}

fn family(out: &mut String, name: &str, kind: &str, help: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

impl MetricsSink for EvaluationMetrics {
    fn record_call(&self, backend: &str, latency_ms: u64, cost: f64, success: bool) {
        self.backend_metrics(backend).record(latency_ms, cost, success);
    }

    fn record_evaluation(&self, result: &EvaluationResult) {
        bump(&self.evaluations, 1);
        self.evaluation_latency.observe(result.actual_latency_ms);
        if result.cache_hit {
            // Fallbacks on a cached result were counted when it was computed
            bump(&self.cache_hits, 1);
            return;
        }
        for reason in &result.fallbacks_used {
            let counter = match reason.as_str() {
                BUDGET_EXCEEDED => &self.budget_truncations,
                LATENCY_EXCEEDED => &self.latency_truncations,
                _ => &self.dimension_fallbacks,
            };
            bump(counter, 1);
        }
    }
}

/// Global metrics summary
#[derive(Clone, Debug)]
pub struct MetricsSummary {
    pub uptime_seconds: u64,
    pub evaluations: u64,
    pub cache_hits: u64,
    pub dimension_fallbacks: u64,
    pub budget_truncations: u64,
    pub latency_truncations: u64,
    pub evaluation_latency_p50_ms: u64,
    pub evaluation_latency_p99_ms: u64,
    pub backend_calls: u64,
    pub total_cost: f64,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;

    fn result(cache_hit: bool, fallbacks: &[&str]) -> EvaluationResult {
        EvaluationResult {
            request_id: "r".to_string(),
            overall_score: 50.0,
            confidence: 30.0,
            dimension_scores: BTreeMap::new(),
            actual_cost: 0.0,
            actual_latency_ms: 12,
            backends_used: Vec::new(),
            cache_hit,
            strategy_name: "balanced".to_string(),
            budget_utilization_pct: 0.0,
            fallbacks_used: fallbacks.iter().map(ToString::to_string).collect(),
            recommendations: Vec::new(),
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn test_latency_buckets_and_overflow() {
        let hist = LatencyHistogram::new();
        hist.observe(0);
        hist.observe(50);
        hist.observe(51);
        hist.observe(90_000);

        let snap = hist.snapshot();
        assert_eq!(snap.count(), 4);
        assert_eq!(snap.slots[0], 2);
        assert_eq!(snap.slots[1], 1);
        assert_eq!(snap.slots[SLOTS - 1], 1);
        assert_eq!(snap.max_ms, 90_000);
        assert_eq!(snap.p50(), 50);
        assert_eq!(snap.p99(), 90_000);
        assert_eq!(snap.cumulative().last(), Some(&("+Inf".to_string(), 4)));
    }

    #[test]
    fn test_empty_histogram() {
        let snap = LatencyHistogram::new().snapshot();
        assert_eq!(snap.count(), 0);
        assert_eq!(snap.p50(), 0);
    }

    #[test]
    fn test_record_call() {
        let metrics = EvaluationMetrics::new();
        metrics.record_call("gpt-4o", 120, 0.03, true);
        metrics.record_call("gpt-4o", 90, 0.0, false);

        let summary = metrics.backend_metrics("gpt-4o").summary();
        assert_eq!(summary.calls, 2);
        assert_eq!(summary.failures, 1);
        assert!((summary.error_rate - 0.5).abs() < 1e-9);
        assert!((summary.total_cost - 0.03).abs() < 1e-9);
        assert_eq!(summary.latency.p50(), 100);
    }

    #[test]
    fn test_record_evaluation_classifies_fallbacks() {
        let metrics = EvaluationMetrics::new();
        metrics.record_evaluation(&result(
            false,
            &["dimension-seo-failed", BUDGET_EXCEEDED],
        ));

        let summary = metrics.summary();
        assert_eq!(summary.evaluations, 1);
        assert_eq!(summary.cache_hits, 0);
        assert_eq!(summary.dimension_fallbacks, 1);
        assert_eq!(summary.budget_truncations, 1);
        assert_eq!(summary.latency_truncations, 0);
    }

    #[test]
    fn test_cache_hit_does_not_recount_fallbacks() {
        let metrics = EvaluationMetrics::new();
        let reasons = ["dimension-seo-failed", LATENCY_EXCEEDED];
        metrics.record_evaluation(&result(false, &reasons));
        metrics.record_evaluation(&result(true, &reasons));

        let summary = metrics.summary();
        assert_eq!(summary.evaluations, 2);
        assert_eq!(summary.cache_hits, 1);
        assert_eq!(summary.dimension_fallbacks, 1);
        assert_eq!(summary.latency_truncations, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = EvaluationMetrics::new();
        metrics.record_call("claude-3-haiku", 40, 0.002, true);

        let text = metrics.to_prometheus();
        assert!(text.contains("evaluator_evaluations_total 0"));
        assert!(text.contains("# TYPE evaluator_backend_calls_total counter"));
        assert!(text.contains("evaluator_backend_calls_total{backend=\"claude-3-haiku\"} 1"));
        assert!(text.contains("# TYPE evaluator_backend_latency_ms histogram"));
        assert!(text.contains(
            "evaluator_backend_latency_ms_bucket{backend=\"claude-3-haiku\",le=\"50\"} 1"
        ));
        assert!(text.contains("evaluator_backend_latency_ms_count{backend=\"claude-3-haiku\"} 1"));
    }
}
