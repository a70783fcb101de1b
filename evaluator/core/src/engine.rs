//! Execution Engine
//!
//! Runs the dimension loop for one evaluation: resolve a backend per
//! dimension, call it under the retry policy, parse the reply, feed the
//! registry, and stop as soon as the cost budget or latency target is blown.
//!
//! # Ledger
//!
//! All accumulation goes through one mutex-protected [`Ledger`]. The lock is
//! only held to settle a finished dimension, never across a backend call.
//!
//! ```text
//! settle(dimension):
//!   halted already?        -> account cost, drop result
//!   actual_cost > budget?  -> "cost-budget-exceeded", drop result, halt
//!   elapsed > target?      -> keep result, "latency-target-exceeded", halt
//! ```
//!
//! Cost is checked first, so a call that breaches both reports the budget.
//!
//! # Concurrency
//!
//! With `max_in_flight = 1` dimensions run strictly in request order. Larger
//! values score up to that many dimensions at once; a dimension that has not
//! started when the ledger halts is never dispatched.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::backend::{ScoreCall, ScoringBackend};
use crate::metrics::MetricsSink;
use crate::parser::{ParsedScore, ResponseParser};
use crate::registry::{Outcome, PerformanceRegistry};
use crate::request::EvaluationRequest;
use crate::result::DimensionResult;
use crate::retry::RetryPolicy;
use crate::strategy::OptimizationStrategy;

/// Fallback reason recorded when the cost budget stops the loop
pub const BUDGET_EXCEEDED: &str = "cost-budget-exceeded";

/// Fallback reason recorded when the latency target stops the loop
pub const LATENCY_EXCEEDED: &str = "latency-target-exceeded";

/// Score above which a call counts as a success for reliability tracking
pub const SUCCESS_SCORE: f64 = 70.0;

/// Fallback reason recorded for a dimension that could not be scored
#[must_use]
pub fn dimension_failed(dimension: &str) -> String {
    format!("dimension-{dimension}-failed")
}

/// Why the dimension loop stopped early
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Halt {
    CostBudget,
    LatencyTarget,
}

/// Accumulated state of one dimension loop
#[derive(Debug, Default)]
pub struct Ledger {
    pub dimension_scores: BTreeMap<String, DimensionResult>,
    pub actual_cost: f64,
    pub backends_used: Vec<String>,
    pub fallbacks_used: Vec<String>,
    pub halt: Option<Halt>,
}

impl Ledger {
    fn note_backend(&mut self, backend_id: &str) {
        if !self.backends_used.iter().any(|b| b == backend_id) {
            self.backends_used.push(backend_id.to_string());
        }
    }
}

/// Outcome of scoring one dimension, before it is settled
#[derive(Debug)]
struct Attempt {
    result: DimensionResult,
    /// Spend charged by the backend, even when the result is a fallback
    charged: f64,
    /// Backend that was dispatched to, if any
    dispatched: Option<String>,
    failed: bool,
}

/// Dimension loop runner
#[derive(Clone)]
pub struct ExecutionEngine {
    backend: Arc<dyn ScoringBackend>,
    parser: Arc<dyn ResponseParser>,
    registry: Arc<PerformanceRegistry>,
    metrics: Arc<dyn MetricsSink>,
    retry: RetryPolicy,
    max_in_flight: usize,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .field("max_in_flight", &self.max_in_flight)
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    /// Create an engine
    pub fn new(
        backend: Arc<dyn ScoringBackend>,
        parser: Arc<dyn ResponseParser>,
        registry: Arc<PerformanceRegistry>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            backend,
            parser,
            registry,
            metrics,
            retry: RetryPolicy::default(),
            max_in_flight: 1,
        }
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set how many dimensions may be scored at once
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Score every dimension of the request until done or halted
    pub async fn execute(
        &self,
        request: &EvaluationRequest,
        strategy: &OptimizationStrategy,
    ) -> Ledger {
        let started = Instant::now();
        let ledger = Mutex::new(Ledger::default());
        let shared = &ledger;

        // Items must be owned for the evaluation future to be spawnable
        futures::stream::iter(request.dimensions.iter().cloned())
            .map(move |dimension: String| async move {
                if shared.lock().halt.is_some() {
                    return;
                }
                let attempt = self.score_dimension(request, strategy, &dimension).await;
                Self::settle(&mut shared.lock(), request, &dimension, attempt, started);
            })
            .buffered(self.max_in_flight)
            .for_each(|()| async {})
            .await;

        ledger.into_inner()
    }

    async fn score_dimension(
        &self,
        request: &EvaluationRequest,
        strategy: &OptimizationStrategy,
        dimension: &str,
    ) -> Attempt {
        let Some(backend_id) = strategy.backend_for(dimension) else {
            return Attempt {
                result: DimensionResult::fallback("no backend available"),
                charged: 0.0,
                dispatched: None,
                failed: true,
            };
        };

        let call = &ScoreCall {
            request_id: &request.request_id,
            backend_id,
            dimension,
            content: &request.content,
            tier: request.tier,
        };
        let call_started = Instant::now();

        let reply = match self
            .retry
            .run(backend_id, move || self.backend.score(call))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    dimension,
                    backend = backend_id,
                    error = %e,
                    "Dimension call failed"
                );
                self.registry.record_failure(backend_id);
                self.metrics.record_call(
                    backend_id,
                    millis(call_started.elapsed()),
                    0.0,
                    false,
                );
                return Attempt {
                    result: DimensionResult::fallback(format!("{backend_id} failed: {e}")),
                    charged: 0.0,
                    dispatched: Some(backend_id.to_string()),
                    failed: true,
                };
            }
        };

        let parsed = self.parser.parse(&reply.text);
        let (score, confidence, reasoning) = match parsed {
            ParsedScore::Structured {
                score,
                confidence,
                reasoning,
            }
            | ParsedScore::Heuristic {
                score,
                confidence,
                reasoning,
            } => (score, confidence, reasoning),
            ParsedScore::Fallback { reason } => {
                tracing::warn!(
                    request_id = %request.request_id,
                    dimension,
                    backend = backend_id,
                    reason = %reason,
                    "Unparseable dimension reply"
                );
                self.registry.record_outcome(
                    backend_id,
                    Outcome {
                        cost: reply.cost,
                        latency_ms: reply.latency_ms as f64,
                        success: false,
                        score: None,
                        confidence: None,
                    },
                );
                self.metrics
                    .record_call(backend_id, reply.latency_ms, reply.cost, false);
                return Attempt {
                    result: DimensionResult::fallback(format!(
                        "{backend_id} reply unusable: {reason}"
                    )),
                    charged: reply.cost,
                    dispatched: Some(backend_id.to_string()),
                    failed: true,
                };
            }
        };

        self.registry.record_outcome(
            backend_id,
            Outcome {
                cost: reply.cost,
                latency_ms: reply.latency_ms as f64,
                success: score > SUCCESS_SCORE,
                score: Some(score),
                confidence: Some(confidence),
            },
        );
        self.metrics
            .record_call(backend_id, reply.latency_ms, reply.cost, true);

        Attempt {
            result: DimensionResult {
                score,
                confidence,
                reasoning,
                backend_used: backend_id.to_string(),
                cost: reply.cost,
            },
            charged: reply.cost,
            dispatched: Some(backend_id.to_string()),
            failed: false,
        }
    }

    fn settle(
        ledger: &mut Ledger,
        request: &EvaluationRequest,
        dimension: &str,
        attempt: Attempt,
        started: Instant,
    ) {
        ledger.actual_cost += attempt.charged;
        if let Some(ref backend_id) = attempt.dispatched {
            ledger.note_backend(backend_id);
        }

        if ledger.halt.is_some() {
            tracing::debug!(
                request_id = %request.request_id,
                dimension,
                cost = attempt.charged,
                "Discarding dimension finished after halt"
            );
            return;
        }

        if attempt.failed {
            ledger.fallbacks_used.push(dimension_failed(dimension));
        }

        let constraints = &request.constraints;
        if let Some(budget) = constraints.cost_budget {
            if ledger.actual_cost > budget {
                tracing::warn!(
                    request_id = %request.request_id,
                    dimension,
                    actual_cost = ledger.actual_cost,
                    budget,
                    "Cost budget exceeded, stopping evaluation"
                );
                ledger.fallbacks_used.push(BUDGET_EXCEEDED.to_string());
                ledger.halt = Some(Halt::CostBudget);
                return;
            }
        }

        ledger
            .dimension_scores
            .insert(dimension.to_string(), attempt.result);

        if let Some(target) = constraints.latency_target() {
            let elapsed = started.elapsed();
            if elapsed > target {
                tracing::warn!(
                    request_id = %request.request_id,
                    dimension,
                    elapsed_ms = millis(elapsed),
                    target_ms = millis(target),
                    "Latency target exceeded, stopping evaluation"
                );
                ledger.fallbacks_used.push(LATENCY_EXCEEDED.to_string());
                ledger.halt = Some(Halt::LatencyTarget);
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
