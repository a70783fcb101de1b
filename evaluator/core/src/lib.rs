//! Evaluator Core - Adaptive Multi-Backend Content Evaluation
//!
//! This crate scores content along named quality dimensions by routing each
//! dimension to one of several model backends. It keeps every evaluation
//! inside a cost budget and a latency target, learns from every call which
//! backends are cheap, fast and accurate, and caches results it trusts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Evaluator                              │
//! │                                                                  │
//! │  request ──► validate ──► Cache ──hit──────────────────► result  │
//! │                             │                                    │
//! │                            miss                                  │
//! │                             ▼                                    │
//! │                     StrategySelector ◄── PerformanceRegistry     │
//! │                             │                  ▲                 │
//! │                             ▼                  │ EMA updates     │
//! │                      ExecutionEngine ──────────┘                 │
//! │                       │   per dimension:                         │
//! │                       │   RetryPolicy ► ScoringBackend           │
//! │                       │   ResponseParser                         │
//! │                       │   ledger: cost / latency halt            │
//! │                       ▼                                          │
//! │                   synthesis ──► Cache store ──────────► result   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Evaluator`]: Entry point that owns the shared services
//! - [`EvaluationRequest`]: Content, dimensions, tier and constraints
//! - [`EvaluationResult`]: Scores, spend, latency, fallbacks, recommendations
//! - [`PerformanceRegistry`]: Learned per-backend statistics
//! - [`EvaluationCache`]: Content-addressed result cache
//! - [`ScoringBackend`]: Trait for model providers
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use evaluator_core::{backend::OllamaScorer, load_config, Evaluator, EvaluationRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let evaluator = Evaluator::new(Arc::new(OllamaScorer::from_env()), config);
//!
//!     let request = EvaluationRequest::new("Our new trail shoe grips wet rock.")
//!         .with_dimensions(["readability", "brand-voice"])
//!         .with_cost_budget(0.25);
//!
//!     let result = evaluator.evaluate(&request).await?;
//!     println!("{:.1} ({} fallbacks)", result.overall_score, result.fallbacks_used.len());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Scoring backend trait plus scripted and Ollama implementations
//! - [`cache`]: Result cache with TTL, eviction and hit-rate tracking
//! - [`config`]: TOML and environment configuration
//! - [`engine`]: Budget- and deadline-bounded dimension loop
//! - [`maintenance`]: Background cache purge and registry reporting
//! - [`metrics`]: Metrics sink trait and in-memory collector
//! - [`parser`]: Reply parsing (JSON, then heuristics)
//! - [`registry`]: Backend performance profiles
//! - [`retry`]: Bounded exponential backoff
//! - [`strategy`]: Strategy selection and dimension preferences
//! - [`synthesis`]: Averages, utilization and recommendations

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod backend;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod maintenance;
pub mod metrics;
pub mod parser;
pub mod registry;
pub mod request;
pub mod result;
pub mod retry;
pub mod strategy;
pub mod synthesis;

// Re-exports for convenience
pub use backend::{
    BackendError, BackendReply, OllamaScorer, ScoreCall, ScoringBackend, ScriptedBackend,
    ScriptedReply,
};
pub use cache::{CacheError, EvaluationCache};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigSource,
    EvaluatorConfig,
};
pub use engine::{ExecutionEngine, Halt, BUDGET_EXCEEDED, LATENCY_EXCEEDED};
pub use error::EvaluationError;
pub use evaluator::{CacheStats, Evaluator};
pub use maintenance::{MaintenanceHandle, MaintenanceTask};
pub use metrics::{EvaluationMetrics, MetricsSink, NoopMetrics};
pub use parser::{HeuristicParser, ParsedScore, ResponseParser};
pub use registry::{ModelPerformanceProfile, Objective, Outcome, PerformanceRegistry};
pub use request::{Constraints, EvaluationRequest, Priority, Tier};
pub use result::{DimensionResult, EvaluationResult, Impact, Recommendation, RecommendationKind};
pub use retry::RetryPolicy;
pub use strategy::{DimensionPreferences, OptimizationStrategy, StrategyKind, StrategySelector};
