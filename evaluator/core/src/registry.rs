//! Model Performance Registry
//!
//! Learned, per-backend statistics used for backend selection:
//! - Average cost per call
//! - Average latency
//! - Accuracy (blended from observed score and confidence)
//! - Reliability (success rate)
//!
//! Profiles are seeded at startup and then evolve for the lifetime of the
//! process through a fixed-rate exponential moving average. A profile is never
//! replaced wholesale once it exists.
//!
//! # Concurrency
//!
//! Profiles live in a `DashMap`, so each update holds the lock of exactly one
//! profile and concurrent evaluations never lose updates.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// EMA rate for cost, latency and reliability
pub const ALPHA_OPERATIONAL: f64 = 0.1;

/// EMA rate for accuracy (slower: quality signals are noisy)
pub const ALPHA_ACCURACY: f64 = 0.05;

// ============================================================================
// Profiles
// ============================================================================

/// Learned statistics for one scoring backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformanceProfile {
    /// Backend identifier
    pub backend_id: String,
    /// Average cost per call, in currency units
    pub avg_cost_per_call: f64,
    /// Average call latency
    pub avg_latency_ms: f64,
    /// Accuracy (0-100)
    pub accuracy_score: f64,
    /// Success rate (0-100)
    pub reliability_score: f64,
    /// Dimensions or task families this backend is good at
    pub specialties: Vec<String>,
    /// Last time an outcome was folded in
    pub last_updated: DateTime<Utc>,
    /// Number of outcomes folded in since startup
    pub observations: u64,
}

impl ModelPerformanceProfile {
    /// Create a profile with explicit starting values
    pub fn new(
        backend_id: impl Into<String>,
        avg_cost_per_call: f64,
        avg_latency_ms: f64,
        accuracy_score: f64,
        reliability_score: f64,
    ) -> Self {
        Self {
            backend_id: backend_id.into(),
            avg_cost_per_call,
            avg_latency_ms,
            accuracy_score,
            reliability_score,
            specialties: Vec::new(),
            last_updated: Utc::now(),
            observations: 0,
        }
    }

    /// Conservative profile for a backend nothing is known about
    pub fn conservative(backend_id: impl Into<String>) -> Self {
        Self::new(backend_id, 0.05, 5_000.0, 50.0, 50.0)
    }

    /// Add specialty tags
    #[must_use]
    pub fn with_specialties(mut self, specialties: &[&str]) -> Self {
        self.specialties = specialties.iter().map(ToString::to_string).collect();
        self
    }

    fn metric(&self, objective: Objective) -> f64 {
        match objective {
            Objective::Cost => self.avg_cost_per_call,
            Objective::Latency => self.avg_latency_ms,
            Objective::Accuracy => self.accuracy_score,
        }
    }
}

/// Seed profiles for the backends known at startup
#[must_use]
pub fn default_profiles() -> Vec<ModelPerformanceProfile> {
    vec![
        ModelPerformanceProfile::new("gpt-4o", 0.030, 4_500.0, 90.0, 97.0)
            .with_specialties(&["reasoning", "analysis", "market-research"]),
        ModelPerformanceProfile::new("gpt-4o-mini", 0.004, 1_800.0, 78.0, 98.0)
            .with_specialties(&["general", "speed"]),
        ModelPerformanceProfile::new("claude-3-opus", 0.060, 6_500.0, 93.0, 96.0)
            .with_specialties(&["writing", "content-quality", "brand-voice"]),
        ModelPerformanceProfile::new("claude-3-haiku", 0.002, 1_200.0, 75.0, 98.0)
            .with_specialties(&["speed", "readability"]),
        ModelPerformanceProfile::new("gemini-1.5-pro", 0.020, 3_800.0, 86.0, 95.0)
            .with_specialties(&["research", "long-context", "technical-accuracy"]),
        ModelPerformanceProfile::new("llama-3-70b", 0.008, 2_600.0, 80.0, 93.0)
            .with_specialties(&["seo", "general"]),
    ]
}

// ============================================================================
// Outcomes and Objectives
// ============================================================================

/// One observed backend call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outcome {
    /// Cost charged for the call
    pub cost: f64,
    /// Observed latency
    pub latency_ms: f64,
    /// Whether the call counts as a success
    pub success: bool,
    /// Score the backend produced, if any
    pub score: Option<f64>,
    /// Confidence the backend reported, if any
    pub confidence: Option<f64>,
}

impl Outcome {
    /// Observed accuracy signal: mean of score and confidence
    fn accuracy_signal(&self) -> Option<f64> {
        match (self.score, self.confidence) {
            (Some(score), Some(confidence)) => Some((score + confidence) / 2.0),
            (Some(score), None) => Some(score),
            (None, Some(confidence)) => Some(confidence),
            (None, None) => None,
        }
    }
}

/// Axis to rank backends on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    /// Cheapest first
    Cost,
    /// Fastest first
    Latency,
    /// Most accurate first
    Accuracy,
}

impl Objective {
    fn compare(self, a: &ModelPerformanceProfile, b: &ModelPerformanceProfile) -> Ordering {
        let ordering = match self {
            Self::Cost | Self::Latency => a.metric(self).total_cmp(&b.metric(self)),
            Self::Accuracy => b.metric(self).total_cmp(&a.metric(self)),
        };
        ordering.then_with(|| a.backend_id.cmp(&b.backend_id))
    }
}

/// Fixed-rate exponential moving average step
#[must_use]
pub fn ema(current: f64, observed: f64, alpha: f64) -> f64 {
    (1.0 - alpha) * current + alpha * observed
}

// ============================================================================
// Registry
// ============================================================================

/// Process-lifetime store of backend performance profiles
#[derive(Debug, Default)]
pub struct PerformanceRegistry {
    profiles: DashMap<String, ModelPerformanceProfile>,
}

impl PerformanceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry populated with [`default_profiles`]
    #[must_use]
    pub fn with_seed_defaults() -> Self {
        let registry = Self::new();
        registry.seed_defaults();
        registry
    }

    /// Populate one profile per known backend
    ///
    /// Backends that already have a profile keep their learned values.
    pub fn seed_defaults(&self) {
        for profile in default_profiles() {
            self.register(profile);
        }
    }

    /// Register a profile unless the backend is already known
    ///
    /// Returns `true` if the profile was inserted.
    pub fn register(&self, profile: ModelPerformanceProfile) -> bool {
        let mut inserted = false;
        self.profiles
            .entry(profile.backend_id.clone())
            .or_insert_with(|| {
                inserted = true;
                profile
            });
        inserted
    }

    /// Fold an observed call into the backend's profile
    pub fn record_outcome(&self, backend_id: &str, outcome: Outcome) {
        let mut entry = self
            .profiles
            .entry(backend_id.to_string())
            .or_insert_with(|| ModelPerformanceProfile::conservative(backend_id));
        let profile = entry.value_mut();

        profile.avg_cost_per_call = ema(profile.avg_cost_per_call, outcome.cost, ALPHA_OPERATIONAL);
        profile.avg_latency_ms = ema(profile.avg_latency_ms, outcome.latency_ms, ALPHA_OPERATIONAL);
        let reliability = if outcome.success { 100.0 } else { 0.0 };
        profile.reliability_score = ema(profile.reliability_score, reliability, ALPHA_OPERATIONAL);
        if let Some(signal) = outcome.accuracy_signal() {
            profile.accuracy_score =
                ema(profile.accuracy_score, signal.clamp(0.0, 100.0), ALPHA_ACCURACY);
        }
        profile.last_updated = Utc::now();
        profile.observations += 1;

        tracing::debug!(
            backend = backend_id,
            avg_cost = profile.avg_cost_per_call,
            avg_latency_ms = profile.avg_latency_ms,
            accuracy = profile.accuracy_score,
            reliability = profile.reliability_score,
            "Updated backend profile"
        );
    }

    /// Record a call that produced no usable reply
    ///
    /// Only reliability moves; there is no cost, latency or quality signal.
    pub fn record_failure(&self, backend_id: &str) {
        let mut entry = self
            .profiles
            .entry(backend_id.to_string())
            .or_insert_with(|| ModelPerformanceProfile::conservative(backend_id));
        let profile = entry.value_mut();
        profile.reliability_score = ema(profile.reliability_score, 0.0, ALPHA_OPERATIONAL);
        profile.last_updated = Utc::now();
        profile.observations += 1;
    }

    /// Top `top_n` backends by objective
    #[must_use]
    pub fn rank(&self, objective: Objective, top_n: usize) -> Vec<String> {
        let mut profiles: Vec<ModelPerformanceProfile> =
            self.profiles.iter().map(|e| e.value().clone()).collect();
        profiles.sort_by(|a, b| objective.compare(a, b));
        profiles
            .into_iter()
            .take(top_n)
            .map(|p| p.backend_id)
            .collect()
    }

    /// Rank a subset of backends; unknown ids are skipped
    #[must_use]
    pub fn rank_among<S: AsRef<str>>(
        &self,
        objective: Objective,
        backend_ids: &[S],
        top_n: usize,
    ) -> Vec<String> {
        let mut profiles: Vec<ModelPerformanceProfile> = backend_ids
            .iter()
            .filter_map(|id| self.profile(id.as_ref()))
            .collect();
        profiles.sort_by(|a, b| objective.compare(a, b));
        profiles.dedup_by(|a, b| a.backend_id == b.backend_id);
        profiles
            .into_iter()
            .take(top_n)
            .map(|p| p.backend_id)
            .collect()
    }

    /// Snapshot of a backend's profile
    #[must_use]
    pub fn profile(&self, backend_id: &str) -> Option<ModelPerformanceProfile> {
        self.profiles.get(backend_id).map(|p| p.value().clone())
    }

    /// Snapshot of a backend's profile, or the conservative default
    #[must_use]
    pub fn profile_or_default(&self, backend_id: &str) -> ModelPerformanceProfile {
        self.profile(backend_id)
            .unwrap_or_else(|| ModelPerformanceProfile::conservative(backend_id))
    }

    /// Whether a backend is registered
    #[must_use]
    pub fn contains(&self, backend_id: &str) -> bool {
        self.profiles.contains_key(backend_id)
    }

    /// Snapshot of all profiles, sorted by backend id
    #[must_use]
    pub fn profiles(&self) -> Vec<ModelPerformanceProfile> {
        let mut all: Vec<_> = self.profiles.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.backend_id.cmp(&b.backend_id));
        all
    }

    /// Number of registered backends
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no backend is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(cost: f64, latency_ms: f64) -> Outcome {
        Outcome {
            cost,
            latency_ms,
            success: true,
            score: Some(80.0),
            confidence: Some(90.0),
        }
    }

    #[test]
    fn test_seed_defaults() {
        let registry = PerformanceRegistry::with_seed_defaults();
        assert_eq!(registry.len(), default_profiles().len());
        assert!(registry.contains("gpt-4o"));
        assert!(!registry.contains("unknown"));
    }

    #[test]
    fn test_seed_defaults_keeps_learned_values() {
        let registry = PerformanceRegistry::with_seed_defaults();
        registry.record_outcome("gpt-4o", success(1.0, 100.0));
        let learned = registry.profile("gpt-4o").unwrap();

        registry.seed_defaults();
        assert_eq!(registry.profile("gpt-4o").unwrap(), learned);
    }

    #[test]
    fn test_record_outcome_applies_ema() {
        let registry = PerformanceRegistry::new();
        registry.register(ModelPerformanceProfile::new("b", 0.10, 1_000.0, 60.0, 80.0));

        registry.record_outcome(
            "b",
            Outcome {
                cost: 0.20,
                latency_ms: 2_000.0,
                success: false,
                score: Some(40.0),
                confidence: Some(60.0),
            },
        );

        let p = registry.profile("b").unwrap();
        assert!((p.avg_cost_per_call - 0.11).abs() < 1e-9);
        assert!((p.avg_latency_ms - 1_100.0).abs() < 1e-9);
        assert!((p.reliability_score - 72.0).abs() < 1e-9);
        // accuracy observed = (40 + 60) / 2 = 50, alpha 0.05
        assert!((p.accuracy_score - 59.5).abs() < 1e-9);
        assert_eq!(p.observations, 1);
    }

    #[test]
    fn test_record_failure_only_moves_reliability() {
        let registry = PerformanceRegistry::new();
        registry.register(ModelPerformanceProfile::new("b", 0.10, 1_000.0, 60.0, 100.0));

        registry.record_failure("b");

        let p = registry.profile("b").unwrap();
        assert_eq!(p.avg_cost_per_call, 0.10);
        assert_eq!(p.avg_latency_ms, 1_000.0);
        assert_eq!(p.accuracy_score, 60.0);
        assert!((p.reliability_score - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_converges_monotonically() {
        let registry = PerformanceRegistry::new();
        registry.register(ModelPerformanceProfile::new("b", 0.10, 1_000.0, 60.0, 80.0));

        let target = 0.02;
        let mut previous_gap = f64::MAX;
        for _ in 0..100 {
            registry.record_outcome("b", success(target, 1_000.0));
            let gap = (registry.profile("b").unwrap().avg_cost_per_call - target).abs();
            assert!(gap < previous_gap, "gap must shrink every step");
            previous_gap = gap;
        }
        assert!(previous_gap < 0.001);
    }

    #[test]
    fn test_unknown_backend_learns_from_conservative_default() {
        let registry = PerformanceRegistry::new();
        registry.record_outcome("new-backend", success(0.05, 5_000.0));

        let p = registry.profile("new-backend").unwrap();
        assert!((p.avg_cost_per_call - 0.05).abs() < 1e-9);
        assert_eq!(p.observations, 1);
    }

    #[test]
    fn test_profile_or_default_is_mediocre() {
        let registry = PerformanceRegistry::new();
        let p = registry.profile_or_default("missing");
        assert_eq!(p.backend_id, "missing");
        assert_eq!(p.accuracy_score, 50.0);
        assert_eq!(p.reliability_score, 50.0);
    }

    #[test]
    fn test_rank_by_objective() {
        let registry = PerformanceRegistry::with_seed_defaults();

        let cheapest = registry.rank(Objective::Cost, 2);
        assert_eq!(cheapest, vec!["claude-3-haiku", "gpt-4o-mini"]);

        let fastest = registry.rank(Objective::Latency, 1);
        assert_eq!(fastest, vec!["claude-3-haiku"]);

        let best = registry.rank(Objective::Accuracy, 3);
        assert_eq!(best, vec!["claude-3-opus", "gpt-4o", "gemini-1.5-pro"]);
    }

    #[test]
    fn test_rank_among_skips_unknown() {
        let registry = PerformanceRegistry::with_seed_defaults();
        let ranked = registry.rank_among(
            Objective::Cost,
            &["gpt-4o", "does-not-exist", "gpt-4o-mini"],
            5,
        );
        assert_eq!(ranked, vec!["gpt-4o-mini", "gpt-4o"]);
    }

    #[test]
    fn test_rank_breaks_ties_by_id() {
        let registry = PerformanceRegistry::new();
        registry.register(ModelPerformanceProfile::new("b", 0.01, 100.0, 70.0, 90.0));
        registry.register(ModelPerformanceProfile::new("a", 0.01, 100.0, 70.0, 90.0));

        assert_eq!(registry.rank(Objective::Cost, 2), vec!["a", "b"]);
        assert_eq!(registry.rank(Objective::Accuracy, 2), vec!["a", "b"]);
    }
}
