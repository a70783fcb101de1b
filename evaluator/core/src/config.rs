//! Evaluator Configuration
//!
//! Runtime configuration for the evaluator, loaded from a TOML file at
//! `~/.config/evaluator/evaluator.toml` and environment variables.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. Environment variables
//! 2. TOML configuration file
//! 3. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [cache]
//! ttl_secs = 86400
//! max_entries = 1000
//!
//! [strategy]
//! candidate_count = 3
//! cost_budget_threshold = 0.10
//!
//! [execution]
//! max_in_flight = 1
//!
//! [retry]
//! max_retries = 2
//! initial_backoff_ms = 100
//!
//! [preferences]
//! seo = ["llama-3-70b", "gpt-4o-mini"]
//! default = ["gpt-4o-mini", "claude-3-haiku"]
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategy::DimensionPreferences;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where the configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Cache sizing and expiry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for ordinary results
    pub ttl_secs: u64,
    /// TTL for results of `comprehensive_evaluate`
    pub comprehensive_ttl_secs: u64,
    /// Entry count above which eviction runs
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            comprehensive_ttl_secs: 72 * 60 * 60,
            max_entries: 1000,
        }
    }
}

impl CacheConfig {
    /// Default TTL as a `Duration`
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Comprehensive TTL as a `Duration`
    #[must_use]
    pub fn comprehensive_ttl(&self) -> Duration {
        Duration::from_secs(self.comprehensive_ttl_secs)
    }
}

/// Thresholds driving strategy selection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Number of ranked candidates kept per strategy
    pub candidate_count: usize,
    /// Budgets below this select the cost-optimized strategy
    pub cost_budget_threshold: f64,
    /// Latency targets below this select the speed-optimized strategy
    pub latency_target_threshold_ms: u64,
    /// Quality thresholds above this select the quality-optimized strategy
    pub quality_threshold: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            candidate_count: 3,
            cost_budget_threshold: 0.10,
            latency_target_threshold_ms: 5_000,
            quality_threshold: 85.0,
        }
    }
}

/// Dimension loop settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Dimensions scored at once; 1 evaluates strictly in request order
    pub max_in_flight: usize,
    /// Reject requests without dimensions
    pub require_dimensions: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 1,
            require_dimensions: false,
        }
    }
}

/// Retry configuration for backend calls
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Initial backoff delay
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f32,

    /// Add jitter to backoff
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate backoff duration for attempt N (0-indexed)
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_backoff_ms as f64 * f64::from(self.backoff_multiplier).powi(exponent);
        let capped = base.min(self.max_backoff_ms as f64);

        let duration_ms = if self.use_jitter {
            // Add up to 25% jitter
            let jitter = rand::random::<f64>() * 0.25;
            (capped * (1.0 + jitter)) as u64
        } else {
            capped as u64
        };

        Duration::from_millis(duration_ms)
    }
}

/// Background maintenance settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Whether `start_maintenance` spawns the task
    pub enabled: bool,
    /// Interval between sweeps
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

impl MaintenanceConfig {
    /// Sweep interval as a `Duration`
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Fixed settings behind the convenience wrappers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetConfig {
    /// Budget used by `quick_evaluate`
    pub quick_cost_budget: f64,
    /// Deadline used by `quick_evaluate`
    pub quick_latency_target_ms: u64,
    /// Dimensions scored by `comprehensive_evaluate`
    pub comprehensive_dimensions: Vec<String>,
    /// Quality threshold used by `comprehensive_evaluate`
    pub comprehensive_quality_threshold: f64,
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self {
            quick_cost_budget: 0.10,
            quick_latency_target_ms: 3_000,
            comprehensive_dimensions: [
                "content-quality",
                "technical-accuracy",
                "readability",
                "seo",
                "engagement",
                "brand-voice",
                "market-research",
                "competitive-analysis",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            comprehensive_quality_threshold: 90.0,
        }
    }
}

// =============================================================================
// TOML Structures
// =============================================================================

/// Cache section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheToml {
    pub ttl_secs: Option<u64>,
    pub comprehensive_ttl_secs: Option<u64>,
    pub max_entries: Option<usize>,
}

/// Strategy section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyToml {
    pub candidate_count: Option<usize>,
    pub cost_budget_threshold: Option<f64>,
    pub latency_target_threshold_ms: Option<u64>,
    pub quality_threshold: Option<f64>,
}

/// Execution section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionToml {
    pub max_in_flight: Option<usize>,
    pub require_dimensions: Option<bool>,
}

/// Retry section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryToml {
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f32>,
    pub use_jitter: Option<bool>,
}

/// Maintenance section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceToml {
    pub enabled: Option<bool>,
    pub interval_secs: Option<u64>,
}

/// Presets section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetToml {
    pub quick_cost_budget: Option<f64>,
    pub quick_latency_target_ms: Option<u64>,
    pub comprehensive_dimensions: Option<Vec<String>>,
    pub comprehensive_quality_threshold: Option<f64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorToml {
    pub cache: CacheToml,
    pub strategy: StrategyToml,
    pub execution: ExecutionToml,
    pub retry: RetryToml,
    pub maintenance: MaintenanceToml,
    pub presets: PresetToml,
    /// Dimension name -> ordered backend list
    pub preferences: HashMap<String, Vec<String>>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Complete evaluator configuration
#[derive(Clone, Debug, Default)]
pub struct EvaluatorConfig {
    pub cache: CacheConfig,
    pub strategy: StrategyConfig,
    pub execution: ExecutionConfig,
    pub retry: RetryConfig,
    pub maintenance: MaintenanceConfig,
    pub presets: PresetConfig,

    /// Preference overrides layered over the built-in table
    pub preferences: HashMap<String, Vec<String>>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: Option<ConfigSource>,
}

impl EvaluatorConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source.unwrap_or(ConfigSource::Default)
    }

    /// Preference table: built-in defaults with file overrides applied
    #[must_use]
    pub fn dimension_preferences(&self) -> DimensionPreferences {
        let mut preferences = DimensionPreferences::default();
        preferences.apply_overrides(&self.preferences);
        preferences
    }

    /// Check values that would make the evaluator misbehave
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if self.strategy.candidate_count == 0 {
            return Err(ConfigError::ValidationError(
                "strategy.candidate_count must be at least 1".to_string(),
            ));
        }
        if self.execution.max_in_flight == 0 {
            return Err(ConfigError::ValidationError(
                "execution.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "retry.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/evaluator/evaluator.toml` or
/// `~/.config/evaluator/evaluator.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("evaluator").join("evaluator.toml"))
}

/// Load configuration from the default path and environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<EvaluatorConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<EvaluatorConfig, ConfigError> {
    let mut config = EvaluatorConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: EvaluatorToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = Some(ConfigSource::File);

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut EvaluatorConfig, toml: &EvaluatorToml) {
    if let Some(ttl) = toml.cache.ttl_secs {
        config.cache.ttl_secs = ttl;
    }
    if let Some(ttl) = toml.cache.comprehensive_ttl_secs {
        config.cache.comprehensive_ttl_secs = ttl;
    }
    if let Some(max) = toml.cache.max_entries {
        config.cache.max_entries = max;
    }

    if let Some(n) = toml.strategy.candidate_count {
        config.strategy.candidate_count = n;
    }
    if let Some(threshold) = toml.strategy.cost_budget_threshold {
        config.strategy.cost_budget_threshold = threshold;
    }
    if let Some(threshold) = toml.strategy.latency_target_threshold_ms {
        config.strategy.latency_target_threshold_ms = threshold;
    }
    if let Some(threshold) = toml.strategy.quality_threshold {
        config.strategy.quality_threshold = threshold;
    }

    if let Some(n) = toml.execution.max_in_flight {
        config.execution.max_in_flight = n;
    }
    if let Some(required) = toml.execution.require_dimensions {
        config.execution.require_dimensions = required;
    }

    if let Some(n) = toml.retry.max_retries {
        config.retry.max_retries = n;
    }
    if let Some(ms) = toml.retry.initial_backoff_ms {
        config.retry.initial_backoff_ms = ms;
    }
    if let Some(ms) = toml.retry.max_backoff_ms {
        config.retry.max_backoff_ms = ms;
    }
    if let Some(m) = toml.retry.backoff_multiplier {
        config.retry.backoff_multiplier = m;
    }
    if let Some(jitter) = toml.retry.use_jitter {
        config.retry.use_jitter = jitter;
    }

    if let Some(enabled) = toml.maintenance.enabled {
        config.maintenance.enabled = enabled;
    }
    if let Some(secs) = toml.maintenance.interval_secs {
        config.maintenance.interval_secs = secs;
    }

    if let Some(budget) = toml.presets.quick_cost_budget {
        config.presets.quick_cost_budget = budget;
    }
    if let Some(ms) = toml.presets.quick_latency_target_ms {
        config.presets.quick_latency_target_ms = ms;
    }
    if let Some(ref dims) = toml.presets.comprehensive_dimensions {
        config.presets.comprehensive_dimensions = dims.clone();
    }
    if let Some(threshold) = toml.presets.comprehensive_quality_threshold {
        config.presets.comprehensive_quality_threshold = threshold;
    }

    config
        .preferences
        .extend(toml.preferences.iter().map(|(k, v)| (k.clone(), v.clone())));
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut EvaluatorConfig) {
    if let Ok(ttl) = std::env::var("EVALUATOR_CACHE_TTL_SECS") {
        if let Ok(secs) = ttl.parse::<u64>() {
            config.cache.ttl_secs = secs;
            config.source = Some(ConfigSource::Env);
        }
    }
    if let Ok(max) = std::env::var("EVALUATOR_CACHE_MAX_ENTRIES") {
        if let Ok(n) = max.parse::<usize>() {
            config.cache.max_entries = n;
            config.source = Some(ConfigSource::Env);
        }
    }
    if let Ok(in_flight) = std::env::var("EVALUATOR_MAX_IN_FLIGHT") {
        if let Ok(n) = in_flight.parse::<usize>() {
            config.execution.max_in_flight = n;
            config.source = Some(ConfigSource::Env);
        }
    }
    if let Ok(retries) = std::env::var("EVALUATOR_MAX_RETRIES") {
        if let Ok(n) = retries.parse::<u32>() {
            config.retry.max_retries = n;
            config.source = Some(ConfigSource::Env);
        }
    }
    if let Ok(enabled) = std::env::var("EVALUATOR_MAINTENANCE") {
        config.maintenance.enabled = enabled != "0" && enabled.to_lowercase() != "false";
        config.source = Some(ConfigSource::Env);
    }
}
