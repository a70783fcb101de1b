//! Dimension Preference Table
//!
//! Ordered backend preferences per dimension, used by the balanced strategy.
//! The table is plain data: built from defaults at startup, optionally
//! overridden from the `[preferences]` section of the config file.

use std::collections::HashMap;

use crate::registry::PerformanceRegistry;

/// Key used in config files for the list applied to unknown dimensions
pub const DEFAULT_KEY: &str = "default";

/// Ordered backend preferences per dimension name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DimensionPreferences {
    by_dimension: HashMap<String, Vec<String>>,
    default: Vec<String>,
}

impl Default for DimensionPreferences {
    fn default() -> Self {
        let table: &[(&str, &[&str])] = &[
            ("content-quality", &["claude-3-opus", "gpt-4o", "gemini-1.5-pro"]),
            ("brand-voice", &["claude-3-opus", "gpt-4o"]),
            ("market-research", &["gpt-4o", "gemini-1.5-pro", "claude-3-opus"]),
            ("competitive-analysis", &["gpt-4o", "gemini-1.5-pro"]),
            ("technical-accuracy", &["gemini-1.5-pro", "gpt-4o", "claude-3-opus"]),
            ("seo", &["llama-3-70b", "gpt-4o-mini"]),
            ("readability", &["claude-3-haiku", "gpt-4o-mini"]),
            ("engagement", &["gpt-4o-mini", "claude-3-haiku", "llama-3-70b"]),
        ];

        Self {
            by_dimension: table
                .iter()
                .map(|(dim, backends)| {
                    (
                        (*dim).to_string(),
                        backends.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect(),
            default: vec![
                "gpt-4o-mini".to_string(),
                "claude-3-haiku".to_string(),
                "gpt-4o".to_string(),
            ],
        }
    }
}

impl DimensionPreferences {
    /// Create an empty table with the given default list
    #[must_use]
    pub fn empty(default: Vec<String>) -> Self {
        Self {
            by_dimension: HashMap::new(),
            default,
        }
    }

    /// Set (or replace) the list for one dimension
    pub fn set(&mut self, dimension: impl Into<String>, backends: Vec<String>) {
        self.by_dimension.insert(dimension.into(), backends);
    }

    /// Replace the list used for unknown dimensions
    pub fn set_default(&mut self, backends: Vec<String>) {
        self.default = backends;
    }

    /// Apply overrides; the `default` key replaces the unknown-dimension list
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, Vec<String>>) {
        for (dimension, backends) in overrides {
            if dimension == DEFAULT_KEY {
                self.set_default(backends.clone());
            } else {
                self.set(dimension.clone(), backends.clone());
            }
        }
    }

    /// Preference list for a dimension (falls back to the default list)
    #[must_use]
    pub fn preferences_for(&self, dimension: &str) -> &[String] {
        self.by_dimension
            .get(dimension)
            .map_or(self.default.as_slice(), Vec::as_slice)
    }

    /// List applied to dimensions without their own entry
    #[must_use]
    pub fn defaults(&self) -> &[String] {
        &self.default
    }

    /// First preferred backend that the registry knows about
    #[must_use]
    pub fn resolve(&self, dimension: &str, registry: &PerformanceRegistry) -> Option<String> {
        self.preferences_for(dimension)
            .iter()
            .find(|backend| registry.contains(backend))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelPerformanceProfile;

    #[test]
    fn test_known_and_unknown_dimensions() {
        let prefs = DimensionPreferences::default();
        assert_eq!(prefs.preferences_for("seo")[0], "llama-3-70b");
        assert_eq!(prefs.preferences_for("something-new")[0], "gpt-4o-mini");
    }

    #[test]
    fn test_resolve_skips_unregistered_backends() {
        let registry = PerformanceRegistry::new();
        registry.register(ModelPerformanceProfile::new("gpt-4o", 0.03, 4_000.0, 90.0, 97.0));

        let prefs = DimensionPreferences::default();
        assert_eq!(
            prefs.resolve("content-quality", &registry),
            Some("gpt-4o".to_string())
        );
        assert_eq!(prefs.resolve("readability", &registry), None);
    }

    #[test]
    fn test_apply_overrides() {
        let mut prefs = DimensionPreferences::default();
        let overrides = HashMap::from([
            ("seo".to_string(), vec!["gpt-4o".to_string()]),
            (DEFAULT_KEY.to_string(), vec!["claude-3-opus".to_string()]),
        ]);
        prefs.apply_overrides(&overrides);

        assert_eq!(prefs.preferences_for("seo"), ["gpt-4o".to_string()]);
        assert_eq!(prefs.preferences_for("unlisted"), ["claude-3-opus".to_string()]);
        // untouched entries survive
        assert_eq!(prefs.preferences_for("readability")[0], "claude-3-haiku");
    }
}
