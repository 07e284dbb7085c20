//! Configuration management for Slidegate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Result, SlidegateError};

/// Route key under which a single global rule applies to every route.
pub const ALL_ROUTES: &str = "all";

/// Main configuration for the rate-limiting engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidegateConfig {
    /// Name of the limiting strategy to evaluate requests with.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Rate-limit rules keyed by route. Keys are either the literal
    /// `"all"` or `"<METHOD> <path>"` for a single route.
    #[serde(default)]
    pub rules: HashMap<String, RuleConfig>,

    /// When true, every request resolves against the `"all"` rule instead
    /// of its own `"<METHOD> <path>"` entry.
    #[serde(default)]
    pub apply_config_to_all_paths: bool,

    /// When true, a subject shares one quota bucket across all routes;
    /// otherwise keys are scoped per method and path.
    #[serde(default)]
    pub apply_user_rate_limit_to_all_paths: bool,

    /// Number of shards in the per-key lock table.
    #[serde(default = "default_lock_shards")]
    pub lock_shards: usize,
}

impl Default for SlidegateConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            rules: HashMap::new(),
            apply_config_to_all_paths: false,
            apply_user_rate_limit_to_all_paths: false,
            lock_shards: default_lock_shards(),
        }
    }
}

fn default_strategy() -> String {
    crate::ratelimit::SLIDING_WINDOW.to_string()
}

fn default_lock_shards() -> usize {
    64
}

/// A single rate-limit rule: at most `limit` admitted events per sliding
/// window of `duration_secs` seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Maximum number of events per window.
    pub limit: u64,

    /// Window length in seconds.
    pub duration_secs: u64,
}

/// A rule resolved for one request: the quota and window the strategy
/// evaluates against. Immutable once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Maximum number of events per window.
    pub limit: u64,
    /// Sliding window length.
    pub window: Duration,
}

impl From<&RuleConfig> for WindowConfig {
    fn from(rule: &RuleConfig) -> Self {
        Self {
            limit: rule.limit,
            window: Duration::from_secs(rule.duration_secs),
        }
    }
}

impl SlidegateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SlidegateError::Config(format!("failed to parse config: {}", e)))
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SlidegateError::Config(format!("failed to parse config: {}", e)))
    }

    /// Check that every rule carries a usable quota.
    ///
    /// A rule with a zero limit or a zero-length window can never admit a
    /// request and is rejected here rather than at evaluation time.
    pub fn validate(&self) -> Result<()> {
        for (route, rule) in &self.rules {
            if rule.limit == 0 {
                return Err(SlidegateError::Config(format!(
                    "rule for {:?} has a zero limit",
                    route
                )));
            }
            if rule.duration_secs == 0 {
                return Err(SlidegateError::Config(format!(
                    "rule for {:?} has a zero duration",
                    route
                )));
            }
        }
        if self.lock_shards == 0 {
            return Err(SlidegateError::Config(
                "lock_shards must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the rule for a route key, honoring the global-config mode.
    ///
    /// Returns `None` when no rule applies; the caller must treat that as
    /// "skip rate limiting", not as an error.
    pub fn resolve(&self, route_key: &str) -> Option<WindowConfig> {
        let rule = if self.apply_config_to_all_paths {
            self.rules.get(ALL_ROUTES)
        } else {
            self.rules.get(route_key)
        };
        rule.map(WindowConfig::from)
    }
}
