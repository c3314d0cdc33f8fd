//! A module for loading runtime configuration.
//!
//! Every field has a default so an empty (or partial) TOML document is a valid configuration:
//!
//! ```
//! use dropnet::config::Config;
//!
//! let config = Config::from_toml_str("[api]\nretries = 5\n").unwrap();
//!
//! assert_eq!(config.api.retries, 5);
//! assert_eq!(config.api.concurrency, 4);
//! assert_eq!(config.analysis.histogram_buckets, 15);
//! ```

use std::{fs, path::Path, path::PathBuf, thread, time::Duration};

use serde::Deserialize;

use crate::{community::DEFAULT_SEED, error::Result, fetch::RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://ragnapi.com/api/v1/re-newal";
pub const DEFAULT_CACHE_PATH: &str = "monster_cache.json";

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Settings for the upstream monster API.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, IDs are fetched from `{base_url}/monsters/{id}`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    /// Backoff before the first retry, doubled for each subsequent one.
    pub backoff_ms: u64,
    /// Maximum number of fetches in flight during a build.
    pub concurrency: usize,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_secs: 10,
            retries: 2,
            backoff_ms: 250,
            concurrency: 4,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CACHE_PATH),
        }
    }
}

/// Parameters of the analytics, fixed here so results are reproducible.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Seed for community detection and the random reference models.
    pub seed: u64,
    /// Bucket count of the degree histogram.
    pub histogram_buckets: usize,
    /// Watts-Strogatz rewiring probability.
    pub rewiring_probability: f64,
    pub eigenvector_max_iterations: usize,
    pub eigenvector_tolerance: f64,
    /// Worker threads for betweenness and closeness.
    pub threads: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            histogram_buckets: 15,
            rewiring_probability: 0.1,
            eigenvector_max_iterations: 100,
            eigenvector_tolerance: 1.0e-6,
            threads: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}
