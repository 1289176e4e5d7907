//! Runtime configuration loaded from an optional YAML file.
//!
//! Every section has defaults, so a missing file or a partial file is fine.
//! Credentials never live here; they come from the CLI or the environment.
//!
//! ```yaml
//! listing:
//!   base_url: https://blog.example.com/blogs/
//! fetch:
//!   max_retries: 5
//! pipeline:
//!   rate_limit_pause_secs: 90
//! ```

use crate::error::ConfigError;
use crate::models::MIN_EXTRACT_CHARS;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub listing: ListingConfig,
    pub search: SearchConfig,
    pub rewrite: RewriteConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load the config at `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.required_competitors != 2 {
            return Err(ConfigError::Invalid(
                "pipeline.required_competitors must be 2".to_string(),
            ));
        }
        if !self.fetch.backoff.is_finite() || self.fetch.backoff < 1.0 {
            return Err(ConfigError::Invalid(
                "fetch.backoff must be a finite number >= 1".to_string(),
            ));
        }
        url::Url::parse(&self.listing.base_url)
            .map_err(|e| ConfigError::Invalid(format!("listing.base_url: {e}")))?;
        Ok(())
    }
}

/// HTTP fetch behaviour: timeouts, redirects, retries and body validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub max_retries: u32,
    pub delay_ms: u64,
    pub backoff: f64,
    /// Timeout for probing listing pages during pagination discovery.
    pub probe_timeout_secs: u64,
    pub min_html_chars: usize,
    pub min_body_text_chars: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_redirects: 5,
            max_retries: 3,
            delay_ms: 1000,
            backoff: 2.0,
            probe_timeout_secs: 5,
            min_html_chars: 500,
            min_body_text_chars: 200,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.delay_ms),
            backoff: self.backoff,
        }
    }
}

/// Where the target blog lives and how much of it to crawl.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub base_url: String,
    pub max_probe_pages: u32,
    /// Keep walking back through pages until at least this many candidates are found.
    pub min_candidates: usize,
    pub oldest_limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://beyondchats.com/blogs/".to_string(),
            max_probe_pages: 100,
            min_candidates: 10,
            oldest_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub engine: String,
    pub result_count: u32,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://serpapi.com/search.json".to_string(),
            engine: "google".to_string(),
            result_count: 10,
            timeout_secs: 10,
        }
    }
}

/// OpenAI-compatible chat completions endpoint used for rewriting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

/// Pacing and thresholds for the per-article rewrite pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pre_search_delay_ms: u64,
    pub candidate_delay_ms: u64,
    pub inter_item_delay_ms: u64,
    pub rate_limit_pause_secs: u64,
    pub max_search_results: usize,
    pub required_competitors: usize,
    pub min_extract_chars: usize,
    /// Give up on an article after this many rate-limit restarts. Unbounded when unset.
    pub max_rate_limit_restarts: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pre_search_delay_ms: 1000,
            candidate_delay_ms: 500,
            inter_item_delay_ms: 2000,
            rate_limit_pause_secs: 60,
            max_search_results: 5,
            required_competitors: 2,
            min_extract_chars: MIN_EXTRACT_CHARS,
            max_rate_limit_restarts: None,
        }
    }
}
