//! Error types for the crawl, extraction and rewrite pipeline.
//!
//! Errors are split by the collaborator that produces them so callers can
//! decide locally what is retryable, what is a per-article skip and what is
//! fatal to the run.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while retrieving a page over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL \"{url}\": {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },
}

impl FetchError {
    /// Transient failures worth another attempt: network errors, timeouts,
    /// 5xx responses and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::InvalidUrl { .. } => false,
            FetchError::Http(e) => !e.is_builder() && !e.is_redirect(),
            FetchError::Status { status, .. } => *status == 429 || (500..600).contains(status),
        }
    }
}

/// Failures talking to the search or rewrite provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Upstream answered 429. The pipeline pauses and restarts the article.
    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: &'static str },

    #[error("{provider} credentials missing (set {var})")]
    MissingCredentials {
        provider: &'static str,
        var: &'static str,
    },

    #[error("{provider} HTTP error: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} reported an error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: &'static str },
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// Failures reading or writing the article store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no stored article with id {0}")]
    UnknownArticle(u64),
}

/// Failures loading the YAML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_retryability() {
        let status = |status| FetchError::Status {
            status,
            url: "https://example.com".to_string(),
        };
        assert!(status(503).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(403).is_retryable());
    }

    #[test]
    fn invalid_url_is_not_retryable() {
        let err = FetchError::InvalidUrl {
            url: "not a url".to_string(),
            source: url::Url::parse("not a url").unwrap_err(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn rate_limit_is_distinguished() {
        assert!(ProviderError::RateLimited { provider: "serpapi" }.is_rate_limited());
        assert!(
            !ProviderError::EmptyResponse { provider: "serpapi" }.is_rate_limited()
        );
    }
}
