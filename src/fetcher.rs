//! HTTP retrieval of listing and article pages.
//!
//! [`Fetcher`] wraps a `reqwest` client configured with a timeout, a bounded
//! redirect policy and browser user agents, and retries transient failures
//! with exponential backoff. The [`PageSource`] trait is the seam the crawl
//! and the pipeline depend on, so they can run against in-memory pages.

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::extract::dom::{BODY, element_text};
use crate::models::FetchedPage;
use crate::retry::{RetryPolicy, retry_with_backoff};
use chrono::Utc;
use rand::seq::IndexedRandom;
use reqwest::{Client, header, redirect};
use scraper::Html;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Where pages come from.
pub trait PageSource {
    /// Raw HTML of `url`, retrying transient failures.
    async fn get_html(&self, url: &str) -> Result<String, FetchError>;

    /// A page whose body carries real content. `Ok(None)` when the server
    /// answered with an empty shell.
    async fn fetch_page(&self, url: &str) -> Result<Option<FetchedPage>, FetchError>;

    /// One quick attempt, used when probing for listing pages that may not exist.
    async fn probe_html(&self, url: &str) -> Result<String, FetchError> {
        self.get_html(url).await
    }
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    probe_client: Client,
    policy: RetryPolicy,
    min_html_chars: usize,
    min_body_text_chars: usize,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let build = |timeout_secs: u64| {
            Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .redirect(redirect::Policy::limited(config.max_redirects))
                .build()
        };
        Ok(Self {
            client: build(config.timeout_secs)?,
            probe_client: build(config.probe_timeout_secs)?,
            policy: config.retry_policy(),
            min_html_chars: config.min_html_chars,
            min_body_text_chars: config.min_body_text_chars,
        })
    }

    async fn get_once(&self, client: &Client, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let user_agent = USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let response = client
            .get(parsed)
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

impl PageSource for Fetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get_html(&self, url: &str) -> Result<String, FetchError> {
        retry_with_backoff(&self.policy, FetchError::is_retryable, || {
            self.get_once(&self.client, url)
        })
        .await
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch_page(&self, url: &str) -> Result<Option<FetchedPage>, FetchError> {
        let raw_html = self.get_html(url).await?;
        if !has_meaningful_body(&raw_html, self.min_html_chars, self.min_body_text_chars) {
            warn!(bytes = raw_html.len(), "Page has no usable body content");
            return Ok(None);
        }
        debug!(bytes = raw_html.len(), "Fetched page");
        Ok(Some(FetchedPage {
            url: url.to_string(),
            raw_html,
            fetched_at: Utc::now(),
        }))
    }

    async fn probe_html(&self, url: &str) -> Result<String, FetchError> {
        self.get_once(&self.probe_client, url).await
    }
}

/// Whether `html` is long enough and its `<body>` holds more than
/// `min_body_text_chars` characters of text. Some servers answer 200 with an
/// empty application shell.
pub fn has_meaningful_body(html: &str, min_html_chars: usize, min_body_text_chars: usize) -> bool {
    if html.chars().count() < min_html_chars {
        return false;
    }
    let document = Html::parse_document(html);
    document
        .select(&BODY)
        .next()
        .is_some_and(|body| element_text(body).trim().chars().count() > min_body_text_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article_html() -> String {
        format!(
            "<html><head><title>Post</title></head><body><article><h1>Post</h1><p>{}</p></article></body></html>",
            "Plenty of readable article text. ".repeat(20)
        )
    }

    fn test_fetcher(max_retries: u32, delay_ms: u64) -> Fetcher {
        let config = FetchConfig {
            timeout_secs: 5,
            max_retries,
            delay_ms,
            ..FetchConfig::default()
        };
        Fetcher::new(&config).expect("failed to build test Fetcher")
    }

    #[test]
    fn test_meaningful_body_rules() {
        assert!(has_meaningful_body(&article_html(), 500, 200));
        assert!(!has_meaningful_body("<html><body>short</body></html>", 500, 200));

        let shell = format!(
            "<html><head><script>{}</script></head><body><div id=\"app\"></div></body></html>",
            "var x = 1;".repeat(80)
        );
        assert!(!has_meaningful_body(&shell, 500, 200));
    }

    #[tokio::test]
    async fn test_retries_503_then_succeeds_with_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(200).set_body_string(article_html()))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3, 50);
        let started = Instant::now();
        let page = fetcher
            .fetch_page(&format!("{}/post", server.uri()))
            .await
            .expect("fetch should succeed on the third attempt")
            .expect("page should have content");

        assert!(page.raw_html.contains("readable article text"));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        // 50ms then 100ms between attempts.
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_404_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3, 1);
        let err = fetcher
            .get_html(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_surfaces_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(2, 1);
        let err = fetcher.get_html(&server.uri()).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    async fn mount_redirect_chain(server: &MockServer, last_hop: u32) {
        for n in 1..last_hop {
            Mock::given(method("GET"))
                .and(path(format!("/hop/{n}")))
                .respond_with(
                    ResponseTemplate::new(302)
                        .insert_header("Location", format!("{}/hop/{}", server.uri(), n + 1)),
                )
                .mount(server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(format!("/hop/{last_hop}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(article_html()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_follows_up_to_five_redirects() {
        let server = MockServer::start().await;
        mount_redirect_chain(&server, 11).await;

        let html = test_fetcher(3, 1)
            .get_html(&format!("{}/hop/6", server.uri()))
            .await
            .expect("five redirects are allowed");
        assert!(html.contains("readable article text"));
        assert_eq!(server.received_requests().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_too_many_redirects_fails_without_retry() {
        let server = MockServer::start().await;
        mount_redirect_chain(&server, 11).await;

        let err = test_fetcher(3, 1)
            .get_html(&format!("{}/hop/1", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(&err, FetchError::Http(e) if e.is_redirect()), "{err}");
        assert!(!err.is_retryable());
        // The first request and five followed redirects; no second attempt.
        assert_eq!(server.received_requests().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(article_html())
                    .set_delay(Duration::from_secs(3)),
            )
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_body_string(article_html()))
            .mount(&server)
            .await;

        let config = FetchConfig {
            timeout_secs: 1,
            max_retries: 2,
            delay_ms: 1,
            ..FetchConfig::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();
        let html = fetcher
            .get_html(&format!("{}/slow", server.uri()))
            .await
            .expect("second attempt should succeed");

        assert!(html.contains("readable article text"));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_shell_is_soft_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body><p>Hi</p></body></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = test_fetcher(0, 1);
        let page = fetcher.fetch_page(&server.uri()).await.unwrap();
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn test_malformed_url_fails_without_request() {
        let fetcher = test_fetcher(3, 1);
        let err = fetcher.get_html("::not a url::").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_sends_browser_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(article_html()))
            .mount(&server)
            .await;

        test_fetcher(0, 1).get_html(&server.uri()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let ua = requests[0]
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(ua.starts_with("Mozilla/5.0"), "unexpected user agent {ua}");
    }
}
