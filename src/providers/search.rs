//! SerpApi web search.

use super::{SearchProvider, error_for_status};
use crate::config::SearchConfig;
use crate::error::ProviderError;
use crate::models::SearchHit;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const PROVIDER: &str = "serpapi";

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

pub struct SerpApiClient {
    client: Client,
    endpoint: String,
    engine: String,
    result_count: u32,
    api_key: String,
}

impl SerpApiClient {
    /// Build the client. A missing or blank key is a setup error.
    pub fn new(config: &SearchConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingCredentials {
                provider: PROVIDER,
                var: "SERPAPI_KEY",
            })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            engine: config.engine.clone(),
            result_count: config.result_count,
            api_key,
        })
    }
}

impl SearchProvider for SerpApiClient {
    #[instrument(level = "info", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let result_count = self.result_count.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("q", query),
                ("engine", self.engine.as_str()),
                ("num", result_count.as_str()),
            ])
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;

        if !response.status().is_success() {
            return Err(error_for_status(PROVIDER, response).await);
        }

        let body: SerpApiResponse = response.json().await.map_err(|source| ProviderError::Http {
            provider: PROVIDER,
            source,
        })?;
        if let Some(message) = body.error {
            return Err(ProviderError::Api {
                provider: PROVIDER,
                message,
            });
        }

        let hits: Vec<SearchHit> = body
            .organic_results
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| SearchHit {
                title: r.title,
                link: r.link,
                snippet: r.snippet,
            })
            .collect();
        debug!(count = hits.len(), "Search returned results");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SerpApiClient {
        let config = SearchConfig {
            endpoint: format!("{}/search.json", server.uri()),
            ..SearchConfig::default()
        };
        SerpApiClient::new(&config, Some("test-key".to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_search_sends_query_and_reads_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("q", "chatbot onboarding"))
            .and(query_param("engine", "google"))
            .and(query_param("num", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [
                    {"title": "First", "link": "https://a.example/1", "snippet": "one"},
                    {"title": "No link"},
                    {"title": "Second", "link": "https://b.example/2"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let hits = client_for(&server).search("chatbot onboarding").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].link, "https://a.example/1");
        assert_eq!(hits[0].snippet.as_deref(), Some("one"));
        assert_eq!(hits[1].title, "Second");
        assert_eq!(hits[1].snippet, None);
    }

    #[tokio::test]
    async fn test_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server).search("anything").await.unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_other_failures_are_not_rate_limits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        let err = client_for(&server).search("anything").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 500, .. }));
        assert!(!err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_error_field_in_body_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "Invalid API key."})),
            )
            .mount(&server)
            .await;
        let err = client_for(&server).search("anything").await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { ref message, .. } if message == "Invalid API key."));
    }

    #[tokio::test]
    async fn test_no_organic_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        assert!(client_for(&server).search("anything").await.unwrap().is_empty());
    }

    #[test]
    fn test_missing_key_is_setup_error() {
        let config = SearchConfig::default();
        assert!(matches!(
            SerpApiClient::new(&config, None),
            Err(ProviderError::MissingCredentials { var: "SERPAPI_KEY", .. })
        ));
        assert!(SerpApiClient::new(&config, Some("  ".to_string())).is_err());
    }
}
