//! Clients for the two upstream services an article rewrite depends on:
//! a web search API that finds competitor articles and an LLM that rewrites.
//!
//! Both are traits so the pipeline can be driven by in-memory fakes. The
//! concrete clients are built once at startup from config and credentials.

pub mod rewrite;
pub mod search;

use crate::error::ProviderError;
use crate::models::SearchHit;
use reqwest::{Response, StatusCode};

pub use rewrite::{ChatCompletionsClient, rewrite_article};
pub use search::SerpApiClient;

/// Web search returning organic results in upstream order.
pub trait SearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Opaque text transform: prompt in, generated markdown out.
pub trait RewriteProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Map a non-success response to the provider error it stands for. A 429
/// becomes the distinguished rate-limit signal.
pub(crate) async fn error_for_status(provider: &'static str, response: Response) -> ProviderError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited { provider };
    }
    let body = response.text().await.unwrap_or_default();
    ProviderError::Status {
        provider,
        status: status.as_u16(),
        body: crate::utils::truncate_for_log(&body, 300),
    }
}
