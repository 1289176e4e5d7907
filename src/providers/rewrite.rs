//! The rewrite step: prompt construction, the chat completions client and
//! the references block appended to every rewritten article.

use super::{RewriteProvider, error_for_status};
use crate::config::RewriteConfig;
use crate::error::ProviderError;
use crate::models::{ExtractionResult, Reference, RewriteInput, RewriteOutput};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const PROVIDER: &str = "llm";
const REFERENCES_HEADING: &str = "## References\n\n";

static REFERENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s*\[(.*?)\]\((.+)\)\s*$").expect("valid reference regex"));

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl ChatCompletionsClient {
    /// Build the client. A missing or blank key is a setup error.
    pub fn new(config: &RewriteConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingCredentials {
                provider: PROVIDER,
                var: "LLM_API_KEY",
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
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }
}

impl RewriteProvider for ChatCompletionsClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model, prompt_chars = prompt.chars().count()))]
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;

        if !response.status().is_success() {
            let err = error_for_status(PROVIDER, response).await;
            warn!(error = %err, "Completion request failed");
            return Err(err);
        }

        let body: ChatResponse = response.json().await.map_err(|source| ProviderError::Http {
            provider: PROVIDER,
            source,
        })?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ProviderError::EmptyResponse { provider: PROVIDER })?;

        debug!(elapsed_ms = t0.elapsed().as_millis(), chars = text.chars().count(), "Completion received");
        Ok(text)
    }
}

/// The rewrite prompt: the original article, both competitor extracts and
/// fixed instructions about what to keep and what to match.
pub fn build_prompt(input: &RewriteInput) -> String {
    let [first, second] = &input.competitor_extracts;
    format!(
        "You are an expert content writer. Rewrite the following original article to match the \
structure, formatting, depth, and SEO style of the two competitor articles provided, while keeping \
the core topic and main message of the original article unchanged.

Original Article:
{original}

Competitor Article 1:
{first}

Competitor Article 2:
{second}

Instructions:
1. Maintain the core topic and main message from the original article
2. Match the structure, formatting style, and depth of the competitor articles
3. Use similar SEO techniques, heading structure, and content organization
4. Keep the writing engaging and informative
5. Output the rewritten article in markdown format
6. Do not include any meta information, just the article content

Rewritten Article:",
        original = input.original_markdown,
        first = first.markdown_text,
        second = second.markdown_text,
    )
}

/// Append a `## References` section listing the competitors as numbered
/// markdown links.
pub fn append_references(content: &str, competitors: &[ExtractionResult]) -> String {
    let lines: Vec<String> = competitors
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let title = c.source_title.split_whitespace().collect::<Vec<_>>().join(" ");
            format!("{}. [{}]({})", i + 1, title, c.source_url)
        })
        .collect();
    format!("{}\n\n{}{}", content.trim_end(), REFERENCES_HEADING, lines.join("\n"))
}

/// References listed in the last `## References` block of `content`.
pub fn parse_references(content: &str) -> Vec<Reference> {
    let Some(start) = content.rfind(REFERENCES_HEADING) else {
        return Vec::new();
    };
    content[start + REFERENCES_HEADING.len()..]
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| REFERENCE_LINE.captures(line))
        .map(|caps| Reference {
            title: caps[1].to_string(),
            url: caps[2].to_string(),
        })
        .collect()
}

/// References parsed from `content`, or the competitors' own title/URL pairs
/// when the block is missing or does not list exactly one entry per
/// competitor.
pub fn resolve_references(content: &str, competitors: &[ExtractionResult]) -> Vec<Reference> {
    let parsed = parse_references(content);
    if !parsed.is_empty() && parsed.len() == competitors.len() {
        return parsed;
    }
    debug!(parsed = parsed.len(), expected = competitors.len(), "Using competitor pairs as references");
    competitors
        .iter()
        .map(|c| Reference {
            title: c.source_title.clone(),
            url: c.source_url.clone(),
        })
        .collect()
}

/// Run the rewrite step for one article: prompt the provider, append the
/// references block and resolve the published references.
#[instrument(level = "info", skip_all)]
pub async fn rewrite_article<R: RewriteProvider>(
    provider: &R,
    input: &RewriteInput,
) -> Result<RewriteOutput, ProviderError> {
    let prompt = build_prompt(input);
    let generated = provider.complete(&prompt).await?;
    let content = append_references(&generated, &input.competitor_extracts);
    let references = resolve_references(&content, &input.competitor_extracts);
    info!(chars = content.chars().count(), references = references.len(), "Article rewritten");
    Ok(RewriteOutput {
        content,
        references,
    })
}
