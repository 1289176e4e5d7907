//! Data models for discovered, extracted and rewritten articles.
//!
//! - [`ListingCandidate`]: an article link found on a listing page
//! - [`FetchedPage`]: raw HTML retrieved for one URL
//! - [`ExtractionResult`]: cleaned markdown of a competitor page
//! - [`RewriteInput`] / [`RewriteOutput`]: the rewrite step's contract
//! - [`ArticleRecord`] / [`RewrittenArticleRecord`]: what the store persists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Extracted markdown shorter than this is never used as competitor evidence.
pub const MIN_EXTRACT_CHARS: usize = 200;

/// An article discovered on a listing page.
///
/// `url` is always absolute and is the uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingCandidate {
    pub title: String,
    pub author: Option<String>,
    pub published_date: DateTime<Utc>,
    pub url: String,
}

/// Raw HTML for one URL. Dropped once classified and extracted.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub raw_html: String,
    pub fetched_at: DateTime<Utc>,
}

/// Main content of a competitor page, ready for the rewrite step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub markdown_text: String,
    pub source_url: String,
    pub source_title: String,
    pub snippet: Option<String>,
}

impl ExtractionResult {
    /// Whether the markdown is longer than `min_chars` characters.
    pub fn exceeds(&self, min_chars: usize) -> bool {
        self.markdown_text.chars().count() > min_chars
    }
}

/// One organic result returned by the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RewriteInput {
    pub original_markdown: String,
    pub competitor_extracts: [ExtractionResult; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

/// Rewritten article markdown and the competitors it was modelled on.
///
/// `references` always has one entry per competitor extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteOutput {
    pub content: String,
    pub references: Vec<Reference>,
}

/// A stored article from the target site, keyed by `article_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: u64,
    pub title: String,
    pub author: Option<String>,
    pub published_date: DateTime<Utc>,
    pub article_url: String,
    pub html_content: String,
    pub scraped_at: DateTime<Utc>,
}

/// A crawled article waiting to be stored. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub candidate: ListingCandidate,
    pub html_content: String,
}

/// A rewritten article, keyed by `original_article_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenArticleRecord {
    pub original_article_id: u64,
    pub rewritten_content: String,
    pub references: Vec<Reference>,
    pub generated_at: DateTime<Utc>,
}
