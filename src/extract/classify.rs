//! Decides whether a fetched page is an article or blog post.
//!
//! Three signals must all hold: at least two topical keyword hits (every
//! keyword counts when an article-like element exists), a main content
//! container, and a heading. Listing, category and navigation pages usually
//! fail at least one of them.

use super::dom::{BODY, element_text, selector};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

const KEYWORDS: &[&str] = &[
    "article",
    "blog",
    "post",
    "entry",
    "content",
    "author",
    "published",
    "date",
];

const MIN_KEYWORD_MATCHES: usize = 2;

static ARTICLE_LIKE: Lazy<Selector> =
    Lazy::new(|| selector("article, .article, .blog-post, .post, .entry"));
static MAIN_CONTENT: Lazy<Selector> =
    Lazy::new(|| selector("article, .content, .post-content, .entry-content, main"));
static HEADING: Lazy<Selector> = Lazy::new(|| selector("h1, h2, .title, .entry-title"));

pub fn is_article_page(html: &str) -> bool {
    if html.trim().is_empty() {
        return false;
    }
    let document = Html::parse_document(html);

    let body_text = document
        .select(&BODY)
        .next()
        .map(|body| element_text(body).to_lowercase())
        .unwrap_or_default();
    let has_article_like = document.select(&ARTICLE_LIKE).next().is_some();
    let keyword_matches = KEYWORDS
        .iter()
        .filter(|kw| has_article_like || body_text.contains(*kw))
        .count();

    let has_main_content = document.select(&MAIN_CONTENT).next().is_some();
    let has_heading = document.select(&HEADING).next().is_some();

    tracing::debug!(
        keyword_matches,
        has_main_content,
        has_heading,
        "Classified page"
    );
    keyword_matches >= MIN_KEYWORD_MATCHES && has_main_content && has_heading
}
