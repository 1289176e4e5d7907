//! Main-content extraction: strip boilerplate, pick the article body and
//! convert it to normalized markdown.

use super::dom::{BODY, PARAGRAPH, Renderer, element_text, selectors};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

/// Removed before any content selection.
const NOISE_SELECTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    "aside",
    ".nav",
    ".navbar",
    ".navigation",
    ".header",
    ".footer",
    ".sidebar",
    ".ad",
    ".ads",
    ".advertisement",
    ".advertising",
    ".ad-container",
    ".ad-wrapper",
    r#"[class*="ad-"]"#,
    r#"[id*="ad-"]"#,
    r#"[class*="advertisement"]"#,
    r#"[id*="advertisement"]"#,
    ".cookie",
    ".cookie-banner",
    ".cookie-consent",
    ".gdpr",
    ".privacy-banner",
    r#"[class*="cookie"]"#,
    r#"[id*="cookie"]"#,
    ".social-share",
    ".share-buttons",
    ".comments",
    ".comment-section",
    ".related-posts",
    ".related-articles",
    ".newsletter",
    ".subscribe",
    ".popup",
    ".modal",
    ".overlay",
    "script",
    "style",
    "noscript",
    r#"iframe[src*="ads"]"#,
    r#"iframe[src*="advertisement"]"#,
    ".menu",
    ".menu-item",
    ".breadcrumb",
    ".tags",
    ".tag-list",
    ".author-box",
    ".author-info",
    ".post-meta",
    ".entry-meta",
];

/// Tried in order; the first match with enough text is the article body.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main article",
    ".article-content",
    ".post-content",
    ".entry-content",
    ".content",
    ".post-body",
    ".article-body",
    r#"[role="main"]"#,
    "main",
    ".main-content",
    ".article-text",
    ".post-text",
];

const MIN_CONTENT_TEXT_CHARS: usize = 300;
const MIN_FALLBACK_PARAGRAPHS: usize = 3;

static NOISE: Lazy<Vec<Selector>> = Lazy::new(|| selectors(NOISE_SELECTORS));
static CONTENT: Lazy<Vec<Selector>> = Lazy::new(|| selectors(CONTENT_SELECTORS));
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank-run regex"));
static SETEXT_UNDERLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(=+|-+)\s*$").expect("valid setext regex"));
static STAR_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)\*\s+").expect("valid bullet regex"));

/// Re-serialize `html` without any element on the noise deny-list.
///
/// Applying it to its own output changes nothing.
pub fn strip_noise(html: &str) -> String {
    let document = Html::parse_document(html);
    let renderer = Renderer {
        skip: &NOISE,
        clean_images: false,
    };
    format!("<!DOCTYPE html>{}", renderer.render(document.root_element()))
}

/// Extract the main content of a full page as normalized markdown.
pub fn extract_markdown(html: &str) -> String {
    let cleaned = strip_noise(html);
    let document = Html::parse_document(&cleaned);
    let renderer = Renderer {
        skip: &[],
        clean_images: true,
    };

    let selected = CONTENT.iter().zip(CONTENT_SELECTORS).find_map(|(sel, css)| {
        let element = document.select(sel).next()?;
        let text_len = element_text(element).trim().chars().count();
        (text_len > MIN_CONTENT_TEXT_CHARS).then(|| {
            debug!(selector = *css, text_len, "Selected main content");
            renderer.render(element)
        })
    });

    let fragment = selected.unwrap_or_else(|| {
        let Some(body) = document.select(&BODY).next() else {
            return String::new();
        };
        let paragraphs: Vec<_> = body.select(&PARAGRAPH).collect();
        if paragraphs.len() > MIN_FALLBACK_PARAGRAPHS {
            debug!(paragraphs = paragraphs.len(), "Falling back to paragraphs");
            let inner: String = paragraphs.into_iter().map(|p| renderer.render(p)).collect();
            format!("<div>{inner}</div>")
        } else {
            debug!("Falling back to whole body");
            renderer.render_children(body)
        }
    });

    html_to_markdown(&fragment)
}

/// A whole page as normalized markdown: boilerplate removed, no content
/// selection. Used for the site's own articles, whose layout is known to be
/// a single post per page.
pub fn page_to_markdown(html: &str) -> String {
    let document = Html::parse_document(html);
    let renderer = Renderer {
        skip: &NOISE,
        clean_images: false,
    };
    match document.select(&BODY).next() {
        Some(body) => html_to_markdown(&renderer.render_children(body)),
        None => String::new(),
    }
}

/// Convert an HTML fragment or page to normalized markdown with `#`
/// headings and `-` bullets.
pub fn html_to_markdown(html: &str) -> String {
    normalize_markdown(&atx_headings_and_dash_bullets(&html2md::parse_html(html)))
}

/// Rewrite setext headings (`Title` over `===`/`---`) as `#`/`##` and `*`
/// list markers as `-`. Fenced code is left alone.
fn atx_headings_and_dash_bullets(markdown: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_fence = false;
    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        if in_fence {
            out.push(line.to_string());
            continue;
        }
        if let Some(caps) = SETEXT_UNDERLINE.captures(line) {
            let heading_text = out.last_mut().filter(|prev| {
                let prev = prev.trim_start();
                !prev.is_empty() && !prev.starts_with('#') && !prev.starts_with("- ")
            });
            if let Some(prev) = heading_text {
                let marker = if caps[1].starts_with('=') { "#" } else { "##" };
                *prev = format!("{marker} {}", prev.trim());
                continue;
            }
        }
        out.push(STAR_BULLET.replace(line, "${1}- ").into_owned());
    }
    out.join("\n")
}

/// Trim every line, collapse runs of blank lines to a single blank line and
/// trim the whole text.
pub fn normalize_markdown(markdown: &str) -> String {
    let trimmed_lines = markdown
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUNS
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}
