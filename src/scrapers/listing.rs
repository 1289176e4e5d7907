//! Turns a blog listing page into [`ListingCandidate`]s.
//!
//! Each field is read through an ordered list of selectors where the first
//! one that yields a value wins. Layouts vary a lot between blogs, so
//! containers that don't look like articles are skipped rather than treated
//! as errors, a missing author stays `None`, and a missing or unreadable
//! date falls back to the time of the crawl.

use crate::extract::dom::{ANCHOR, clean_text, find_first, selector, selectors};
use crate::models::ListingCandidate;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

const CONTAINER_SELECTORS: &[&str] = &[
    "article",
    ".post",
    ".blog-post",
    ".entry",
    r#"[class*="article"]"#,
    r#"[class*="blog-item"]"#,
    r#"[class*="post-item"]"#,
    ".blog-entry",
];

/// Where a title rule finds its link.
#[derive(Debug, Clone, Copy)]
enum LinkAt {
    /// The matched element is the anchor.
    Itself,
    /// The first anchor inside the matched element.
    Inside,
}

const TITLE_RULES: &[(&str, LinkAt)] = &[
    ("h1 a", LinkAt::Itself),
    ("h2 a", LinkAt::Itself),
    ("h3 a", LinkAt::Itself),
    ("h1", LinkAt::Inside),
    ("h2", LinkAt::Inside),
    ("h3", LinkAt::Inside),
    (".title a", LinkAt::Itself),
    (".entry-title a", LinkAt::Itself),
    (r#"[class*="title"] a"#, LinkAt::Itself),
];

const AUTHOR_SELECTORS: &[&str] = &[
    ".author",
    r#"[class*="author"]"#,
    ".by-author",
    ".post-author",
    ".entry-author",
    r#"a[rel="author"]"#,
];

const DATE_SELECTORS: &[&str] = &[
    ".date",
    ".published-date",
    r#"[class*="date"]"#,
    "time",
    ".entry-date",
    ".post-date",
];

/// Machine-readable attributes are preferred over visible text.
const DATE_ATTRIBUTES: &[&str] = &["datetime", "title"];

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%m/%d/%Y",
    "%d.%m.%Y",
];

static CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| selectors(CONTAINER_SELECTORS));
static TITLES: Lazy<Vec<(Selector, LinkAt)>> = Lazy::new(|| {
    TITLE_RULES
        .iter()
        .map(|(css, link)| (selector(css), *link))
        .collect()
});
static AUTHORS: Lazy<Vec<Selector>> = Lazy::new(|| selectors(AUTHOR_SELECTORS));
static DATES: Lazy<Vec<Selector>> = Lazy::new(|| selectors(DATE_SELECTORS));
static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)(st|nd|rd|th)\b").expect("valid ordinal regex"));

/// All article candidates on a listing page. Never fails: a page without
/// article containers yields an empty list.
///
/// A container matched by several selectors appears once per match; callers
/// de-duplicate with [`merge_and_sort`].
pub fn extract_candidates(page_html: &str, base: &Url) -> Vec<ListingCandidate> {
    let document = Html::parse_document(page_html);
    let crawled_at = Utc::now();

    let candidates: Vec<ListingCandidate> = CONTAINERS
        .iter()
        .flat_map(|sel| document.select(sel))
        .filter_map(|container| candidate_from(container, base, crawled_at))
        .collect();

    debug!(count = candidates.len(), base_url = %base, "Extracted listing candidates");
    candidates
}

fn candidate_from(
    container: ElementRef<'_>,
    base: &Url,
    crawled_at: DateTime<Utc>,
) -> Option<ListingCandidate> {
    let (mut title, mut href) = title_and_link(container);

    if title.is_empty() || href.is_none() {
        if let Some(first_link) = find_first(container, &ANCHOR) {
            if href.is_none() {
                href = first_link.value().attr("href").map(str::to_string);
                let link_text = clean_text(first_link);
                if !link_text.is_empty() {
                    title = link_text;
                }
            }
        }
    }

    let href = href.filter(|h| !h.trim().is_empty())?;
    if title.is_empty() {
        return None;
    }
    let url = resolve_url(base, &href)?;

    Some(ListingCandidate {
        title,
        author: author_of(container),
        published_date: published_date_of(container).unwrap_or(crawled_at),
        url,
    })
}

/// Walk the title rules; the first rule giving both a title and a link wins.
/// Otherwise the values of the last matching rule are kept.
fn title_and_link(container: ElementRef<'_>) -> (String, Option<String>) {
    let mut title = String::new();
    let mut href = None;

    for (sel, link_at) in TITLES.iter() {
        let Some(element) = find_first(container, sel) else {
            continue;
        };
        title = clean_text(element);
        href = match link_at {
            LinkAt::Itself => element.value().attr("href").map(str::to_string),
            LinkAt::Inside => find_first(element, &ANCHOR)
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string),
        };
        if !title.is_empty() && href.is_some() {
            break;
        }
    }
    (title, href)
}

fn author_of(container: ElementRef<'_>) -> Option<String> {
    AUTHORS
        .iter()
        .filter_map(|sel| find_first(container, sel))
        .map(clean_text)
        .find(|author| !author.is_empty())
}

fn published_date_of(container: ElementRef<'_>) -> Option<DateTime<Utc>> {
    DATES
        .iter()
        .filter_map(|sel| find_first(container, sel))
        .find_map(|element| {
            let raw = DATE_ATTRIBUTES
                .iter()
                .filter_map(|attr| element.value().attr(attr))
                .map(str::to_string)
                .find(|value| !value.trim().is_empty())
                .unwrap_or_else(|| clean_text(element));
            parse_published_date(&raw)
        })
}

/// Absolute http(s) URL for `href` relative to `base`.
fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let resolved = base.join(href.trim()).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Parse the date formats blogs commonly print, from RFC 3339 timestamps to
/// "March 3rd, 2023". Dates without a time are midnight UTC.
pub fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.and_utc());
    }

    let without_ordinals = ORDINAL_SUFFIX.replace_all(raw, "$1");
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&without_ordinals, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Flatten candidate batches, keep the first candidate seen for each URL and
/// order the result oldest first. Candidates with equal dates keep their
/// discovery order.
pub fn merge_and_sort<I>(batches: I) -> Vec<ListingCandidate>
where
    I: IntoIterator<Item = Vec<ListingCandidate>>,
{
    let mut merged: Vec<ListingCandidate> = batches
        .into_iter()
        .flatten()
        .unique_by(|candidate| candidate.url.clone())
        .collect();
    merged.sort_by_key(|candidate| candidate.published_date);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> Url {
        Url::parse("https://blog.example.com/blogs/").unwrap()
    }

    fn candidate(url: &str, title: &str, date: &str) -> ListingCandidate {
        ListingCandidate {
            title: title.to_string(),
            author: None,
            published_date: date.parse().unwrap(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_extracts_title_url_author_and_date() {
        let html = r#"<html><body>
            <article>
              <h2 class="entry-title"><a href="/blogs/chatbots-101/">Chatbots 101</a></h2>
              <span class="author">Jane Doe</span>
              <time datetime="2023-03-14T09:30:00+00:00">March 14, 2023</time>
            </article>
        </body></html>"#;
        let candidates = extract_candidates(html, &base());

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.title, "Chatbots 101");
        assert_eq!(c.url, "https://blog.example.com/blogs/chatbots-101/");
        assert_eq!(c.author.as_deref(), Some("Jane Doe"));
        assert_eq!(
            c.published_date,
            Utc.with_ymd_and_hms(2023, 3, 14, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_heading_without_link_uses_nested_or_first_anchor() {
        let html = r#"<html><body>
            <div class="post">
              <h3>Live chat tips</h3>
              <p><a href="https://blog.example.com/blogs/live-chat-tips/">Read more</a></p>
              <div class="post-date">Jan 5th, 2022</div>
            </div>
        </body></html>"#;
        let candidates = extract_candidates(html, &base());

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://blog.example.com/blogs/live-chat-tips/");
        assert_eq!(candidates[0].title, "Read more");
        assert_eq!(candidates[0].author, None);
        assert_eq!(
            candidates[0].published_date,
            Utc.with_ymd_and_hms(2022, 1, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_date_defaults_to_now() {
        let before = Utc::now();
        let html = r#"<article><h2><a href="/blogs/x/">X</a></h2><span class="date">someday</span></article>"#;
        let candidates = extract_candidates(html, &base());
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].published_date >= before);
    }

    #[test]
    fn test_containers_without_title_or_link_are_skipped() {
        let html = r#"<html><body>
            <article><p>No heading, no link.</p></article>
            <div class="blog-post"><h2>Heading only</h2></div>
            <article><h2><a href="mailto:team@example.com">Mail us</a></h2></article>
        </body></html>"#;
        assert!(extract_candidates(html, &base()).is_empty());
    }

    #[test]
    fn test_page_without_containers_is_empty() {
        let html = "<html><body><nav><a href=\"/\">Home</a></nav></body></html>";
        assert!(extract_candidates(html, &base()).is_empty());
        assert!(extract_candidates("", &base()).is_empty());
    }

    #[test]
    fn test_parse_published_date_formats() {
        let midnight = |y, m, d| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap();
        assert_eq!(parse_published_date("2023-03-14"), Some(midnight(2023, 3, 14)));
        assert_eq!(parse_published_date("March 14, 2023"), Some(midnight(2023, 3, 14)));
        assert_eq!(parse_published_date("Mar 3rd, 2023"), Some(midnight(2023, 3, 3)));
        assert_eq!(parse_published_date("14 March 2023"), Some(midnight(2023, 3, 14)));
        assert_eq!(
            parse_published_date("Tue, 14 Mar 2023 10:00:00 +0000"),
            Some(Utc.with_ymd_and_hms(2023, 3, 14, 10, 0, 0).unwrap())
        );
        assert_eq!(
            parse_published_date("2023-03-14T12:00:00+02:00"),
            Some(Utc.with_ymd_and_hms(2023, 3, 14, 10, 0, 0).unwrap())
        );
        assert_eq!(parse_published_date("yesterday"), None);
        assert_eq!(parse_published_date("   "), None);
    }

    #[test]
    fn test_merge_keeps_first_seen_per_url() {
        let first = vec![
            candidate("https://b.example/a", "First A", "2023-05-01T00:00:00Z"),
            candidate("https://b.example/b", "B", "2023-01-01T00:00:00Z"),
        ];
        let second = vec![
            candidate("https://b.example/a", "Second A", "2020-01-01T00:00:00Z"),
            candidate("https://b.example/c", "C", "2022-01-01T00:00:00Z"),
        ];
        let merged = merge_and_sort(vec![first, second]);

        assert_eq!(merged.len(), 3);
        let a: Vec<_> = merged.iter().filter(|c| c.url == "https://b.example/a").collect();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].title, "First A");
        assert_eq!(
            merged.iter().map(|c| c.title.as_str()).collect::<Vec<_>>(),
            vec!["C", "B", "First A"]
        );
    }

    #[test]
    fn test_merge_is_sorted_oldest_first() {
        let batch = vec![
            candidate("https://b.example/3", "3", "2024-03-01T00:00:00Z"),
            candidate("https://b.example/1", "1", "2021-03-01T00:00:00Z"),
            candidate("https://b.example/2", "2", "2022-03-01T00:00:00Z"),
        ];
        let merged = merge_and_sort(vec![batch, vec![]]);
        assert!(merged.windows(2).all(|w| w[0].published_date <= w[1].published_date));
    }
}
