//! Finds the last page of a paginated blog listing.
//!
//! The listing's first page is scanned for pagination links, reading page
//! numbers from `/page/N` style hrefs and from numeric link text. When no
//! link points past page 1, pages `/page/2/`, `/page/3/`, ... are probed
//! until one has no article-like elements, up to a fixed cap.

use crate::extract::dom::selector;
use crate::fetcher::PageSource;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

const PAGINATION_SELECTORS: &str = concat!(
    ".pagination a, .page-numbers a, .pagination .page-numbers a, ",
    r#"a[href*="/page/"], .pagination li a, .wp-pagenavi a, nav a[href*="page"]"#
);

static PAGINATION_LINKS: Lazy<Selector> = Lazy::new(|| selector(PAGINATION_SELECTORS));
static LISTING_ITEMS: Lazy<Selector> =
    Lazy::new(|| selector(r#"article, .post, .blog-post, [class*="article"]"#));
static PAGE_IN_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/page[/\-]?(\d+)").expect("valid page href regex"));

/// URL of listing page `page`. Page 1 is the base URL itself.
pub fn page_url(base: &Url, page: u32) -> String {
    if page <= 1 {
        return base.to_string();
    }
    base.join(&format!("page/{page}/"))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}page/{page}/", base.as_str()))
}

/// Highest page number any pagination link on `html` points at, or 1.
pub fn max_page_indicator(html: &str) -> u32 {
    let document = Html::parse_document(html);
    let mut max_page = 1;

    for link in document.select(&PAGINATION_LINKS) {
        if let Some(n) = link
            .value()
            .attr("href")
            .and_then(|href| PAGE_IN_HREF.captures(href))
            .and_then(|caps| caps[1].parse::<u32>().ok())
        {
            max_page = max_page.max(n);
        }

        let text: String = link.text().collect();
        if let Some(n) = leading_number(&text) {
            max_page = max_page.max(n);
        }
    }
    max_page
}

/// Whether a listing page still shows article-like elements.
pub fn has_listing_content(html: &str) -> bool {
    Html::parse_document(html)
        .select(&LISTING_ITEMS)
        .next()
        .is_some()
}

/// Digits at the start of the trimmed text, so "3" and "3 »" both read as 3.
fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Highest listing page number for the blog at `base`. Falls back to 1 when
/// the first page cannot be loaded.
#[instrument(level = "info", skip_all, fields(base_url = %base))]
pub async fn find_last_page<S: PageSource>(source: &S, base: &Url, max_probe_pages: u32) -> u32 {
    let html = match source.get_html(base.as_str()).await {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "Could not load first listing page; assuming a single page");
            return 1;
        }
    };

    let max_page = max_page_indicator(&html);
    if max_page > 1 {
        info!(last_page = max_page, "Found last page from pagination links");
        return max_page;
    }

    let mut last_with_content = 1;
    for page in 2..=max_probe_pages {
        let url = page_url(base, page);
        match source.probe_html(&url).await {
            Ok(html) if has_listing_content(&html) => {
                debug!(page, "Probe found listing content");
                last_with_content = page;
            }
            Ok(_) => {
                debug!(page, "Probe found an empty page");
                break;
            }
            Err(e) => {
                debug!(page, error = %e, "Probe failed");
                break;
            }
        }
    }
    info!(last_page = last_with_content, "Found last page by probing");
    last_with_content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::FetchedPage;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned HTML by URL; anything else is a 404.
    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeSite {
        fn with(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    impl PageSource for FakeSite {
        async fn get_html(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
        }

        async fn fetch_page(&self, _url: &str) -> Result<Option<FetchedPage>, FetchError> {
            unreachable!("pagination never fetches article pages")
        }
    }

    fn base() -> Url {
        Url::parse("https://blog.example.com/blogs/").unwrap()
    }

    #[test]
    fn test_page_url() {
        assert_eq!(page_url(&base(), 1), "https://blog.example.com/blogs/");
        assert_eq!(page_url(&base(), 7), "https://blog.example.com/blogs/page/7/");
    }

    #[test]
    fn test_max_page_from_hrefs_and_text() {
        let html = r#"<div class="pagination">
            <a href="/blogs/page/2/">2</a>
            <a href="/blogs/page-14">Last</a>
            <a href="/blogs/page/3/">Next »</a>
        </div>"#;
        assert_eq!(max_page_indicator(html), 14);

        let text_only = r#"<ul class="page-numbers"><li><a href="?p=2">2</a></li>
            <li><a href="?p=9">9 »</a></li></ul>"#;
        let text_only = format!(r#"<div class="pagination">{text_only}</div>"#);
        assert_eq!(max_page_indicator(&text_only), 9);
    }

    #[test]
    fn test_max_page_defaults_to_one() {
        assert_eq!(max_page_indicator("<html><body><a href=\"/about\">About</a></body></html>"), 1);
    }

    #[tokio::test]
    async fn test_uses_pagination_links_without_probing() {
        let site = FakeSite::default().with(
            "https://blog.example.com/blogs/",
            r#"<nav class="pagination"><a href="https://blog.example.com/blogs/page/15/">15</a></nav>"#,
        );
        assert_eq!(find_last_page(&site, &base(), 100).await, 15);
        assert_eq!(site.requested.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_probes_until_first_empty_page() {
        let listing = "<html><body><article><h2>Post</h2></article></body></html>";
        let site = FakeSite::default()
            .with("https://blog.example.com/blogs/", listing)
            .with("https://blog.example.com/blogs/page/2/", listing)
            .with("https://blog.example.com/blogs/page/3/", listing)
            .with("https://blog.example.com/blogs/page/4/", "<html><body><p>Nothing here</p></body></html>")
            .with("https://blog.example.com/blogs/page/5/", listing);
        assert_eq!(find_last_page(&site, &base(), 100).await, 3);
    }

    #[tokio::test]
    async fn test_probe_stops_on_error_and_respects_cap() {
        let listing = "<html><body><div class=\"post\">Post</div></body></html>";
        let site = FakeSite::default()
            .with("https://blog.example.com/blogs/", listing)
            .with("https://blog.example.com/blogs/page/2/", listing);
        assert_eq!(find_last_page(&site, &base(), 100).await, 2);

        let mut capped = FakeSite::default().with("https://blog.example.com/blogs/", listing);
        for page in 2..=10 {
            capped = capped.with(&format!("https://blog.example.com/blogs/page/{page}/"), listing);
        }
        assert_eq!(find_last_page(&capped, &base(), 4).await, 4);
    }

    #[tokio::test]
    async fn test_unreachable_base_is_single_page() {
        let site = FakeSite::default();
        assert_eq!(find_last_page(&site, &base(), 100).await, 1);
    }
}
