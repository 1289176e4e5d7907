//! Discovery of the target blog's oldest articles.
//!
//! The crawl follows the same two phases for every blog:
//!
//! 1. **Indexing**: find the last listing page with [`pagination`], then read
//!    candidates from the last pages backwards with [`listing`]
//! 2. **Fetching**: download the raw HTML of the oldest candidates
//!
//! Pages that fail to load are logged and skipped; only an unusable base URL
//! aborts the crawl.

pub mod listing;
pub mod pagination;

use crate::config::ListingConfig;
use crate::fetcher::PageSource;
use crate::models::{ListingCandidate, NewArticle};
use futures::stream::{self, StreamExt};
use listing::{extract_candidates, merge_and_sort};
use pagination::{find_last_page, page_url};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Parse the listing URL, making sure it ends with `/` so page paths join
/// below it.
pub fn listing_base(base_url: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Candidates on one listing page; an unreachable page has none.
async fn candidates_on_page<S: PageSource>(source: &S, base: &Url, page: u32) -> Vec<ListingCandidate> {
    let url = page_url(base, page);
    match source.get_html(&url).await {
        Ok(html) => {
            let candidates = extract_candidates(&html, base);
            debug!(page, count = candidates.len(), "Read listing page");
            candidates
        }
        Err(e) => {
            warn!(page, %url, error = %e, "Listing page unavailable");
            Vec::new()
        }
    }
}

/// Index the blog's listing pages from the last one backwards until enough
/// candidates are known, returning them de-duplicated and oldest first.
#[instrument(level = "info", skip_all, fields(base_url = %base))]
pub async fn index_articles<S: PageSource>(
    source: &S,
    base: &Url,
    config: &ListingConfig,
) -> Vec<ListingCandidate> {
    let last_page = find_last_page(source, base, config.max_probe_pages).await;
    info!(last_page, "Indexing listing pages");

    let mut batches = vec![candidates_on_page(source, base, last_page).await];
    if batches[0].is_empty() && last_page > 1 {
        warn!(last_page, "Last page had no candidates; reading the first page");
        batches.push(candidates_on_page(source, base, 1).await);
    }

    let mut collected: usize = batches.iter().map(Vec::len).sum();
    let mut page = last_page.saturating_sub(1);
    while page >= 1 && collected < config.min_candidates {
        let batch = candidates_on_page(source, base, page).await;
        collected += batch.len();
        batches.push(batch);
        page -= 1;
    }

    let merged = merge_and_sort(batches);
    info!(count = merged.len(), "Indexed article candidates");
    merged
}

/// Fetch the raw HTML of each candidate, one at a time. Failed fetches are
/// logged and skipped.
#[instrument(level = "info", skip_all)]
pub async fn fetch_articles<S: PageSource>(
    source: &S,
    candidates: Vec<ListingCandidate>,
) -> Vec<NewArticle> {
    let articles: Vec<NewArticle> = stream::iter(candidates)
        .then(|candidate| async move {
            match source.get_html(&candidate.url).await {
                Ok(html_content) => {
                    debug!(url = %candidate.url, "Fetched article");
                    Some(NewArticle {
                        candidate,
                        html_content,
                    })
                }
                Err(e) => {
                    error!(url = %candidate.url, error = %e, "Article fetch failed");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    info!(count = articles.len(), "Fetched article contents");
    articles
}

/// Crawl the blog and return its `oldest_limit` oldest articles with HTML.
#[instrument(level = "info", skip_all, fields(base_url = %config.base_url))]
pub async fn scrape_oldest_articles<S: PageSource>(
    source: &S,
    config: &ListingConfig,
) -> Result<Vec<NewArticle>, url::ParseError> {
    let base = listing_base(&config.base_url)?;
    let candidates = index_articles(source, &base, config).await;
    let oldest: Vec<ListingCandidate> = candidates.into_iter().take(config.oldest_limit).collect();
    Ok(fetch_articles(source, oldest).await)
}
