//! Per-article rewrite pipeline.
//!
//! Each stored article moves through
//! `Pending → Searching → Scraping → Rewriting → Publishing → Done`, or ends
//! in `Failed(reason)`. Articles run strictly one after another, and so do
//! competitor fetches within an article.
//!
//! A rate limit from the search or rewrite provider pauses the whole run and
//! restarts the article from `Searching`; search results from before the
//! pause are discarded. Any other failure skips the article and the batch
//! goes on.

use crate::config::PipelineConfig;
use crate::error::{ProviderError, StoreError};
use crate::extract::{extract_markdown, is_article_page, page_to_markdown};
use crate::fetcher::PageSource;
use crate::models::{ArticleRecord, ExtractionResult, RewriteInput, RewriteOutput, SearchHit};
use crate::providers::{RewriteProvider, SearchProvider, rewrite_article};
use crate::store::ArticleStore;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Why an article was skipped.
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("no search results outside the target site")]
    NoSearchResults,

    #[error("insufficient competitor evidence: {found} of {required} usable articles")]
    InsufficientEvidence { found: usize, required: usize },

    #[error("search failed: {0}")]
    Search(#[source] ProviderError),

    #[error("rewrite failed: {0}")]
    Rewrite(#[source] ProviderError),

    #[error("publishing failed: {0}")]
    Publish(#[source] StoreError),

    #[error("still rate limited after {0} restarts")]
    RateLimitRestartsExhausted(u32),
}

#[derive(Debug)]
enum ArticleState {
    Pending,
    Searching,
    Scraping(Vec<SearchHit>),
    Rewriting([ExtractionResult; 2]),
    Publishing {
        output: RewriteOutput,
        competitor_urls: Vec<String>,
    },
    Done(RewriteSummary),
    Failed(FailureReason),
}

/// A successfully rewritten and published article.
#[derive(Debug, Clone)]
pub struct RewriteSummary {
    pub article_id: u64,
    pub title: String,
    pub competitor_urls: Vec<String>,
    pub output: RewriteOutput,
}

#[derive(Debug)]
pub struct SkippedArticle {
    pub article_id: u64,
    pub title: String,
    pub reason: FailureReason,
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub rewritten: Vec<RewriteSummary>,
    pub skipped: Vec<SkippedArticle>,
}

pub struct Pipeline<'a, S, P, R, St> {
    source: &'a S,
    search: &'a P,
    rewriter: &'a R,
    store: &'a St,
    config: &'a PipelineConfig,
    own_host: Option<String>,
}

impl<'a, S, P, R, St> Pipeline<'a, S, P, R, St>
where
    S: PageSource,
    P: SearchProvider,
    R: RewriteProvider,
    St: ArticleStore,
{
    /// `site_url` is the target blog; search hits on its host are never used
    /// as competitors.
    pub fn new(
        source: &'a S,
        search: &'a P,
        rewriter: &'a R,
        store: &'a St,
        config: &'a PipelineConfig,
        site_url: &str,
    ) -> Self {
        let own_host = Url::parse(site_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()));
        Self {
            source,
            search,
            rewriter,
            store,
            config,
            own_host,
        }
    }

    /// Process `articles` in order, pausing between them.
    #[instrument(level = "info", skip_all, fields(total = articles.len()))]
    pub async fn run(&self, articles: &[ArticleRecord]) -> PipelineReport {
        let total = articles.len();
        let mut report = PipelineReport::default();

        for (i, article) in articles.iter().enumerate() {
            info!(index = i + 1, total, title = %article.title, "Processing article");
            match self.process_article(article).await {
                Ok(summary) => report.rewritten.push(summary),
                Err(reason) => {
                    warn!(article_id = article.id, title = %article.title, %reason, "Skipping article");
                    report.skipped.push(SkippedArticle {
                        article_id: article.id,
                        title: article.title.clone(),
                        reason,
                    });
                }
            }
            if i + 1 < total {
                sleep(Duration::from_millis(self.config.inter_item_delay_ms)).await;
            }
        }

        info!(
            rewritten = report.rewritten.len(),
            skipped = report.skipped.len(),
            "Pipeline finished"
        );
        report
    }

    /// Drive one article to `Done` or `Failed`.
    #[instrument(level = "info", skip_all, fields(article_id = article.id))]
    pub async fn process_article(&self, article: &ArticleRecord) -> Result<RewriteSummary, FailureReason> {
        let mut state = ArticleState::Pending;
        let mut restarts = 0u32;

        loop {
            state = match state {
                ArticleState::Pending => {
                    sleep(Duration::from_millis(self.config.pre_search_delay_ms)).await;
                    ArticleState::Searching
                }
                ArticleState::Searching => match self.search.search(&article.title).await {
                    Ok(hits) => {
                        let hits = self.competitor_hits(hits);
                        if hits.is_empty() {
                            ArticleState::Failed(FailureReason::NoSearchResults)
                        } else {
                            ArticleState::Scraping(hits)
                        }
                    }
                    Err(e) if e.is_rate_limited() => self.pause_for_rate_limit(&mut restarts, &e).await,
                    Err(e) => ArticleState::Failed(FailureReason::Search(e)),
                },
                ArticleState::Scraping(hits) => {
                    let accepted = self.collect_competitors(&hits).await;
                    match <[ExtractionResult; 2]>::try_from(accepted) {
                        Ok(competitors) => ArticleState::Rewriting(competitors),
                        Err(accepted) => ArticleState::Failed(FailureReason::InsufficientEvidence {
                            found: accepted.len(),
                            required: self.config.required_competitors,
                        }),
                    }
                }
                ArticleState::Rewriting(competitors) => {
                    let competitor_urls = competitors.iter().map(|c| c.source_url.clone()).collect();
                    let input = RewriteInput {
                        original_markdown: page_to_markdown(&article.html_content),
                        competitor_extracts: competitors,
                    };
                    match rewrite_article(self.rewriter, &input).await {
                        Ok(output) => ArticleState::Publishing {
                            output,
                            competitor_urls,
                        },
                        Err(e) if e.is_rate_limited() => self.pause_for_rate_limit(&mut restarts, &e).await,
                        Err(e) => ArticleState::Failed(FailureReason::Rewrite(e)),
                    }
                }
                ArticleState::Publishing {
                    output,
                    competitor_urls,
                } => match self
                    .store
                    .upsert_rewritten(article.id, &output.content, &output.references)
                    .await
                {
                    Ok(_) => ArticleState::Done(RewriteSummary {
                        article_id: article.id,
                        title: article.title.clone(),
                        competitor_urls,
                        output,
                    }),
                    Err(e) => ArticleState::Failed(FailureReason::Publish(e)),
                },
                ArticleState::Done(summary) => {
                    info!(
                        competitors = ?summary.competitor_urls,
                        chars = summary.output.content.chars().count(),
                        "Article rewritten and published"
                    );
                    return Ok(summary);
                }
                ArticleState::Failed(reason) => return Err(reason),
            };
        }
    }

    /// Hits in upstream order, minus those on the target site itself.
    fn competitor_hits(&self, hits: Vec<SearchHit>) -> Vec<SearchHit> {
        let Some(own_host) = self.own_host.as_deref() else {
            return hits;
        };
        let total = hits.len();
        let kept: Vec<SearchHit> = hits
            .into_iter()
            .filter(|hit| {
                let own = Url::parse(&hit.link)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h.contains(own_host)))
                    .unwrap_or(false);
                !own
            })
            .collect();
        debug!(total, kept = kept.len(), "Filtered search hits");
        kept
    }

    /// Fetch the first `max_search_results` hits one at a time, keeping
    /// article pages whose extract is long enough, until enough are found.
    async fn collect_competitors(&self, hits: &[SearchHit]) -> Vec<ExtractionResult> {
        let mut accepted = Vec::new();

        for hit in hits.iter().take(self.config.max_search_results) {
            if accepted.len() >= self.config.required_competitors {
                break;
            }
            sleep(Duration::from_millis(self.config.candidate_delay_ms)).await;

            let page = match self.source.fetch_page(&hit.link).await {
                Ok(Some(page)) => page,
                Ok(None) => {
                    info!(url = %hit.link, "Competitor page has no content");
                    continue;
                }
                Err(e) => {
                    warn!(url = %hit.link, error = %e, "Competitor page unavailable");
                    continue;
                }
            };
            debug!(
                url = %page.url,
                fetched_at = %page.fetched_at,
                bytes = page.raw_html.len(),
                "Fetched competitor page"
            );
            if !is_article_page(&page.raw_html) {
                info!(url = %hit.link, "Not an article page");
                continue;
            }

            let extract = ExtractionResult {
                markdown_text: extract_markdown(&page.raw_html),
                source_url: hit.link.clone(),
                source_title: hit.title.clone(),
                snippet: hit.snippet.clone(),
            };
            if !extract.exceeds(self.config.min_extract_chars) {
                info!(url = %hit.link, chars = extract.markdown_text.chars().count(), "Extract too short");
                continue;
            }
            info!(url = %hit.link, "Accepted competitor article");
            accepted.push(extract);
        }
        accepted
    }

    /// Wait out a rate limit and go back to `Searching`, unless the restart
    /// cap is reached.
    async fn pause_for_rate_limit(&self, restarts: &mut u32, error: &ProviderError) -> ArticleState {
        if self.config.max_rate_limit_restarts.is_some_and(|max| *restarts >= max) {
            return ArticleState::Failed(FailureReason::RateLimitRestartsExhausted(*restarts));
        }
        let pause = Duration::from_secs(self.config.rate_limit_pause_secs);
        warn!(%error, restarts = *restarts, ?pause, "Rate limited; pausing before restarting article");
        let t0 = Instant::now();
        sleep(pause).await;
        *restarts += 1;
        debug!(waited_ms = t0.elapsed().as_millis(), "Restarting article from search");
        ArticleState::Searching
    }
}
