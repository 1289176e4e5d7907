//! # Blog Rewriter
//!
//! Backfills a blog's oldest articles and rewrites each one after the
//! structure and style of competing articles found through web search.
//!
//! ## Usage
//!
//! ```sh
//! blog_rewriter seed
//! SERPAPI_KEY=... LLM_API_KEY=... blog_rewriter rewrite -m ./rewritten
//! ```
//!
//! ## Architecture
//!
//! `seed`:
//! 1. **Indexing**: find the blog's last listing page and collect the oldest article links
//! 2. **Fetching**: download each article's HTML
//! 3. **Storing**: upsert articles not already in the store
//!
//! `rewrite`, for each stored article, oldest first:
//! 1. **Searching**: look up the article title, dropping hits on the blog itself
//! 2. **Scraping**: fetch hits one at a time until two usable competitor articles are found
//! 3. **Rewriting**: prompt the LLM with the original and both competitors
//! 4. **Publishing**: store the rewrite and optionally write it as Markdown

use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod extract;
mod fetcher;
mod models;
mod outputs;
mod pipeline;
mod providers;
mod retry;
mod scrapers;
mod store;
mod utils;

use cli::{Cli, Command};
use config::AppConfig;
use fetcher::Fetcher;
use pipeline::Pipeline;
use providers::{ChatCompletionsClient, SerpApiClient};
use store::{ArticleStore, JsonFileStore};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("blog_rewriter starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.data_dir, "Parsed CLI arguments");

    let mut config = AppConfig::load(args.config.as_deref())?;

    let result = match args.command {
        Command::Seed { base_url } => {
            if let Some(base_url) = base_url {
                config.listing.base_url = base_url;
            }
            run_seed(&config, &args.data_dir).await
        }
        Command::Rewrite {
            serpapi_key,
            llm_api_key,
            markdown_output_dir,
        } => {
            run_rewrite(
                &config,
                &args.data_dir,
                serpapi_key,
                llm_api_key,
                markdown_output_dir,
            )
            .await
        }
    };

    match &result {
        Ok(()) => info!(
            elapsed_secs = start_time.elapsed().as_secs_f64(),
            "blog_rewriter finished"
        ),
        Err(e) => error!(
            elapsed_secs = start_time.elapsed().as_secs_f64(),
            error = %e,
            "blog_rewriter failed"
        ),
    }
    result
}

/// Crawl the blog and store the oldest articles that are not stored yet.
#[instrument(level = "info", skip_all, fields(base_url = %config.listing.base_url))]
async fn run_seed(config: &AppConfig, data_dir: &Path) -> Result<(), Box<dyn Error>> {
    let store = JsonFileStore::open(data_dir).await?;
    let fetcher = Fetcher::new(&config.fetch)?;

    let crawled = scrapers::scrape_oldest_articles(&fetcher, &config.listing).await?;
    let existing = store.existing_urls().await?;
    let crawled_count = crawled.len();
    let fresh: Vec<_> = crawled
        .into_iter()
        .filter(|a| !existing.contains(&a.candidate.url))
        .collect();

    if fresh.is_empty() {
        info!(crawled = crawled_count, "No new articles to store");
        return Ok(());
    }

    let mut stored = 0usize;
    for article in fresh {
        let record = store.upsert_article(article).await?;
        info!(id = record.id, title = %record.title, url = %record.article_url, "Stored article");
        stored += 1;
    }
    info!(
        crawled = crawled_count,
        already_stored = crawled_count - stored,
        stored,
        "Seeding complete"
    );
    Ok(())
}

/// Rewrite every stored article, oldest first, and publish the results.
#[instrument(level = "info", skip_all)]
async fn run_rewrite(
    config: &AppConfig,
    data_dir: &Path,
    serpapi_key: Option<String>,
    llm_api_key: Option<String>,
    markdown_output_dir: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let search = SerpApiClient::new(&config.search, serpapi_key)?;
    let rewriter = ChatCompletionsClient::new(&config.rewrite, llm_api_key)?;

    if let Some(dir) = markdown_output_dir.as_deref() {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Markdown output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    let store = JsonFileStore::open(data_dir).await?;
    let articles = store.list_articles().await?;
    if articles.is_empty() {
        info!("No stored articles to rewrite");
        return Ok(());
    }
    info!(count = articles.len(), "Loaded articles to rewrite");

    let fetcher = Fetcher::new(&config.fetch)?;
    let pipeline = Pipeline::new(
        &fetcher,
        &search,
        &rewriter,
        &store,
        &config.pipeline,
        &config.listing.base_url,
    );
    let report = pipeline.run(&articles).await;

    for summary in &report.rewritten {
        info!(
            article_id = summary.article_id,
            title = %summary.title,
            competitors = ?summary.competitor_urls,
            chars = summary.output.content.chars().count(),
            "Rewritten"
        );
        if let Some(dir) = markdown_output_dir.as_deref() {
            if let Err(e) = outputs::markdown::write_rewritten_article(
                dir,
                summary.article_id,
                &summary.title,
                &summary.output,
            )
            .await
            {
                warn!(article_id = summary.article_id, error = %e, "Could not write Markdown copy");
            }
        }
    }
    for skipped in &report.skipped {
        info!(
            article_id = skipped.article_id,
            title = %skipped.title,
            reason = %skipped.reason,
            "Skipped"
        );
    }
    info!(
        total = articles.len(),
        rewritten = report.rewritten.len(),
        skipped = report.skipped.len(),
        "Rewrite run complete"
    );
    Ok(())
}
