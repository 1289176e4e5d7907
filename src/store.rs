//! Persistence for crawled and rewritten articles.
//!
//! [`ArticleStore`] is what the seed and rewrite runners talk to. The
//! bundled [`JsonFileStore`] keeps everything in two JSON files inside a data
//! directory:
//!
//! ```text
//! data_dir/
//! ├── articles.json    # ArticleRecord, keyed by article_url
//! └── rewritten.json   # RewrittenArticleRecord, keyed by original_article_id
//! ```
//!
//! Upserts replace the record with the same key in place. Every write goes
//! to a temporary file that is then renamed over the old one.

use crate::error::StoreError;
use crate::models::{ArticleRecord, NewArticle, Reference, RewrittenArticleRecord};
use crate::utils::ensure_writable_dir;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

const ARTICLES_FILE: &str = "articles.json";
const REWRITTEN_FILE: &str = "rewritten.json";

pub trait ArticleStore {
    /// Every stored article, oldest published first.
    async fn list_articles(&self) -> Result<Vec<ArticleRecord>, StoreError>;

    /// URLs of all stored articles.
    async fn existing_urls(&self) -> Result<HashSet<String>, StoreError>;

    /// Insert the article, or update the stored one with the same URL.
    async fn upsert_article(&self, article: NewArticle) -> Result<ArticleRecord, StoreError>;

    /// Insert or replace the rewrite of article `original_article_id`.
    async fn upsert_rewritten(
        &self,
        original_article_id: u64,
        content: &str,
        references: &[Reference],
    ) -> Result<RewrittenArticleRecord, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    articles: Vec<ArticleRecord>,
    rewritten: Vec<RewrittenArticleRecord>,
}

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// Open the store in `dir`, creating the directory when needed. Missing
    /// files start out empty.
    #[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        ensure_writable_dir(dir).await.map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let articles: Vec<ArticleRecord> = read_table(&dir.join(ARTICLES_FILE)).await?;
        let rewritten: Vec<RewrittenArticleRecord> = read_table(&dir.join(REWRITTEN_FILE)).await?;
        info!(
            articles = articles.len(),
            rewritten = rewritten.len(),
            "Opened article store"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            tables: Mutex::new(Tables {
                articles,
                rewritten,
            }),
        })
    }
}

impl ArticleStore for JsonFileStore {
    async fn list_articles(&self) -> Result<Vec<ArticleRecord>, StoreError> {
        let mut articles = self.tables.lock().await.articles.clone();
        articles.sort_by_key(|a| a.published_date);
        Ok(articles)
    }

    async fn existing_urls(&self) -> Result<HashSet<String>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.articles.iter().map(|a| a.article_url.clone()).collect())
    }

    #[instrument(level = "debug", skip_all, fields(url = %article.candidate.url))]
    async fn upsert_article(&self, article: NewArticle) -> Result<ArticleRecord, StoreError> {
        let mut tables = self.tables.lock().await;
        let NewArticle {
            candidate,
            html_content,
        } = article;
        let scraped_at = Utc::now();

        // Changes land in memory only once the file write succeeds.
        let mut articles = tables.articles.clone();
        let record = match articles.iter_mut().find(|a| a.article_url == candidate.url) {
            Some(existing) => {
                existing.title = candidate.title;
                existing.author = candidate.author;
                existing.published_date = candidate.published_date;
                existing.html_content = html_content;
                existing.scraped_at = scraped_at;
                debug!(id = existing.id, "Updated stored article");
                existing.clone()
            }
            None => {
                let id = articles.iter().map(|a| a.id).max().unwrap_or(0) + 1;
                let record = ArticleRecord {
                    id,
                    title: candidate.title,
                    author: candidate.author,
                    published_date: candidate.published_date,
                    article_url: candidate.url,
                    html_content,
                    scraped_at,
                };
                articles.push(record.clone());
                debug!(id, "Inserted article");
                record
            }
        };

        write_table(&self.dir.join(ARTICLES_FILE), &articles).await?;
        tables.articles = articles;
        Ok(record)
    }

    #[instrument(level = "debug", skip(self, content, references))]
    async fn upsert_rewritten(
        &self,
        original_article_id: u64,
        content: &str,
        references: &[Reference],
    ) -> Result<RewrittenArticleRecord, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.articles.iter().any(|a| a.id == original_article_id) {
            return Err(StoreError::UnknownArticle(original_article_id));
        }

        let record = RewrittenArticleRecord {
            original_article_id,
            rewritten_content: content.to_string(),
            references: references.to_vec(),
            generated_at: Utc::now(),
        };
        let mut rewritten = tables.rewritten.clone();
        match rewritten
            .iter_mut()
            .find(|r| r.original_article_id == original_article_id)
        {
            Some(existing) => *existing = record.clone(),
            None => rewritten.push(record.clone()),
        }

        write_table(&self.dir.join(REWRITTEN_FILE), &rewritten).await?;
        tables.rewritten = rewritten;
        Ok(record)
    }
}

async fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(rows).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, json).await.map_err(io_err)?;
    fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
