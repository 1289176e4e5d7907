//! Markdown output for rewritten articles.

use crate::models::RewriteOutput;
use crate::utils::slugify_title;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// File name for an article: the slugified title, or `article-{id}` when the
/// title has nothing to slugify.
pub fn file_name_for(article_id: u64, title: &str) -> String {
    let slug = slugify_title(title);
    if slug.is_empty() {
        format!("article-{article_id}.md")
    } else {
        format!("{slug}.md")
    }
}

/// Render the file body. Content without a leading heading gets the original
/// title as its H1.
pub fn render_article(title: &str, output: &RewriteOutput) -> String {
    let content = output.content.trim();
    if content.starts_with('#') {
        format!("{content}\n")
    } else {
        format!("# {}\n\n{content}\n", title.trim())
    }
}

/// Write one rewritten article to `{dir}/{slug}.md`, replacing any previous
/// version, and return its path.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), article_id = article_id))]
pub async fn write_rewritten_article(
    dir: &Path,
    article_id: u64,
    title: &str,
    output: &RewriteOutput,
) -> io::Result<PathBuf> {
    let path = dir.join(file_name_for(article_id, title));
    if let Err(e) = fs::write(&path, render_article(title, output)).await {
        error!(path = %path.display(), error = %e, "Failed to write Markdown");
        return Err(e);
    }
    info!(path = %path.display(), "Wrote rewritten article");
    Ok(path)
}
