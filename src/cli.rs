//! Command-line interface definitions.
//!
//! Credentials can be passed as flags or through the environment.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Backfill a blog's oldest articles and rewrite them after competing
/// articles found through web search.
///
/// # Examples
///
/// ```sh
/// # Crawl the blog and store its oldest articles
/// blog_rewriter seed --base-url https://blog.example.com/blogs/
///
/// # Rewrite every stored article, also writing Markdown files
/// SERPAPI_KEY=... LLM_API_KEY=... blog_rewriter rewrite -m ./rewritten
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the article store
    #[arg(short, long, global = true, default_value = "./data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the blog and store its oldest articles
    Seed {
        /// Listing page URL, overriding `listing.base_url` from the config
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Rewrite stored articles and publish the results
    Rewrite {
        /// SerpApi key
        #[arg(long, env = "SERPAPI_KEY", hide_env_values = true)]
        serpapi_key: Option<String>,

        /// API key for the chat completions endpoint
        #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
        llm_api_key: Option<String>,

        /// Also write each rewritten article to this directory as Markdown
        #[arg(short, long)]
        markdown_output_dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_seed_parsing() {
        let cli = Cli::parse_from([
            "blog_rewriter",
            "--config",
            "./config.yaml",
            "seed",
            "--base-url",
            "https://blog.example.com/blogs/",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("./config.yaml")));
        assert_eq!(cli.data_dir, PathBuf::from("./data"));
        match cli.command {
            Command::Seed { base_url } => {
                assert_eq!(base_url.as_deref(), Some("https://blog.example.com/blogs/"))
            }
            other => panic!("expected seed, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_rewrite_short_flags() {
        let cli = Cli::parse_from([
            "blog_rewriter",
            "rewrite",
            "-m",
            "/tmp/markdown",
            "-d",
            "/tmp/data",
            "--serpapi-key",
            "serp",
            "--llm-api-key",
            "llm",
        ]);

        assert_eq!(cli.data_dir, PathBuf::from("/tmp/data"));
        match cli.command {
            Command::Rewrite {
                serpapi_key,
                llm_api_key,
                markdown_output_dir,
            } => {
                assert_eq!(serpapi_key.as_deref(), Some("serp"));
                assert_eq!(llm_api_key.as_deref(), Some("llm"));
                assert_eq!(markdown_output_dir, Some(PathBuf::from("/tmp/markdown")));
            }
            other => panic!("expected rewrite, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["blog_rewriter"]).is_err());
    }
}
