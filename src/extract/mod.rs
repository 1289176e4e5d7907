//! Page classification and main-content extraction.
//!
//! - [`classify`]: is this fetched page a real article?
//! - [`content`]: strip boilerplate and convert the article body to markdown
//! - [`dom`]: selector and serialization helpers shared with the scrapers

pub mod classify;
pub mod content;
pub mod dom;

pub use classify::is_article_page;
pub use content::{extract_markdown, page_to_markdown};
