//! Files written for human review after a rewrite run.
//!
//! # Submodules
//!
//! - [`markdown`]: one Markdown file per rewritten article
//!
//! # Output Structure
//!
//! ```text
//! markdown_output_dir/
//! ├── chatbots-vs-live-chat.md
//! └── article-7.md          # title had nothing to slugify
//! ```

pub mod markdown;
