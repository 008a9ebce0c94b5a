//! Article retrieval and readable-text extraction.

mod extract;
mod html;
mod source;

pub use extract::{extract_page, fetch_article, ContentError, ExtractedPage};
pub use html::html_to_text;
pub use source::{ArticleSource, HttpArticleSource};
