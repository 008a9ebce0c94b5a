//! Utility functions shared across the crate.
//!
//! - **URL validation**: link syntax checks for feed items, SSRF guards for
//!   article fetches
//! - **Text processing**: whitespace collapsing, word/char budgets, terminal
//!   width handling
//! - **Bounded execution**: one timeout-and-cancellation policy for every
//!   outbound call, plus a size-capped body reader
//!
//! # Examples
//!
//! ```
//! use dayfeed::util::{is_valid_link, truncate_words};
//!
//! assert!(is_valid_link("https://example.com/post/1"));
//! assert!(!is_valid_link("/relative/path"));
//!
//! assert_eq!(truncate_words("one two three", 2), "one two...");
//! ```

mod body;
mod bounded;
mod text;
mod url_validator;

pub use body::{read_limited_bytes, BodyError};
pub use bounded::{bounded, Interrupted};
pub use text::{
    collapse_whitespace, display_width, strip_control_chars, truncate_chars, truncate_to_width,
    truncate_words,
};
pub use url_validator::{
    is_valid_link, parse_http_url, validate_article_url, validate_url, UrlValidationError,
};
