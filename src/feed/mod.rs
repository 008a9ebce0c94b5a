//! Feed retrieval and aggregation.
//!
//! - **Parsing**: RSS/Atom bytes into normalized [`Article`]s, dropping items
//!   that lack a valid link
//! - **Fetching**: one bounded HTTP request per feed, no retries
//! - **Aggregation**: all subscriptions fetched concurrently, filtered to the
//!   recency window and merged newest first
//!
//! # Architecture
//!
//! - [`parser`] - wire parsing via the `feed-rs` crate
//! - [`fetcher`] - HTTP retrieval with size limit, timeout and cancellation
//! - [`aggregator`] - the [`FeedSource`] port and the merge pipeline
//!
//! # Example
//!
//! ```ignore
//! use dayfeed::feed::{aggregate, AggregationWindow, HttpFeedSource};
//!
//! let source = HttpFeedSource::new(client, Duration::from_secs(30));
//! let result = aggregate(&source, &subscriptions, AggregationWindow::default(), &cancel).await;
//! for item in result.articles {
//!     println!("{} ({})", item.article.title, item.feed_title);
//! }
//! ```

pub mod aggregator;
pub mod fetcher;
pub mod parser;

pub use aggregator::{
    aggregate, effective_timestamp, AggregatedArticle, Aggregation, AggregationWindow, FeedSource,
    HttpFeedSource, SubscriptionOutcome, DEFAULT_RECENCY_HOURS,
};
pub use fetcher::{fetch_feed, FetchError};
pub use parser::{parse_feed, retain_valid_links, Article, ParseResult, ParsedFeed};
