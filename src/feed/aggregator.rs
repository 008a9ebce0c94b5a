use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::feed::fetcher::{fetch_feed, FetchError};
use crate::feed::parser::{Article, ParsedFeed};
use crate::storage::Subscription;

/// Default lookback for the aggregated view.
pub const DEFAULT_RECENCY_HOURS: i64 = 48;

/// Where feeds come from. The HTTP implementation is [`HttpFeedSource`];
/// tests substitute canned feeds.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<ParsedFeed, FetchError>;
}

/// Fetches feeds over HTTP with one timeout applied to every request.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<ParsedFeed, FetchError> {
        fetch_feed(&self.client, url, self.timeout, cancel).await
    }
}

/// An [`Article`] tagged with the title of the subscription it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedArticle {
    #[serde(flatten)]
    pub article: Article,
    pub feed_title: String,
}

/// The instant an aggregation runs at and how far back it looks.
#[derive(Debug, Clone, Copy)]
pub struct AggregationWindow {
    pub now: DateTime<Utc>,
    pub lookback: ChronoDuration,
}

impl AggregationWindow {
    pub fn ending_now(hours: i64) -> Self {
        Self {
            now: Utc::now(),
            lookback: ChronoDuration::hours(hours),
        }
    }

    /// Items at or before this instant are dropped.
    pub fn cutoff(&self) -> DateTime<Utc> {
        self.now - self.lookback
    }
}

impl Default for AggregationWindow {
    fn default() -> Self {
        Self::ending_now(DEFAULT_RECENCY_HOURS)
    }
}

/// What happened to one subscription during an aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOutcome {
    pub subscription_id: String,
    pub feed_title: String,
    /// Number of items contributed after the recency filter, or the fetch
    /// error rendered as text.
    #[serde(with = "outcome_result")]
    pub result: Result<usize, String>,
}

/// Result of one aggregation run.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Recent items from every subscription, newest first.
    pub articles: Vec<AggregatedArticle>,
    /// One entry per subscription, in subscription order.
    pub outcomes: Vec<SubscriptionOutcome>,
}

impl Aggregation {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

/// Best available timestamp for ordering and filtering.
///
/// Prefers the normalized ISO date, then the original publish date (RFC 2822
/// or RFC 3339), then the Unix epoch.
pub fn effective_timestamp(article: &Article) -> DateTime<Utc> {
    article
        .iso_date
        .as_deref()
        .and_then(parse_rfc3339)
        .or_else(|| {
            article.pub_date.as_deref().and_then(|raw| {
                DateTime::parse_from_rfc2822(raw.trim())
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
                    .or_else(|| parse_rfc3339(raw))
            })
        })
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fetches every subscription concurrently and merges the recent items.
///
/// Each subscription is an independent branch of a joined future set; a
/// branch that fails is logged, reported in [`Aggregation::outcomes`] and
/// contributes nothing, without affecting the others. Surviving items have
/// an effective timestamp strictly after [`AggregationWindow::cutoff`] and
/// are sorted newest first (stable among equal timestamps).
pub async fn aggregate(
    source: &dyn FeedSource,
    subscriptions: &[Subscription],
    window: AggregationWindow,
    cancel: &CancellationToken,
) -> Aggregation {
    let cutoff = window.cutoff();

    let branches = subscriptions.iter().map(|sub| async move {
        match source.fetch(&sub.url, cancel).await {
            Ok(feed) => {
                let recent: Vec<(DateTime<Utc>, AggregatedArticle)> = feed
                    .items
                    .into_iter()
                    .map(|article| (effective_timestamp(&article), article))
                    .filter(|(ts, _)| *ts > cutoff)
                    .map(|(ts, article)| {
                        (
                            ts,
                            AggregatedArticle {
                                article,
                                feed_title: sub.title.clone(),
                            },
                        )
                    })
                    .collect();

                let outcome = SubscriptionOutcome {
                    subscription_id: sub.id.clone(),
                    feed_title: sub.title.clone(),
                    result: Ok(recent.len()),
                };
                (outcome, recent)
            }
            Err(e) => {
                tracing::warn!(feed = %sub.url, title = %sub.title, error = %e, "Failed to fetch feed");
                let outcome = SubscriptionOutcome {
                    subscription_id: sub.id.clone(),
                    feed_title: sub.title.clone(),
                    result: Err(e.to_string()),
                };
                (outcome, Vec::new())
            }
        }
    });

    let results = join_all(branches).await;

    let mut outcomes = Vec::with_capacity(results.len());
    let mut merged = Vec::new();
    for (outcome, items) in results {
        outcomes.push(outcome);
        merged.extend(items);
    }

    merged.sort_by_key(|(ts, _)| Reverse(*ts));
    let articles: Vec<AggregatedArticle> = merged.into_iter().map(|(_, a)| a).collect();

    tracing::info!(
        subscriptions = subscriptions.len(),
        failed = outcomes.iter().filter(|o| o.result.is_err()).count(),
        articles = articles.len(),
        "Aggregation complete"
    );

    Aggregation { articles, outcomes }
}

mod outcome_result {
    use serde::ser::SerializeMap;
    use serde::Serializer;

    pub fn serialize<S>(value: &Result<usize, String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        match value {
            Ok(count) => map.serialize_entry("articles", count)?,
            Err(message) => map.serialize_entry("error", message)?,
        }
        map.end()
    }
}
