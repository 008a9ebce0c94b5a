//! Application state and the operations every front end shares.
//!
//! [`App`] owns the subscription store, the last aggregated board and the
//! ports to the outside world (feeds, article pages, the model). The CLI and
//! the HTTP API are thin adapters over its methods.

use chrono::{DateTime, Utc};
use reqwest::redirect::Policy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, API_KEY_ENV};
use crate::content::{ArticleSource, HttpArticleSource};
use crate::feed::{
    aggregate, AggregatedArticle, Aggregation, AggregationWindow, FeedSource, FetchError,
    HttpFeedSource, ParsedFeed, SubscriptionOutcome,
};
use crate::insight::{
    self, Analysis, Briefing, BriefingArticle, InsightError, Summary, SummaryRequest,
};
use crate::llm::{AnthropicClient, CompletionModel};
use crate::storage::{StorageError, Subscription, SubscriptionPersistence, SubscriptionStore};
use crate::util::parse_http_url;

/// Title given to a subscription whose feed does not name itself.
pub const UNKNOWN_FEED_TITLE: &str = "Unknown Feed";

const MAX_REDIRECTS: usize = 5;
const MAX_RECENCY_HOURS: u64 = 24 * 365 * 1000;

/// Follows up to five redirects, refusing loops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 5)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Shared HTTP client for feeds, pages and the model API.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .user_agent(concat!("dayfeed/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    #[error("Already subscribed to {0}")]
    Duplicate(String),
    #[error("Could not load feed: {0}")]
    Feed(#[from] FetchError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Per-URL result of a bulk import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ImportOutcome {
    Added { subscription: Subscription },
    Skipped { url: String },
    Failed { url: String, error: String },
}

/// The most recently applied aggregation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub articles: Vec<AggregatedArticle>,
    pub outcomes: Vec<SubscriptionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Sequence number of the refresh that produced this board; 0 before
    /// the first refresh.
    #[serde(skip)]
    pub sequence: u64,
}

/// Result of one [`App::refresh`] call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub sequence: u64,
    /// A newer refresh was started before this one finished, so its result
    /// was discarded and the board left untouched.
    pub stale: bool,
    pub articles: Vec<AggregatedArticle>,
    pub outcomes: Vec<SubscriptionOutcome>,
}

pub struct App {
    config: Config,
    store: Mutex<SubscriptionStore>,
    board: RwLock<Board>,
    feeds: Arc<dyn FeedSource>,
    pages: Arc<dyn ArticleSource>,
    model: Arc<dyn CompletionModel>,
    refresh_sequence: AtomicU64,
    shutdown: CancellationToken,
}

impl App {
    pub fn new(
        config: Config,
        store: SubscriptionStore,
        feeds: Arc<dyn FeedSource>,
        pages: Arc<dyn ArticleSource>,
        model: Arc<dyn CompletionModel>,
    ) -> Self {
        Self {
            config,
            store: Mutex::new(store),
            board: RwLock::new(Board::default()),
            feeds,
            pages,
            model,
            refresh_sequence: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// Wires the HTTP-backed sources and the Anthropic client from `config`.
    pub async fn from_config(
        config: Config,
        persistence: Arc<dyn SubscriptionPersistence>,
    ) -> anyhow::Result<Self> {
        let http = build_http_client()?;
        let store = SubscriptionStore::load(persistence).await?;

        let api_key = config.resolve_api_key(std::env::var(API_KEY_ENV).ok());
        if api_key.is_none() {
            tracing::warn!("No model API key configured; summaries, analyses and briefings will fail");
        }

        let feeds = HttpFeedSource::new(http.clone(), config.request_timeout());
        let pages = HttpArticleSource::new(http.clone(), config.article_timeout())
            .allow_private_hosts(config.allow_private_hosts);
        let model = AnthropicClient::new(
            http,
            api_key,
            config.anthropic_base_url.clone(),
            config.model.clone(),
            config.request_timeout(),
        );

        Ok(Self::new(
            config,
            store,
            Arc::new(feeds),
            Arc::new(pages),
            Arc::new(model),
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A token cancelled by [`shutdown`](Self::shutdown) or by its holder.
    pub fn cancel_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancels every in-flight operation.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.store.lock().await.list().to_vec()
    }

    /// Fetches and parses one feed without subscribing to it.
    pub async fn lookup_feed(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ParsedFeed, FetchError> {
        self.feeds.fetch(url, cancel).await
    }

    /// Subscribes to `url` after confirming it serves a readable feed.
    ///
    /// The title is the feed's own title, or [`UNKNOWN_FEED_TITLE`].
    pub async fn subscribe(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Subscription, SubscribeError> {
        let url = parse_http_url(url)
            .map_err(|e| SubscribeError::InvalidUrl(e.to_string()))?;
        let url = url.as_str().trim().to_string();

        if self.store.lock().await.contains_url(&url) {
            return Err(SubscribeError::Duplicate(url));
        }

        let feed = self.feeds.fetch(&url, cancel).await?;
        let title = feed
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_FEED_TITLE.to_string());

        let mut store = self.store.lock().await;
        // Another subscribe may have won while the feed was loading
        if store.contains_url(&url) {
            return Err(SubscribeError::Duplicate(url));
        }
        let subscription = Subscription::new(url, title);
        store.add(subscription.clone()).await?;

        tracing::info!(id = %subscription.id, feed = %subscription.url, title = %subscription.title, "Subscribed");
        Ok(subscription)
    }

    /// Removes a subscription; unknown ids are a no-op returning `None`.
    pub async fn unsubscribe(&self, id: &str) -> Result<Option<Subscription>, StorageError> {
        let removed = self.store.lock().await.remove(id).await?;
        match &removed {
            Some(sub) => tracing::info!(id = %id, feed = %sub.url, "Unsubscribed"),
            None => tracing::debug!(id = %id, "Unsubscribe of unknown id ignored"),
        }
        Ok(removed)
    }

    /// Subscribes to each URL in turn, skipping ones already present.
    pub async fn import(&self, urls: &[String], cancel: &CancellationToken) -> Vec<ImportOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            if cancel.is_cancelled() {
                outcomes.push(ImportOutcome::Failed {
                    url: url.clone(),
                    error: "Import cancelled".to_string(),
                });
                continue;
            }
            let outcome = match self.subscribe(url, cancel).await {
                Ok(subscription) => ImportOutcome::Added { subscription },
                Err(SubscribeError::Duplicate(url)) => ImportOutcome::Skipped { url },
                Err(e) => {
                    tracing::warn!(feed = %url, error = %e, "Import failed");
                    ImportOutcome::Failed {
                        url: url.clone(),
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    // ========================================================================
    // Aggregation
    // ========================================================================

    /// Aggregates every subscription and replaces the board with the result.
    ///
    /// Each call takes the next sequence number. When the aggregation
    /// finishes after a newer call has started, its result is reported with
    /// `stale: true` and not applied.
    pub async fn refresh(&self, cancel: &CancellationToken) -> RefreshReport {
        let sequence = self.refresh_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let subscriptions = self.subscriptions().await;
        let window = AggregationWindow::ending_now(self.recency_hours());

        let Aggregation { articles, outcomes } =
            aggregate(self.feeds.as_ref(), &subscriptions, window, cancel).await;

        let mut board = self.board.write().await;
        let stale = self.refresh_sequence.load(Ordering::SeqCst) != sequence;
        if stale {
            tracing::info!(sequence, "Discarding stale refresh result");
        } else {
            *board = Board {
                articles: articles.clone(),
                outcomes: outcomes.clone(),
                refreshed_at: Some(window.now),
                sequence,
            };
        }

        RefreshReport {
            sequence,
            stale,
            articles,
            outcomes,
        }
    }

    /// The last applied aggregation.
    pub async fn board(&self) -> Board {
        self.board.read().await.clone()
    }

    fn recency_hours(&self) -> i64 {
        // chrono rejects durations beyond ~292 million years
        self.config.recency_window_hours.min(MAX_RECENCY_HOURS) as i64
    }

    // ========================================================================
    // Insight services
    // ========================================================================

    pub async fn analyze(
        &self,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<Analysis, InsightError> {
        insight::analyze(self.model.as_ref(), content, cancel).await
    }

    pub async fn summarize(
        &self,
        request: &SummaryRequest,
        cancel: &CancellationToken,
    ) -> Result<Summary, InsightError> {
        insight::summarize(self.model.as_ref(), self.pages.as_ref(), request, cancel).await
    }

    /// Briefing over caller-supplied articles; `None` when there are none.
    pub async fn briefing(
        &self,
        articles: &[BriefingArticle],
        cancel: &CancellationToken,
    ) -> Result<Option<Briefing>, InsightError> {
        insight::brief(
            self.model.as_ref(),
            articles,
            self.config.briefing_max_articles,
            cancel,
        )
        .await
    }

    /// Briefing over the current board.
    pub async fn daily_briefing(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Briefing>, InsightError> {
        let articles: Vec<BriefingArticle> = self
            .board
            .read()
            .await
            .articles
            .iter()
            .map(BriefingArticle::from)
            .collect();
        self.briefing(&articles, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentError, ExtractedPage};
    use crate::feed::Article;
    use crate::insight::testing::ScriptedModel;
    use crate::storage::{MemoryPersistence, PersistedState};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, SecondsFormat};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    struct NoPages;

    #[async_trait]
    impl ArticleSource for NoPages {
        async fn fetch(
            &self,
            _url: &str,
            _cancel: &CancellationToken,
        ) -> Result<ExtractedPage, ContentError> {
            Err(ContentError::HttpStatus(404))
        }
    }

    /// Feeds keyed by URL. With `hold_first`, the first fetch signals
    /// `entered` and waits for `release`.
    #[derive(Default)]
    struct StubFeeds {
        feeds: HashMap<String, ParsedFeed>,
        hold_first: bool,
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl FeedSource for StubFeeds {
        async fn fetch(
            &self,
            url: &str,
            _cancel: &CancellationToken,
        ) -> Result<ParsedFeed, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hold_first && call == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.feeds.get(url).cloned().ok_or(FetchError::HttpStatus(404))
        }
    }

    fn recent_article(title: &str) -> Article {
        let when = Utc::now() - ChronoDuration::hours(1);
        Article {
            title: title.into(),
            link: format!("https://example.com/{}", title),
            pub_date: None,
            content: None,
            content_snippet: Some(format!("{} snippet", title)),
            iso_date: Some(when.to_rfc3339_opts(SecondsFormat::Millis, true)),
            categories: vec![],
        }
    }

    fn feed(title: Option<&str>, items: Vec<Article>) -> ParsedFeed {
        ParsedFeed {
            title: title.map(Into::into),
            items,
            ..ParsedFeed::default()
        }
    }

    async fn app_with(feeds: Arc<StubFeeds>, subs: Vec<Subscription>, model: ScriptedModel) -> App {
        let persistence = Arc::new(MemoryPersistence::with_state(PersistedState {
            subscriptions: subs,
        }));
        let store = SubscriptionStore::load(persistence).await.unwrap();
        App::new(
            Config::default(),
            store,
            feeds,
            Arc::new(NoPages),
            Arc::new(model),
        )
    }

    #[tokio::test]
    async fn test_subscribe_uses_feed_title() {
        let mut feeds = StubFeeds::default();
        feeds.feeds.insert(
            "https://a.example.com/rss".into(),
            feed(Some("Feed A"), vec![]),
        );
        feeds
            .feeds
            .insert("https://b.example.com/rss".into(), feed(Some("  "), vec![]));
        let app = app_with(Arc::new(feeds), vec![], ScriptedModel::replying("{}")).await;
        let cancel = CancellationToken::new();

        let a = app.subscribe("https://a.example.com/rss", &cancel).await.unwrap();
        assert_eq!(a.title, "Feed A");
        let b = app.subscribe("https://b.example.com/rss", &cancel).await.unwrap();
        assert_eq!(b.title, UNKNOWN_FEED_TITLE);
        assert_eq!(app.subscriptions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_duplicates_and_bad_urls() {
        let mut feeds = StubFeeds::default();
        feeds.feeds.insert(
            "https://a.example.com/rss".into(),
            feed(Some("Feed A"), vec![]),
        );
        let app = app_with(Arc::new(feeds), vec![], ScriptedModel::replying("{}")).await;
        let cancel = CancellationToken::new();

        app.subscribe("https://a.example.com/rss", &cancel).await.unwrap();
        assert!(matches!(
            app.subscribe("https://a.example.com/rss", &cancel).await,
            Err(SubscribeError::Duplicate(_))
        ));
        assert!(matches!(
            app.subscribe("ftp://a.example.com/rss", &cancel).await,
            Err(SubscribeError::InvalidUrl(_))
        ));
        assert!(matches!(
            app.subscribe("https://missing.example.com/rss", &cancel).await,
            Err(SubscribeError::Feed(FetchError::HttpStatus(404)))
        ));
        assert_eq!(app.subscriptions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_import_reports_each_url() {
        let mut feeds = StubFeeds::default();
        feeds.feeds.insert(
            "https://a.example.com/rss".into(),
            feed(Some("Feed A"), vec![]),
        );
        let existing = Subscription::new("https://old.example.com/rss", "Old");
        let app = app_with(Arc::new(feeds), vec![existing], ScriptedModel::replying("{}")).await;

        let outcomes = app
            .import(
                &[
                    "https://a.example.com/rss".to_string(),
                    "https://old.example.com/rss".to_string(),
                    "https://dead.example.com/rss".to_string(),
                ],
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(outcomes[0], ImportOutcome::Added { .. }));
        assert!(matches!(outcomes[1], ImportOutcome::Skipped { .. }));
        assert!(matches!(outcomes[2], ImportOutcome::Failed { .. }));
        assert_eq!(app.subscriptions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_populates_board() {
        let mut feeds = StubFeeds::default();
        feeds.feeds.insert(
            "https://a.example.com/rss".into(),
            feed(Some("A"), vec![recent_article("one")]),
        );
        let sub = Subscription::new("https://a.example.com/rss", "Feed A");
        let app = app_with(Arc::new(feeds), vec![sub], ScriptedModel::replying("{}")).await;

        let report = app.refresh(&CancellationToken::new()).await;
        assert!(!report.stale);
        assert_eq!(report.articles.len(), 1);

        let board = app.board().await;
        assert_eq!(board.articles[0].feed_title, "Feed A");
        assert_eq!(board.sequence, report.sequence);
        assert!(board.refreshed_at.is_some());
    }

    #[tokio::test]
    async fn test_overlapping_refresh_discards_older_result() {
        let mut feeds = StubFeeds::default();
        feeds.feeds.insert(
            "https://a.example.com/rss".into(),
            feed(Some("A"), vec![recent_article("one")]),
        );
        feeds.hold_first = true;
        let feeds = Arc::new(feeds);
        let sub = Subscription::new("https://a.example.com/rss", "Feed A");
        let app = Arc::new(app_with(feeds.clone(), vec![sub], ScriptedModel::replying("{}")).await);

        let first = {
            let app = app.clone();
            tokio::spawn(async move { app.refresh(&CancellationToken::new()).await })
        };
        feeds.entered.notified().await;

        let second = app.refresh(&CancellationToken::new()).await;
        assert!(!second.stale);

        feeds.release.notify_one();
        let first = first.await.unwrap();

        assert!(first.stale);
        assert!(first.sequence < second.sequence);
        assert_eq!(app.board().await.sequence, second.sequence);
    }

    #[tokio::test]
    async fn test_daily_briefing_with_empty_board_skips_model() {
        let model = Arc::new(ScriptedModel::replying("{}"));
        let persistence = Arc::new(MemoryPersistence::with_state(PersistedState::default()));
        let app = App::new(
            Config::default(),
            SubscriptionStore::load(persistence).await.unwrap(),
            Arc::new(StubFeeds::default()),
            Arc::new(NoPages),
            model.clone(),
        );

        let result = app.daily_briefing(&CancellationToken::new()).await.unwrap();
        assert!(result.is_none());
        assert_eq!(model.calls(), 0);
    }
}
