use std::sync::Arc;

use super::persistence::SubscriptionPersistence;
use super::types::{PersistedState, StorageError, Subscription};

/// Feeds a fresh installation starts with.
const DEFAULT_FEEDS: &[(&str, &str, &str)] = &[
    ("1", "The Verge", "https://www.theverge.com/rss/index.xml"),
    ("2", "Hacker News", "https://news.ycombinator.com/rss"),
    ("3", "ArXiv AI", "http://arxiv.org/rss/cs.AI"),
    ("4", "Hugging Face", "https://huggingface.co/blog/feed.xml"),
    ("5", "BBC Tech", "https://feeds.bbci.co.uk/news/technology/rss.xml"),
    ("6", "Ars Technica", "https://feeds.arstechnica.com/arstechnica/index"),
    ("7", "Wired", "https://www.wired.com/feed/rss"),
    ("8", "TechCrunch", "https://techcrunch.com/feed/"),
];

/// The built-in subscription list used when nothing has been persisted.
pub fn default_subscriptions() -> Vec<Subscription> {
    DEFAULT_FEEDS
        .iter()
        .map(|(id, title, url)| Subscription {
            id: (*id).to_string(),
            url: (*url).to_string(),
            title: (*title).to_string(),
            category: None,
        })
        .collect()
}

/// Ordered, persisted list of subscriptions.
///
/// Every successful mutation writes the full list through the persistence
/// backend before returning. If the write fails the in-memory list is rolled
/// back, so memory and disk never disagree.
pub struct SubscriptionStore {
    subscriptions: Vec<Subscription>,
    persistence: Arc<dyn SubscriptionPersistence>,
}

impl SubscriptionStore {
    /// Reads the persisted list, falling back to [`default_subscriptions`]
    /// when nothing was ever saved.
    pub async fn load(persistence: Arc<dyn SubscriptionPersistence>) -> Result<Self, StorageError> {
        let subscriptions = match persistence.load().await? {
            Some(state) => state.subscriptions,
            None => {
                tracing::info!("No saved subscriptions, starting with defaults");
                default_subscriptions()
            }
        };

        Ok(Self {
            subscriptions,
            persistence,
        })
    }

    /// Subscriptions in insertion order.
    pub fn list(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.id == id)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        let url = url.trim();
        self.subscriptions.iter().any(|s| s.url == url)
    }

    /// Appends `subscription` and persists the list.
    ///
    /// Duplicate URLs are not rejected here; callers that care check
    /// [`contains_url`](Self::contains_url) first.
    pub async fn add(&mut self, subscription: Subscription) -> Result<(), StorageError> {
        self.subscriptions.push(subscription);
        if let Err(e) = self.persist().await {
            self.subscriptions.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Removes the subscription with `id`, returning it.
    ///
    /// An unknown id is a no-op: nothing is written and `Ok(None)` comes back.
    pub async fn remove(&mut self, id: &str) -> Result<Option<Subscription>, StorageError> {
        let Some(index) = self.subscriptions.iter().position(|s| s.id == id) else {
            return Ok(None);
        };

        let removed = self.subscriptions.remove(index);
        if let Err(e) = self.persist().await {
            self.subscriptions.insert(index, removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let state = PersistedState {
            subscriptions: self.subscriptions.clone(),
        };
        self.persistence.save(&state).await
    }
}
