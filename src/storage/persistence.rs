use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::schema::Database;
use super::types::{PersistedState, StorageError};

/// Key under which the subscription list lives in the key-value store.
pub const STORAGE_KEY: &str = "rss-feed-storage-v2";

/// Durable home for the subscription list.
///
/// `load` runs once at startup; `save` runs after every mutation with the
/// complete list.
#[async_trait]
pub trait SubscriptionPersistence: Send + Sync {
    /// Returns the last saved state, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<PersistedState>, StorageError>;

    async fn save(&self, state: &PersistedState) -> Result<(), StorageError>;
}

/// SQLite-backed persistence: one JSON document under [`STORAGE_KEY`].
#[derive(Clone)]
pub struct SqlitePersistence {
    db: Database,
}

impl SqlitePersistence {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriptionPersistence for SqlitePersistence {
    async fn load(&self) -> Result<Option<PersistedState>, StorageError> {
        match self.db.get_value(STORAGE_KEY).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
        let json = serde_json::to_string(state)?;
        self.db.set_value(STORAGE_KEY, &json).await
    }
}

/// In-process persistence for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryPersistence {
    state: Mutex<Option<PersistedState>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `state` already saved.
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// The most recently saved state.
    pub fn snapshot(&self) -> Option<PersistedState> {
        self.slot().clone()
    }

    // Poisoning is ignored; the slot is replaced wholesale on every save.
    fn slot(&self) -> MutexGuard<'_, Option<PersistedState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SubscriptionPersistence for MemoryPersistence {
    async fn load(&self) -> Result<Option<PersistedState>, StorageError> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
        *self.slot() = Some(state.clone());
        Ok(())
    }
}
