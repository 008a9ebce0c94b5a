//! Persistence for the subscription list.
//!
//! The list is written in full to a single key of a small SQLite key-value
//! table after every change, and read back once at startup.

mod kv;
mod persistence;
mod schema;
mod subscriptions;
mod types;

pub use persistence::{MemoryPersistence, SqlitePersistence, SubscriptionPersistence, STORAGE_KEY};
pub use schema::Database;
pub use subscriptions::{default_subscriptions, SubscriptionStore};
pub use types::{PersistedState, StorageError, Subscription};
