//! Cache storage for the IP geolocation client.
//!
//! Provides a key-value store capability with an in-memory (session) and a
//! SQLite-backed (persistent) implementation, plus the expiring-entry helpers
//! that layer the two into one cache.

pub mod cache;
pub mod sqlite;
pub mod store;

pub use cache::{ExpiringEntry, TieredCache};
pub use sqlite::SqliteStore;
pub use store::{KeyValueStore, MemoryStore};
