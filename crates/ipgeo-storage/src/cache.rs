//! Two-tier cache over a session store and a persistent store.
//!
//! Session entries are stored as the bare serialized value and never expire.
//! Persistent entries are wrapped in an [`ExpiringEntry`] and removed lazily
//! by the first read that finds them expired.

use std::sync::Arc;

use chrono::Utc;
use ipgeo_core::StorageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::store::KeyValueStore;

/// Persistent-tier record: `{"value": ..., "expiry": <epoch ms>}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringEntry<T> {
    pub value: T,
    pub expiry: i64,
}

impl<T> ExpiringEntry<T> {
    pub fn new(value: T, now_ms: i64, ttl_ms: u64) -> Self {
        let ttl = i64::try_from(ttl_ms).unwrap_or(i64::MAX);
        Self {
            value,
            expiry: now_ms.saturating_add(ttl),
        }
    }
}

pub struct TieredCache {
    session: Arc<dyn KeyValueStore>,
    local: Arc<dyn KeyValueStore>,
}

impl TieredCache {
    pub fn new(session: Arc<dyn KeyValueStore>, local: Arc<dyn KeyValueStore>) -> Self {
        Self { session, local }
    }

    /// Look up `key`, session tier first.
    ///
    /// A session hit is returned without consulting the persistent tier. A
    /// persistent entry is returned while `now < expiry`; otherwise it is
    /// deleted and the lookup misses.
    pub fn get_from_storage<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        self.get_from_storage_at(key, now_ms())
    }

    fn get_from_storage_at<T: DeserializeOwned>(
        &self,
        key: &str,
        now: i64,
    ) -> Result<Option<T>, StorageError> {
        if let Some(raw) = self.session.get(key)?.filter(|s| !s.is_empty()) {
            match serde_json::from_str(&raw) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => discard_corrupt(self.session.as_ref(), key, &e)?,
            }
        }

        let Some(raw) = self.local.get(key)?.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        match serde_json::from_str::<ExpiringEntry<T>>(&raw) {
            Ok(entry) if now < entry.expiry => Ok(Some(entry.value)),
            Ok(_) => {
                tracing::debug!(key, "Cached entry expired");
                self.local.remove(key)?;
                Ok(None)
            }
            Err(e) => {
                discard_corrupt(self.local.as_ref(), key, &e)?;
                Ok(None)
            }
        }
    }

    /// Write `value` to the selected tiers. The two writes are independent.
    pub fn save_to_storage<T: Serialize>(
        &self,
        to_local: bool,
        to_session: bool,
        key: &str,
        value: &T,
        ttl_ms: u64,
    ) -> Result<(), StorageError> {
        self.save_to_storage_at(to_local, to_session, key, value, ttl_ms, now_ms())
    }

    fn save_to_storage_at<T: Serialize>(
        &self,
        to_local: bool,
        to_session: bool,
        key: &str,
        value: &T,
        ttl_ms: u64,
        now: i64,
    ) -> Result<(), StorageError> {
        if to_session {
            self.session.set(key, &serde_json::to_string(value)?)?;
        }
        if to_local {
            let entry = ExpiringEntry::new(value, now, ttl_ms);
            self.local.set(key, &serde_json::to_string(&entry)?)?;
        }
        Ok(())
    }

    /// Persistent-tier-only lookup. Unlike [`get_from_storage`](Self::get_from_storage),
    /// an entry is only expired once `now > expiry`.
    pub fn get_item_with_expiration<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        self.get_item_with_expiration_at(key, now_ms())
    }

    fn get_item_with_expiration_at<T: DeserializeOwned>(
        &self,
        key: &str,
        now: i64,
    ) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.local.get(key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<ExpiringEntry<T>>(&raw) {
            Ok(entry) if now > entry.expiry => {
                self.local.remove(key)?;
                Ok(None)
            }
            Ok(entry) => Ok(Some(entry.value)),
            Err(e) => {
                discard_corrupt(self.local.as_ref(), key, &e)?;
                Ok(None)
            }
        }
    }

    pub fn set_item_with_expiration<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_ms: u64,
    ) -> Result<(), StorageError> {
        let entry = ExpiringEntry::new(value, now_ms(), ttl_ms);
        self.local.set(key, &serde_json::to_string(&entry)?)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn discard_corrupt(
    store: &dyn KeyValueStore,
    key: &str,
    err: &serde_json::Error,
) -> Result<(), StorageError> {
    tracing::warn!(key, error = %err, "Discarding unreadable cache entry");
    store.remove(key)
}
