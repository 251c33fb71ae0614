//! TTL-aware cache over a key-value backend
//!
//! Every logical entry `K` is three physical records: the JSON payload under
//! `K`, the write time in epoch milliseconds under `K-timestamp`, and the TTL
//! in milliseconds under `K-expiry`. The three writes are not atomic, so a
//! reader must treat a missing or garbled sub-record as an expired entry.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::store::{KeyValueStore, MemoryStore};
use crate::error::{Error, Result};

const TIMESTAMP_SUFFIX: &str = "-timestamp";
const EXPIRY_SUFFIX: &str = "-expiry";

/// A cached value together with its freshness metadata
#[derive(Debug, Clone)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was written
    pub stored_at: DateTime<Utc>,
    /// How long the entry was meant to stay fresh
    pub ttl: Duration,
    /// Whether the entry has expired
    pub is_expired: bool,
}

/// Reads and writes TTL-stamped entries
///
/// Cloning is cheap and clones share the same backend.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// A cache that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Writes `value` with the given time-to-live
    ///
    /// # Returns
    /// * `Ok(())` once all three records are written
    /// * `Err` (cache kind) if serialization or any backend write fails; earlier
    ///   records may already be on disk, which readers see as an expired entry
    pub async fn put<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(value)
            .map_err(|e| Error::cache_caused(format!("failed to serialize '{key}'"), e))?;
        let stored_at = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        self.write(key, payload).await?;
        self.write(&timestamp_key(key), stored_at.to_string())
            .await?;
        self.write(&expiry_key(key), ttl_ms.to_string()).await
    }

    async fn write(&self, key: &str, value: String) -> Result<()> {
        self.backend
            .set(key, value)
            .await
            .map_err(|e| Error::cache_caused(format!("failed to write '{key}'"), e))
    }

    /// Reads an unexpired entry
    ///
    /// A missing key, an expired entry and an undeserializable payload all
    /// come back as `None`; the reason is logged.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read(key, true).await
    }

    /// Reads an entry without checking expiry, for explicit inspection
    pub async fn get_unchecked<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read(key, false).await
    }

    async fn read<T: DeserializeOwned>(&self, key: &str, check_expiry: bool) -> Option<T> {
        let payload = self.read_payload(key).await?;

        if check_expiry && self.is_expired(key).await {
            debug!(key, "cache miss: entry expired or incomplete");
            return None;
        }

        decode(key, &payload)
    }

    async fn read_payload(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(Some(payload)) => Some(payload),
            Ok(None) => {
                debug!(key, "cache miss: no entry");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "cache miss: backend read failed");
                None
            }
        }
    }

    /// Returns the entry with its freshness metadata, expired or not
    ///
    /// An entry whose timestamp or TTL record is missing counts as absent.
    pub async fn inspect<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let payload = self.read_payload(key).await?;
        let Some((stored_at_ms, ttl_ms)) = self.read_stamp(key).await else {
            debug!(key, "cache entry has no complete timestamp/expiry pair");
            return None;
        };
        let data = decode(key, &payload)?;
        let stored_at = Utc.timestamp_millis_opt(stored_at_ms).single()?;

        Some(CachedData {
            data,
            stored_at,
            ttl: Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(0)),
            is_expired: is_past(stored_at_ms, ttl_ms),
        })
    }

    /// Whether `key` is expired
    ///
    /// `now > stored_at + ttl`. Fail-safe: a missing or unparsable timestamp
    /// or TTL record reports the entry as expired.
    pub async fn is_expired(&self, key: &str) -> bool {
        match self.read_stamp(key).await {
            Some((stored_at_ms, ttl_ms)) => is_past(stored_at_ms, ttl_ms),
            None => true,
        }
    }

    async fn read_stamp(&self, key: &str) -> Option<(i64, i64)> {
        let stored_at = self.read_number(&timestamp_key(key)).await?;
        let ttl = self.read_number(&expiry_key(key)).await?;
        Some((stored_at, ttl))
    }

    async fn read_number(&self, key: &str) -> Option<i64> {
        let raw = match self.backend.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "failed to read cache metadata");
                return None;
            }
        };
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "unparsable cache metadata");
                None
            }
        }
    }

    /// Whether a payload record exists for `key`, regardless of expiry
    pub async fn has_key(&self, key: &str) -> bool {
        match self.backend.contains(key).await {
            Ok(present) => present,
            Err(e) => {
                warn!(key, error = %e, "failed to check cache key");
                false
            }
        }
    }

    /// Deletes the payload and both metadata records
    ///
    /// Attempts all three deletions; if any fail the error names the
    /// sub-records that are still present.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let mut failed = Vec::new();
        for physical in [key.to_string(), timestamp_key(key), expiry_key(key)] {
            if let Err(e) = self.backend.remove(&physical).await {
                warn!(key = %physical, error = %e, "failed to remove cache record");
                failed.push(physical);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::cache(format!(
                "partially removed '{key}': could not delete {}",
                failed.join(", ")
            )))
        }
    }

    /// Deletes every entry in the backend
    pub async fn clear_all(&self) -> Result<()> {
        self.backend
            .clear()
            .await
            .map_err(|e| Error::cache_caused("failed to clear cache", e))
    }

    /// Stores a string list, keeping at most `max_items` from the front
    ///
    /// Lists carry no TTL.
    pub async fn put_list(&self, key: &str, items: &[String], max_items: usize) -> Result<()> {
        let kept = &items[..items.len().min(max_items)];
        let payload = serde_json::to_string(kept)
            .map_err(|e| Error::cache_caused(format!("failed to serialize list '{key}'"), e))?;
        self.write(key, payload).await
    }

    /// Reads a string list; missing or corrupt lists read as empty
    pub async fn get_list(&self, key: &str) -> Vec<String> {
        match self.read_payload(key).await {
            Some(payload) => decode(key, &payload).unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, payload: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "cache miss: payload does not deserialize");
            None
        }
    }
}

fn is_past(stored_at_ms: i64, ttl_ms: i64) -> bool {
    Utc::now().timestamp_millis() > stored_at_ms.saturating_add(ttl_ms)
}

fn timestamp_key(key: &str) -> String {
    format!("{key}{TIMESTAMP_SUFFIX}")
}

fn expiry_key(key: &str) -> String {
    format!("{key}{EXPIRY_SUFFIX}")
}
