//! Recently requested identifiers
//!
//! Most-recent-first, case-insensitively deduplicated, capped. The list is
//! persisted through the cache's list records, which carry no TTL.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{same_identifier, CacheKey, CacheStore};
use crate::error::Result;

/// Number of identifiers kept by default
pub const DEFAULT_HISTORY_MAX: usize = 10;

/// Bounded most-recent-first list of identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentHistory {
    entries: Vec<String>,
    max: usize,
}

impl Default for RecentHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_MAX)
    }
}

impl RecentHistory {
    pub fn new(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max,
        }
    }

    /// Rebuilds a history from stored entries, enforcing dedup and the cap
    pub fn from_entries(entries: Vec<String>, max: usize) -> Self {
        let mut history = Self::new(max);
        // Oldest first so the stored order survives
        for entry in entries.iter().rev() {
            history.record(entry);
        }
        history
    }

    /// Moves `identifier` to the front, dropping any case-insensitive duplicate
    ///
    /// The newest spelling wins. Blank identifiers are ignored.
    pub fn record(&mut self, identifier: &str) {
        let identifier = identifier.trim();
        if identifier.is_empty() || self.max == 0 {
            return;
        }
        self.entries
            .retain(|existing| !same_identifier(existing, identifier));
        self.entries.insert(0, identifier.to_string());
        self.entries.truncate(self.max);
    }

    /// Removes `identifier`; returns whether it was present
    pub fn remove(&mut self, identifier: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|existing| !same_identifier(existing, identifier));
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// Persistent history for one resource kind
///
/// Updates are load-modify-save over the cache, serialized by `lock` so
/// concurrent requests never drop each other's entries.
#[derive(Debug, Clone)]
pub(crate) struct HistoryLog {
    cache: CacheStore,
    key: CacheKey,
    max: usize,
    lock: Arc<Mutex<()>>,
}

impl HistoryLog {
    pub(crate) fn new(cache: CacheStore, kind: &str, max: usize) -> Self {
        Self {
            cache,
            key: CacheKey::history(kind),
            max,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub(crate) async fn load(&self) -> RecentHistory {
        RecentHistory::from_entries(self.cache.get_list(self.key.as_str()).await, self.max)
    }

    pub(crate) async fn record(&self, identifier: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut history = self.load().await;
        history.record(identifier);
        debug!(identifier, size = history.len(), "recorded in history");
        self.save(&history).await
    }

    pub(crate) async fn remove(&self, identifier: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut history = self.load().await;
        if !history.remove(identifier) {
            return Ok(false);
        }
        self.save(&history).await?;
        Ok(true)
    }

    pub(crate) async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.save(&RecentHistory::new(self.max)).await
    }

    async fn save(&self, history: &RecentHistory) -> Result<()> {
        self.cache
            .put_list(self.key.as_str(), history.entries(), self.max)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileStore;
    use futures::future::join_all;
    use tempfile::TempDir;

    #[test]
    fn test_record_dedups_case_insensitively() {
        let mut history = RecentHistory::new(10);
        history.record("paris");
        history.record("london");
        history.record("Paris");

        assert_eq!(history.entries(), ["Paris", "london"]);
    }

    #[test]
    fn test_record_caps_size() {
        let mut history = RecentHistory::new(3);
        for city in ["a", "b", "c", "d", "e"] {
            history.record(city);
        }

        assert_eq!(history.entries(), ["e", "d", "c"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_record_ignores_blank_and_trims() {
        let mut history = RecentHistory::default();
        history.record("   ");
        history.record("  Oslo ");

        assert_eq!(history.entries(), ["Oslo"]);
        assert_eq!(history.max(), DEFAULT_HISTORY_MAX);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = RecentHistory::new(0);
        history.record("Oslo");
        assert!(history.is_empty());
    }

    #[test]
    fn test_remove_is_case_insensitive() {
        let mut history = RecentHistory::new(10);
        history.record("Paris");
        history.record("Lima");

        assert!(history.remove("PARIS"));
        assert!(!history.remove("paris"));
        assert_eq!(history.entries(), ["Lima"]);
    }

    #[test]
    fn test_from_entries_preserves_order_and_dedups() {
        let stored = vec![
            "Lima".to_string(),
            "lima".to_string(),
            "Quito".to_string(),
            "Bogota".to_string(),
        ];
        let history = RecentHistory::from_entries(stored, 2);
        assert_eq!(history.entries(), ["Lima", "Quito"]);
    }

    #[tokio::test]
    async fn test_history_log_persists_through_cache() {
        let cache = CacheStore::in_memory();
        let log = HistoryLog::new(cache.clone(), "weather", 10);

        log.record("paris").await.unwrap();
        log.record("london").await.unwrap();
        log.record("Paris").await.unwrap();

        let reloaded = HistoryLog::new(cache.clone(), "weather", 10).load().await;
        assert_eq!(reloaded.entries(), ["Paris", "london"]);
        assert_eq!(
            cache.get_list("weather-history").await,
            vec!["Paris".to_string(), "london".to_string()]
        );
    }

    #[tokio::test]
    async fn test_history_log_remove_and_clear() {
        let log = HistoryLog::new(CacheStore::in_memory(), "weather", 10);
        log.record("Oslo").await.unwrap();
        log.record("Bergen").await.unwrap();

        assert!(log.remove("oslo").await.unwrap());
        assert!(!log.remove("oslo").await.unwrap());
        assert_eq!(log.load().await.entries(), ["Bergen"]);

        log.clear().await.unwrap();
        assert!(log.load().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_are_all_kept() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = CacheStore::new(Arc::new(FileStore::with_dir(temp_dir.path())));
        let log = HistoryLog::new(cache.clone(), "weather", 10);
        let cities = ["Paris", "Lima", "Oslo", "Quito", "Cairo", "Tokyo"];

        let results = join_all(cities.iter().map(|city| {
            let log = log.clone();
            let city = city.to_string();
            tokio::spawn(async move { log.record(&city).await })
        }))
        .await;
        for result in results {
            result.expect("task panicked").expect("record failed");
        }

        let stored = HistoryLog::new(cache, "weather", 10).load().await;
        assert_eq!(stored.len(), cities.len());
        for city in cities {
            assert!(stored.entries().iter().any(|e| e == city), "missing {city}");
        }
    }
}
