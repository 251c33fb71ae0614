//! The fetch-with-cache-fallback repository
//!
//! Per request the repository decides between fresh network data, cached
//! data, and a typed error:
//!
//! - offline: serve the per-identifier entry, else the last-used entry if it
//!   belongs to the same identifier, else fail with a Network error
//! - online: fetch, write both cache tiers, record history. On a Network or
//!   Server failure fall back to the same cache lookup; never on NotFound
//! - cache-first policy while online: serve a valid cached entry at once and
//!   refresh it in a detached task
//!
//! Panics raised while resolving are caught here and surface as Server errors.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::history::{HistoryLog, DEFAULT_HISTORY_MAX};
use super::refresh::{spawn_refresh, DisplaySelection, RefreshMessage};
use super::resource::RemoteResource;
use crate::cache::{same_identifier, CacheKey, CacheStore};
use crate::connectivity::ConnectivityProbe;
use crate::error::{Error, Result};
use crate::fetch::FetchClient;

/// Default time-to-live for fetched data
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Buffered refresh notifications per subscriber
const REFRESH_CHANNEL_CAPACITY: usize = 16;

/// Whether an online request consults the cache before the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Always fetch; the cache is only a fallback
    #[default]
    NetworkFirst,
    /// Serve valid cached data immediately and refresh in the background
    CacheFirst,
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPolicy::NetworkFirst => f.write_str("network-first"),
            FetchPolicy::CacheFirst => f.write_str("cache-first"),
        }
    }
}

/// Tunables for a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySettings {
    /// TTL for entries written after a successful fetch
    pub ttl: Duration,
    /// Maximum recent-history length
    pub history_max: usize,
    pub policy: FetchPolicy,
    /// Let the failure fallback serve expired entries too
    pub serve_expired_on_failure: bool,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            history_max: DEFAULT_HISTORY_MAX,
            policy: FetchPolicy::default(),
            serve_expired_on_failure: false,
        }
    }
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Fetched just now
    Network,
    /// A valid cache entry
    Cache,
    /// Cached data served because the fetch failed
    StaleFallback,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Network => f.write_str("network"),
            Origin::Cache => f.write_str("cache"),
            Origin::StaleFallback => f.write_str("stale-fallback"),
        }
    }
}

/// A successful answer to `get`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    /// The identifier as requested, trimmed
    pub identifier: String,
    pub value: T,
    pub origin: Origin,
}

/// Payload of the last-used slot: the value plus whom it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LastUsed<T> {
    identifier: String,
    value: T,
}

/// State shared between the repository handle and its refresh tasks
pub(crate) struct Shared<R: RemoteResource> {
    resource: R,
    cache: CacheStore,
    fetcher: FetchClient,
    probe: Arc<dyn ConnectivityProbe>,
    history: HistoryLog,
    settings: RepositorySettings,
    pub(crate) display: DisplaySelection,
    pub(crate) refreshes: broadcast::Sender<RefreshMessage<R::Value>>,
}

impl<R: RemoteResource> Shared<R> {
    pub(crate) async fn fetch_fresh(&self, identifier: &str) -> Result<R::Value> {
        let descriptor = self.resource.descriptor(identifier);
        self.fetcher
            .request(descriptor, |body| self.resource.decode(identifier, body))
            .await
    }

    /// Writes both cache tiers; a failed write is logged, not returned
    pub(crate) async fn store(&self, identifier: &str, value: &R::Value) {
        let kind = self.resource.kind();
        let ttl = self.settings.ttl;

        let per_identifier = CacheKey::for_identifier(kind, identifier);
        if let Err(e) = self.cache.put(per_identifier.as_str(), value, ttl).await {
            warn!(key = %per_identifier, error = %e, "failed to cache value");
        }

        let last_used = CacheKey::last_used(kind);
        let entry = LastUsed {
            identifier: identifier.trim().to_string(),
            value: value.clone(),
        };
        if let Err(e) = self.cache.put(last_used.as_str(), &entry, ttl).await {
            warn!(key = %last_used, error = %e, "failed to cache last-used value");
        }
    }

    /// Per-identifier entry first, then the last-used slot if it matches
    async fn lookup_cached(&self, identifier: &str, allow_expired: bool) -> Option<R::Value> {
        let kind = self.resource.kind();

        let per_identifier = CacheKey::for_identifier(kind, identifier);
        if let Some(value) = self.read(&per_identifier, allow_expired).await {
            debug!(identifier, "cache hit on per-identifier entry");
            return Some(value);
        }

        let last_used = CacheKey::last_used(kind);
        match self.read::<LastUsed<R::Value>>(&last_used, allow_expired).await {
            Some(entry) if same_identifier(&entry.identifier, identifier) => {
                debug!(identifier, "cache hit on last-used entry");
                Some(entry.value)
            }
            Some(entry) => {
                debug!(identifier, cached = %entry.identifier, "last-used entry belongs to another identifier");
                None
            }
            None => None,
        }
    }

    async fn read<T: serde::de::DeserializeOwned>(&self, key: &CacheKey, allow_expired: bool) -> Option<T> {
        if allow_expired {
            self.cache.get_unchecked(key.as_str()).await
        } else {
            self.cache.get(key.as_str()).await
        }
    }
}

/// Resolves identifiers of one resource kind against network and cache
///
/// Cloning is cheap; clones share cache, history, display selection and the
/// refresh channel.
pub struct ResilientRepository<R: RemoteResource> {
    shared: Arc<Shared<R>>,
}

impl<R: RemoteResource> Clone for ResilientRepository<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: RemoteResource> fmt::Debug for ResilientRepository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientRepository")
            .field("kind", &self.shared.resource.kind())
            .field("cache", &self.shared.cache)
            .field("settings", &self.shared.settings)
            .finish()
    }
}

impl<R: RemoteResource> ResilientRepository<R> {
    pub fn new(
        resource: R,
        cache: CacheStore,
        fetcher: FetchClient,
        probe: Arc<dyn ConnectivityProbe>,
        settings: RepositorySettings,
    ) -> Self {
        let history = HistoryLog::new(cache.clone(), resource.kind(), settings.history_max);
        let (refreshes, _) = broadcast::channel(REFRESH_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                resource,
                cache,
                fetcher,
                probe,
                history,
                settings,
                display: DisplaySelection::new(),
                refreshes,
            }),
        }
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.shared.settings
    }

    /// Resolves `identifier`
    ///
    /// # Returns
    /// * `Ok(Resolved)` - fresh data, a valid cache hit, or cached data
    ///   standing in for a failed fetch
    /// * `Err(Error)` - NotFound (never masked by cache), Authorization, or
    ///   Network/Server when no usable cache entry exists
    pub async fn get(&self, identifier: &str) -> Result<Resolved<R::Value>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(Error::NotFound {
                message: "an empty identifier names no resource".to_string(),
                identifier: String::new(),
                cause: None,
            });
        }

        match AssertUnwindSafe(self.resolve(identifier)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(identifier, reason = %reason, "resolving identifier panicked");
                Err(Error::server(
                    format!("internal failure while resolving '{identifier}': {reason}"),
                    None,
                ))
            }
        }
    }

    async fn resolve(&self, identifier: &str) -> Result<Resolved<R::Value>> {
        let shared = &self.shared;

        if !shared.probe.is_connected().await {
            debug!(identifier, "offline; consulting cache");
            return match shared.lookup_cached(identifier, false).await {
                Some(value) => Ok(self.accept(identifier, value, Origin::Cache).await),
                None => Err(Error::network(format!(
                    "no connectivity and no cached data for '{identifier}'"
                ))),
            };
        }

        if shared.settings.policy == FetchPolicy::CacheFirst {
            if let Some(value) = shared.lookup_cached(identifier, false).await {
                let resolved = self.accept(identifier, value, Origin::Cache).await;
                spawn_refresh(Arc::clone(shared), identifier.to_string());
                return Ok(resolved);
            }
        }

        match shared.fetch_fresh(identifier).await {
            Ok(value) => {
                shared.store(identifier, &value).await;
                Ok(self.accept(identifier, value, Origin::Network).await)
            }
            Err(e) if e.allows_cache_fallback() => {
                let allow_expired = shared.settings.serve_expired_on_failure;
                match shared.lookup_cached(identifier, allow_expired).await {
                    Some(value) => {
                        info!(identifier, error = %e, "fetch failed; serving cached data");
                        Ok(self.accept(identifier, value, Origin::StaleFallback).await)
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Bookkeeping for an answer to an explicit request
    async fn accept(&self, identifier: &str, value: R::Value, origin: Origin) -> Resolved<R::Value> {
        if let Err(e) = self.shared.history.record(identifier).await {
            warn!(identifier, error = %e, "failed to update recent history");
        }
        self.shared.display.show(identifier);
        debug!(identifier, %origin, "resolved");

        Resolved {
            identifier: identifier.to_string(),
            value,
            origin,
        }
    }

    /// Seeds both cache tiers as a successful fetch would, without history
    pub async fn remember(&self, identifier: &str, value: &R::Value) {
        self.shared.store(identifier, value).await;
    }

    /// Cached value for `identifier`, read with the offline rules
    pub async fn peek(&self, identifier: &str) -> Option<R::Value> {
        self.shared.lookup_cached(identifier, false).await
    }

    /// Most-recent-first identifiers of past successful requests
    pub async fn recent_history(&self) -> Vec<String> {
        self.shared.history.load().await.into_entries()
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.shared.history.clear().await
    }

    /// Drops the cached entries and history entry for `identifier`
    ///
    /// The last-used slot is only removed when it belongs to `identifier`.
    pub async fn forget(&self, identifier: &str) -> Result<()> {
        let shared = &self.shared;
        let kind = shared.resource.kind();

        shared
            .cache
            .remove(CacheKey::for_identifier(kind, identifier).as_str())
            .await?;

        let last_used = CacheKey::last_used(kind);
        let owned_by_identifier = shared
            .cache
            .get_unchecked::<LastUsed<R::Value>>(last_used.as_str())
            .await
            .is_some_and(|entry| same_identifier(&entry.identifier, identifier));
        if owned_by_identifier {
            shared.cache.remove(last_used.as_str()).await?;
        }

        shared.history.remove(identifier).await?;
        info!(identifier, "forgot cached data");
        Ok(())
    }

    /// Empties the whole cache, history included
    pub async fn clear_cache(&self) -> Result<()> {
        self.shared.cache.clear_all().await?;
        info!("cache cleared");
        Ok(())
    }

    /// Marks `identifier` as the one on display
    pub fn display(&self, identifier: &str) {
        self.shared.display.show(identifier);
    }

    pub fn clear_display(&self) {
        self.shared.display.clear();
    }

    pub fn displayed(&self) -> Option<String> {
        self.shared.display.current()
    }

    /// Receives the outcome of background refreshes started after this call
    pub fn subscribe_refreshes(&self) -> broadcast::Receiver<RefreshMessage<R::Value>> {
        self.shared.refreshes.subscribe()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
