//! Background refresh after a cache hit
//!
//! When a request is answered from cache while the network is up, a detached
//! task fetches the identifier again. The task is never joined or cancelled.
//! Before committing it checks that the identifier is still the one on
//! display; if the user has moved on, the fresh value is dropped so it cannot
//! clobber newer state. Failures are logged and go nowhere else.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::resilient::Shared;
use super::resource::RemoteResource;
use crate::cache::same_identifier;

/// Messages sent from background refresh tasks to subscribers
#[derive(Debug, Clone)]
pub enum RefreshMessage<T> {
    /// Fresh data was fetched and written to the cache
    Updated { identifier: String, value: T },
    /// Fresh data arrived after the display moved to another identifier
    Discarded {
        identifier: String,
        displayed: Option<String>,
    },
}

/// The identifier the presentation layer is currently showing
///
/// Shared between the repository and its refresh tasks. Clones observe the
/// same value.
#[derive(Debug, Clone)]
pub struct DisplaySelection {
    current: Arc<watch::Sender<Option<String>>>,
}

impl Default for DisplaySelection {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySelection {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
        }
    }

    pub fn show(&self, identifier: &str) {
        self.current
            .send_replace(Some(identifier.trim().to_string()));
    }

    pub fn clear(&self) {
        self.current.send_replace(None);
    }

    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Whether `identifier` is on display (case-insensitive)
    pub fn is_showing(&self, identifier: &str) -> bool {
        self.current
            .borrow()
            .as_deref()
            .is_some_and(|shown| same_identifier(shown, identifier))
    }

    /// Watch display changes
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }
}

/// Spawns a detached refresh of `identifier`
pub(crate) fn spawn_refresh<R: RemoteResource>(shared: Arc<Shared<R>>, identifier: String) {
    tokio::spawn(run_refresh(shared, identifier));
}

async fn run_refresh<R: RemoteResource>(shared: Arc<Shared<R>>, identifier: String) {
    debug!(identifier = %identifier, "background refresh started");

    let value = match shared.fetch_fresh(&identifier).await {
        Ok(value) => value,
        Err(e) => {
            warn!(identifier = %identifier, error = %e, "background refresh failed; keeping cached data");
            return;
        }
    };

    if !shared.display.is_showing(&identifier) {
        let displayed = shared.display.current();
        debug!(
            identifier = %identifier,
            displayed = ?displayed,
            "background refresh discarded; display moved on"
        );
        let _ = shared.refreshes.send(RefreshMessage::Discarded {
            identifier,
            displayed,
        });
        return;
    }

    shared.store(&identifier, &value).await;
    info!(identifier = %identifier, "background refresh committed");
    let _ = shared
        .refreshes
        .send(RefreshMessage::Updated { identifier, value });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_selection_is_shared_between_clones() {
        let selection = DisplaySelection::new();
        let other = selection.clone();

        selection.show("  Paris ");

        assert_eq!(other.current().as_deref(), Some("Paris"));
        assert!(other.is_showing("paris"));
        assert!(!other.is_showing("London"));
    }

    #[test]
    fn test_display_selection_clear() {
        let selection = DisplaySelection::default();
        assert!(!selection.is_showing("Paris"));

        selection.show("Paris");
        selection.clear();

        assert!(selection.current().is_none());
        assert!(!selection.is_showing("Paris"));
    }

    #[tokio::test]
    async fn test_display_selection_notifies_watchers() {
        let selection = DisplaySelection::new();
        let mut watcher = selection.subscribe();

        selection.show("Lima");

        watcher.changed().await.expect("sender is alive");
        assert_eq!(watcher.borrow().as_deref(), Some("Lima"));
    }
}
