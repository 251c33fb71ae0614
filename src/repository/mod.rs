//! Repository layer: fallback policy, background refresh, recent history

pub mod history;
pub mod refresh;
pub mod resilient;
pub mod resource;

pub use history::{RecentHistory, DEFAULT_HISTORY_MAX};
pub use refresh::{DisplaySelection, RefreshMessage};
pub use resilient::{
    FetchPolicy, Origin, RepositorySettings, Resolved, ResilientRepository, DEFAULT_TTL,
};
pub use resource::RemoteResource;
