//! What the repository fetches
//!
//! A `RemoteResource` names a resource kind (the cache-key prefix), builds the
//! request for an identifier, and decodes the answer. The repository handles
//! everything else.

use serde::{de::DeserializeOwned, Serialize};

use crate::fetch::RequestDescriptor;

pub trait RemoteResource: Send + Sync + 'static {
    /// The decoded value handed to callers and stored in the cache
    type Value: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Error raised when a 2xx body cannot be turned into a value
    type DecodeError: std::error::Error + Send + Sync + 'static;

    /// Cache-key prefix, e.g. `"weather"`
    fn kind(&self) -> &'static str;

    /// The request that fetches `identifier`
    ///
    /// Should mark the descriptor as a lookup so a 404 becomes not-found.
    fn descriptor(&self, identifier: &str) -> RequestDescriptor;

    fn decode(&self, identifier: &str, body: &[u8]) -> Result<Self::Value, Self::DecodeError>;
}
