//! Cache module for persisting fetched resources
//!
//! `CacheStore` layers TTL bookkeeping over any `KeyValueStore` backend. Reads
//! are fail-safe: anything incomplete or unreadable is a miss, never an error,
//! so callers can always fall through to the network or to a typed failure.

mod key;
mod manager;
mod store;

pub use key::{normalize_identifier, same_identifier, CacheKey};
pub use manager::{CacheStore, CachedData};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
