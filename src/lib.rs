//! Skycast library
//!
//! The fetch-with-cache-fallback layer behind the `skycast` CLI: a TTL-aware
//! key-value cache, a retrying HTTP fetch client, a connectivity probe and the
//! repository that decides per request whether to serve network data, cached
//! data, or a typed error.

pub mod cache;
pub mod cli;
pub mod config;
pub mod connectivity;
pub mod data;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod output;
pub mod repository;

pub use error::{Error, ErrorKind, Result};
