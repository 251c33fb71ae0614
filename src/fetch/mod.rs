//! Outbound requests against the remote data source

mod client;
mod request;

pub use client::{join_url, FetchClient, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
pub use request::{Method, RequestDescriptor};
