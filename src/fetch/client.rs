//! HTTP fetch client with retry and error classification
//!
//! Timeouts, connection failures, 5xx answers and unclassified transport
//! errors are retried immediately, with the same descriptor, up to the
//! descriptor's retry budget. 4xx answers and undecodable 2xx bodies are
//! terminal on the first attempt.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use super::request::RequestDescriptor;
use crate::error::{Error, Result};

/// Per-attempt timeout used when the descriptor does not set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Retries after the first attempt used when the descriptor does not set a budget
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Query parameter carrying the API key
const AUTH_PARAM: &str = "appid";

/// Query parameter carrying the unit system
const UNITS_PARAM: &str = "units";

/// Client for one remote data source
///
/// Holds no state between calls apart from the connection pool inside
/// `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    units: Option<String>,
    timeout: Duration,
    max_retries: u32,
}

/// Outcome of a single attempt
enum Attempt {
    Success(Vec<u8>),
    Retryable(Transient),
    Terminal(Error),
}

/// Failures worth another attempt
#[derive(Debug)]
enum Transient {
    Timeout(reqwest::Error),
    Connection(reqwest::Error),
    Status(StatusCode),
    Unclassified(reqwest::Error),
}

impl fmt::Display for Transient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transient::Timeout(_) => f.write_str("timeout"),
            Transient::Connection(e) => write!(f, "connection failed: {e}"),
            Transient::Status(status) => write!(f, "status {status}"),
            Transient::Unclassified(e) => write!(f, "{e}"),
        }
    }
}

impl Transient {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Transient::Timeout(e)
        } else if e.is_connect() || e.is_request() {
            Transient::Connection(e)
        } else {
            Transient::Unclassified(e)
        }
    }

    /// Terminal error once the retry budget is spent
    fn into_error(self, url: &str, attempts: u32) -> Error {
        match self {
            Transient::Timeout(e) => Error::network_caused(
                format!("request to {url} timed out ({attempts} attempts)"),
                e,
            ),
            Transient::Connection(e) => Error::network_caused(
                format!("could not reach {url} ({attempts} attempts)"),
                e,
            ),
            Transient::Status(status) => Error::server(
                format!("{url} answered {status} ({attempts} attempts)"),
                Some(status.as_u16()),
            ),
            Transient::Unclassified(e) => Error::server_caused(
                format!("request to {url} failed ({attempts} attempts)"),
                None,
                e,
            ),
        }
    }
}

impl FetchClient {
    /// Creates a client for `base_url` with its own connection pool
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("skycast/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Creates a client around an existing `reqwest::Client`
    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: None,
            units: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Credential sent as the implicit `appid` parameter
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Unit system sent as the implicit `units` parameter
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Default per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full address for an endpoint
    pub fn url_for(&self, endpoint: &str) -> String {
        join_url(&self.base_url, endpoint)
    }

    /// Query parameters actually sent for `descriptor`
    ///
    /// Implicit auth/unit parameters first, then the caller's map on top.
    pub fn query_for(&self, descriptor: &RequestDescriptor) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        if descriptor.includes_auth() {
            if let Some(api_key) = &self.api_key {
                query.insert(AUTH_PARAM.to_string(), api_key.clone());
            }
        }
        if descriptor.includes_units() {
            if let Some(units) = &self.units {
                query.insert(UNITS_PARAM.to_string(), units.clone());
            }
        }
        query.extend(
            descriptor
                .query_params()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        query
    }

    /// Issues `descriptor`, retrying transient failures, and decodes the body
    ///
    /// # Returns
    /// * `Ok(T)` - the decoded 2xx body
    /// * `Err(Error)` - Network after exhausted timeouts/connection failures,
    ///   Server after exhausted 5xx or on a decode failure, Authorization on
    ///   401, NotFound on a 404 for a lookup descriptor, Server for other 4xx
    pub async fn request<T, E, F>(&self, descriptor: RequestDescriptor, decode: F) -> Result<T>
    where
        F: FnOnce(&[u8]) -> std::result::Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let url = self.url_for(descriptor.endpoint());
        let max_retries = descriptor
            .max_retries_override()
            .unwrap_or(self.max_retries);
        let mut descriptor = descriptor;

        loop {
            match self.attempt(&url, &descriptor).await {
                Attempt::Success(body) => {
                    return decode(body.as_slice()).map_err(|e| {
                        warn!(url = %url, error = %e, "response body did not decode");
                        Error::server_caused(format!("could not decode response from {url}"), None, e)
                    });
                }
                Attempt::Terminal(err) => {
                    debug!(url = %url, error = %err, "request failed without retry");
                    return Err(err);
                }
                Attempt::Retryable(failure) => {
                    let attempts = descriptor.attempt() + 1;
                    if descriptor.attempt() >= max_retries {
                        warn!(url = %url, attempts, reason = %failure, "retries exhausted");
                        return Err(failure.into_error(&url, attempts));
                    }
                    debug!(url = %url, attempt = attempts, reason = %failure, "retrying request");
                    descriptor = descriptor.next_attempt();
                }
            }
        }
    }

    /// `request` with a `serde_json` decoder
    pub async fn request_json<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<T> {
        self.request(descriptor, |body| serde_json::from_slice::<T>(body))
            .await
    }

    async fn attempt(&self, url: &str, descriptor: &RequestDescriptor) -> Attempt {
        let timeout = descriptor.timeout_override().unwrap_or(self.timeout);
        let mut builder = self
            .http
            .request(descriptor.method().into(), url)
            .query(&self.query_for(descriptor))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .timeout(timeout);
        for (name, value) in descriptor.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if descriptor.method().is_write() {
            if let Some(body) = descriptor.body() {
                builder = builder.json(body);
            }
        }

        debug!(method = ?descriptor.method(), url, attempt = descriptor.attempt() + 1, "sending request");
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Attempt::Terminal(Error::server_caused(
                    format!("could not build request for {url}"),
                    None,
                    e,
                ));
            }
            Err(e) => return Attempt::Retryable(Transient::from_reqwest(e)),
        };

        let status = response.status();
        if status.is_success() {
            return match response.bytes().await {
                Ok(body) => Attempt::Success(body.to_vec()),
                Err(e) => Attempt::Retryable(Transient::from_reqwest(e)),
            };
        }
        if status.is_server_error() {
            return Attempt::Retryable(Transient::Status(status));
        }
        Attempt::Terminal(client_error(status, url, descriptor))
    }
}

/// Maps a non-retryable, non-2xx status onto the error taxonomy
fn client_error(status: StatusCode, url: &str, descriptor: &RequestDescriptor) -> Error {
    match (status, descriptor.lookup_identifier()) {
        (StatusCode::UNAUTHORIZED, _) => {
            Error::authorization(format!("{url} rejected the credentials ({status})"))
        }
        (StatusCode::NOT_FOUND, Some(identifier)) => Error::not_found(identifier),
        _ => Error::server(format!("{url} answered {status}"), Some(status.as_u16())),
    }
}

/// Joins a base address and an endpoint with exactly one `/` between them
pub fn join_url(base: &str, endpoint: &str) -> String {
    let base = base.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    if endpoint.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{endpoint}")
    }
}
