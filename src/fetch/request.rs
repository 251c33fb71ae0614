//! Outbound request description
//!
//! A `RequestDescriptor` is built once per call and never changed. A retry
//! works on a clone with the attempt counter bumped.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP methods the client issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Methods that carry a JSON body
    pub fn is_write(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Everything needed to issue one logical request
///
/// `timeout` and `max_retries` fall back to the client's defaults when unset.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    endpoint: String,
    method: Method,
    query: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
    body: Option<Value>,
    include_auth: bool,
    include_units: bool,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    lookup: Option<String>,
    attempt: u32,
}

impl RequestDescriptor {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
            include_auth: true,
            include_units: true,
            timeout: None,
            max_retries: None,
            lookup: None,
            attempt: 0,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint)
    }

    /// Adds a query parameter; caller parameters win over implicit ones
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// JSON body, sent only for write methods
    pub fn json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Suppresses the implicit credential parameter
    pub fn without_auth(mut self) -> Self {
        self.include_auth = false;
        self
    }

    /// Suppresses the implicit unit-system parameter
    pub fn without_units(mut self) -> Self {
        self.include_units = false;
        self
    }

    /// Per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Marks this as a lookup of `identifier`, so a 404 means "does not exist"
    pub fn lookup(mut self, identifier: impl Into<String>) -> Self {
        self.lookup = Some(identifier.into());
        self
    }

    /// The descriptor for the next retry
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn query_params(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn includes_auth(&self) -> bool {
        self.include_auth
    }

    pub fn includes_units(&self) -> bool {
        self.include_units
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn max_retries_override(&self) -> Option<u32> {
        self.max_retries
    }

    pub fn lookup_identifier(&self) -> Option<&str> {
        self.lookup.as_deref()
    }

    /// Zero-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
