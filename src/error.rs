//! Error taxonomy shared by the cache, fetch and repository layers
//!
//! Every failure that crosses a public boundary is one of five kinds. Callers
//! decide what to do by matching on [`ErrorKind`], never on message text, so
//! messages are free to change wording.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Upstream error attached to an [`Error`]
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Closed set of error kinds exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// No connectivity, connection refused or request timed out
    Network,
    /// Non-2xx answer, undecodable body, or an unclassified internal failure
    Server,
    /// Local store read or write failed
    Cache,
    /// The remote source confirmed the requested resource does not exist
    NotFound,
    /// Credentials were rejected
    Authorization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Cache => "cache",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Authorization => "authorization",
        };
        f.write_str(label)
    }
}

/// Errors returned by the fetch/cache layer
///
/// Created at the failure site and never mutated afterwards. Cloning is cheap:
/// the upstream cause is reference counted.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Connectivity loss or timeout
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    /// The server answered with something we cannot use
    #[error("Server error: {message}")]
    Server {
        message: String,
        /// HTTP status when the failure came from a response
        status: Option<u16>,
        #[source]
        cause: Option<Cause>,
    },

    /// Local persistence failure
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    /// Confirmed absent remote resource
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        /// The identifier that was looked up
        identifier: String,
        #[source]
        cause: Option<Cause>,
    },

    /// Credential rejected by the remote source
    #[error("Authorization error: {message}")]
    Authorization {
        message: String,
        #[source]
        cause: Option<Cause>,
    },
}

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Error::Network {
            message: message.into(),
            cause: None,
        }
    }

    pub fn network_caused<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Network {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn server(message: impl Into<String>, status: Option<u16>) -> Self {
        Error::Server {
            message: message.into(),
            status,
            cause: None,
        }
    }

    pub fn server_caused<E>(message: impl Into<String>, status: Option<u16>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Server {
            message: message.into(),
            status,
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Error::Cache {
            message: message.into(),
            cause: None,
        }
    }

    pub fn cache_caused<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Cache {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn not_found(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Error::NotFound {
            message: format!("no resource named '{identifier}'"),
            identifier,
            cause: None,
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Error::Authorization {
            message: message.into(),
            cause: None,
        }
    }

    /// The closed tag callers branch on
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network { .. } => ErrorKind::Network,
            Error::Server { .. } => ErrorKind::Server,
            Error::Cache { .. } => ErrorKind::Cache,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Authorization { .. } => ErrorKind::Authorization,
        }
    }

    /// Human-readable message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            Error::Network { message, .. }
            | Error::Server { message, .. }
            | Error::Cache { message, .. }
            | Error::NotFound { message, .. }
            | Error::Authorization { message, .. } => message,
        }
    }

    /// HTTP status for server errors that came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { status, .. } => *status,
            _ => None,
        }
    }

    /// Identifier carried by a not-found error
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Error::NotFound { identifier, .. } => Some(identifier),
            _ => None,
        }
    }

    /// Whether a cached value may be served in place of this error
    ///
    /// Only transport and server failures qualify. A confirmed not-found must
    /// never be masked by data cached for some other request.
    pub fn allows_cache_fallback(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Error::network("down").kind(), ErrorKind::Network);
        assert_eq!(Error::server("boom", Some(500)).kind(), ErrorKind::Server);
        assert_eq!(Error::cache("disk full").kind(), ErrorKind::Cache);
        assert_eq!(Error::not_found("Atlantis").kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::authorization("bad key").kind(),
            ErrorKind::Authorization
        );
    }

    #[test]
    fn test_not_found_carries_identifier() {
        let err = Error::not_found("Atlantis");
        assert_eq!(err.identifier(), Some("Atlantis"));
        assert!(err.message().contains("Atlantis"));
        assert!(err.to_string().starts_with("Not found:"));
    }

    #[test]
    fn test_status_only_on_server_errors() {
        assert_eq!(Error::server("bad gateway", Some(502)).status(), Some(502));
        assert_eq!(Error::network("timeout").status(), None);
    }

    #[test]
    fn test_cause_is_exposed_as_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = Error::cache_caused("write failed", io);
        let source = err.source().expect("cause should be the source");
        assert!(source.to_string().contains("read-only"));
        assert!(Error::cache("plain").source().is_none());
    }

    #[test]
    fn test_fallback_eligibility() {
        assert!(Error::network("offline").allows_cache_fallback());
        assert!(Error::server("503", Some(503)).allows_cache_fallback());
        assert!(!Error::not_found("Atlantis").allows_cache_fallback());
        assert!(!Error::authorization("401").allows_cache_fallback());
        assert!(!Error::cache("io").allows_cache_fallback());
    }

    #[test]
    fn test_kind_display_is_stable() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not-found");
        assert_eq!(ErrorKind::Network.to_string(), "network");
        assert_eq!(
            serde_json::to_string(&ErrorKind::Authorization).unwrap(),
            "\"authorization\""
        );
    }
}
