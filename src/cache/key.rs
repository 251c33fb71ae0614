//! Cache key layout
//!
//! Each resource kind owns two tiers of keys: a "last-used" singleton slot and
//! one slot per normalized identifier. The two tiers are written independently
//! and may refer to different identifiers at the same time.

use std::fmt;

/// Suffix of the singleton "last-used" slot for a resource kind
const LAST_USED_SUFFIX: &str = "last";

/// Suffix of the recent-history list for a resource kind
const HISTORY_SUFFIX: &str = "history";

/// A logical cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// The singleton slot holding the most recently fetched resource of `kind`
    pub fn last_used(kind: &str) -> Self {
        Self(format!("{kind}-{LAST_USED_SUFFIX}"))
    }

    /// The per-identifier slot, e.g. `weather:paris`
    ///
    /// The `:` separator keeps identifiers such as "last" from landing on the
    /// fixed per-kind slots. `-` and `%` in the identifier are percent-encoded
    /// so no identifier ends in a `-timestamp` or `-expiry` sub-record suffix.
    pub fn for_identifier(kind: &str, identifier: &str) -> Self {
        Self(format!(
            "{kind}:{}",
            escape_identifier(&normalize_identifier(identifier))
        ))
    }

    /// The fixed key the recent-history list lives under
    pub fn history(kind: &str) -> Self {
        Self(format!("{kind}-{HISTORY_SUFFIX}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims and lower-cases an identifier so "  Paris " and "paris" share a slot
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

fn escape_identifier(identifier: &str) -> String {
    identifier.replace('%', "%25").replace('-', "%2D")
}

/// Case-insensitive identifier comparison after normalization
pub fn same_identifier(a: &str, b: &str) -> bool {
    normalize_identifier(a) == normalize_identifier(b)
}
