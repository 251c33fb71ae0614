//! Configuration loading
//!
//! A TOML file with three optional sections. Every field has a default, so an
//! absent file is a valid configuration. Two environment variables override
//! the file: `SKYCAST_API_KEY` and `SKYCAST_BASE_URL`.
//!
//! ```toml
//! [api]
//! base_url = "https://api.openweathermap.org/data/2.5"
//! api_key = "..."
//! units = "metric"
//! timeout_secs = 15
//! max_retries = 2
//!
//! [cache]
//! ttl_minutes = 30
//! history_max = 10
//! policy = "network-first"
//! serve_expired_on_failure = false
//!
//! [connectivity]
//! probe_addr = "1.1.1.1:53"
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::FileStore;
use crate::connectivity::DEFAULT_PROBE_ADDR;
use crate::data::DEFAULT_BASE_URL;
use crate::fetch::{FetchClient, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
use crate::repository::{FetchPolicy, RepositorySettings, DEFAULT_HISTORY_MAX, DEFAULT_TTL};

pub const API_KEY_ENV: &str = "SKYCAST_API_KEY";
pub const BASE_URL_ENV: &str = "SKYCAST_BASE_URL";

/// Unit systems the API understands
pub const SUPPORTED_UNITS: [&str; 3] = ["metric", "imperial", "standard"];

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub units: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            units: "metric".to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache directory; the platform cache dir when unset
    pub dir: Option<PathBuf>,
    pub ttl_minutes: u64,
    pub history_max: usize,
    pub policy: FetchPolicy,
    pub serve_expired_on_failure: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_minutes: DEFAULT_TTL.as_secs() / 60,
            history_max: DEFAULT_HISTORY_MAX,
            policy: FetchPolicy::default(),
            serve_expired_on_failure: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectivityConfig {
    /// Address the route probe aims at; no packet is sent
    pub probe_addr: SocketAddr,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_addr: DEFAULT_PROBE_ADDR,
        }
    }
}

impl Config {
    /// Loads, applies environment overrides, and validates
    ///
    /// An explicit path must exist. Without one, the platform config file is
    /// used when present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_path(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_path(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// `<platform config dir>/skycast/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "skycast").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies environment-style overrides; blank values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value: &String| !value.trim().is_empty());
        if let Some(api_key) = non_blank(API_KEY_ENV) {
            self.api.api_key = Some(api_key);
        }
        if let Some(base_url) = non_blank(BASE_URL_ENV) {
            self.api.base_url = base_url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !SUPPORTED_UNITS.contains(&self.api.units.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "api.units",
                reason: format!("must be one of {}", SUPPORTED_UNITS.join(", ")),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.timeout_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.history_max == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.history_max",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Directory for the file-backed cache, if one can be determined
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache
            .dir
            .clone()
            .or_else(|| FileStore::new().map(|store| store.dir().to_path_buf()))
    }

    pub fn fetch_client(&self) -> Result<FetchClient, ConfigError> {
        let client = FetchClient::new(self.api.base_url.trim())?
            .with_units(self.api.units.clone())
            .with_timeout(Duration::from_secs(self.api.timeout_secs))
            .with_max_retries(self.api.max_retries);
        Ok(match &self.api.api_key {
            Some(api_key) => client.with_api_key(api_key.clone()),
            None => client,
        })
    }

    pub fn repository_settings(&self) -> RepositorySettings {
        RepositorySettings {
            ttl: Duration::from_secs(self.cache.ttl_minutes.saturating_mul(60)),
            history_max: self.cache.history_max,
            policy: self.cache.policy,
            serve_expired_on_failure: self.cache.serve_expired_on_failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.timeout_secs, 15);
        assert_eq!(config.api.max_retries, 2);
        assert_eq!(config.cache.ttl_minutes, 30);
        assert_eq!(config.cache.policy, FetchPolicy::NetworkFirst);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [api]
            api_key = "abc123"

            [cache]
            policy = "cache-first"
            ttl_minutes = 5
            "#,
        )
        .expect("Should parse");

        assert_eq!(config.api.api_key.as_deref(), Some("abc123"));
        assert_eq!(config.api.units, "metric");
        assert_eq!(config.cache.policy, FetchPolicy::CacheFirst);
        assert_eq!(config.cache.history_max, DEFAULT_HISTORY_MAX);
        assert_eq!(config.connectivity.probe_addr, DEFAULT_PROBE_ADDR);

        let settings = config.repository_settings();
        assert_eq!(settings.ttl, Duration::from_secs(300));
        assert_eq!(settings.policy, FetchPolicy::CacheFirst);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = Config::from_toml_str("[api]\nbase = \"http://x\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.api.base_url = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "api.base_url", .. })
        ));

        let mut config = Config::default();
        config.api.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "api.timeout_secs", .. })
        ));

        let mut config = Config::default();
        config.cache.history_max = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "cache.history_max", .. })
        ));

        let mut config = Config::default();
        config.api.units = "kelvin".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api.units"));
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let mut config = Config::default();
        config.api.api_key = Some("from-file".to_string());
        let env: HashMap<&str, &str> = HashMap::from([
            (API_KEY_ENV, "from-env"),
            (BASE_URL_ENV, "http://localhost:9000"),
        ]);

        config.apply_overrides(|name| env.get(name).map(|value| value.to_string()));

        assert_eq!(config.api.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.api.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert!(config.api.api_key.is_none());
    }

    #[test]
    fn test_from_path_reads_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[connectivity]\nprobe_addr = \"127.0.0.1:9\"\n").unwrap();

        let config = Config::from_path(&path).expect("Should load");
        assert_eq!(config.connectivity.probe_addr.port(), 9);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("nope.toml");

        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_configured_cache_dir_wins() {
        let mut config = Config::default();
        config.cache.dir = Some(PathBuf::from("/tmp/skycast-test"));
        assert_eq!(config.cache_dir(), Some(PathBuf::from("/tmp/skycast-test")));
    }

    #[test]
    fn test_fetch_client_uses_base_url() {
        let mut config = Config::default();
        config.api.base_url = "http://localhost:8080/".to_string();

        let client = config.fetch_client().expect("Should build");
        assert_eq!(client.url_for("weather"), "http://localhost:8080/weather");
    }
}
