//! Key-value substrates the cache is layered on
//!
//! `FileStore` keeps one file per physical key in an XDG-compliant cache
//! directory (`~/.cache/skycast/` on Linux). `MemoryStore` keeps everything in
//! a map and is used for ephemeral sessions and tests.

use async_trait::async_trait;
use directories::ProjectDirs;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

/// Suffix for in-flight writes; never read back as an entry
const TEMP_EXTENSION: &str = "tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Errors raised by a key-value backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Minimal string-to-string persistence the cache layer needs
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &'static str;

    /// Returns the stored value, `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removes `key`; returns whether something was deleted
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;

    async fn contains(&self, key: &str) -> Result<bool, StoreError>;

    /// Removes every key
    async fn clear(&self) -> Result<(), StoreError>;
}

/// File-per-key store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store in the XDG cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "skycast")?;
        Some(Self {
            dir: project_dirs.cache_dir().to_path_buf(),
        })
    }

    /// Creates a store rooted at a custom directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the file backing `key`
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", escape_key(key)))
    }

    /// Unique sibling path a write is staged in before the rename
    fn temp_path_for(&self, key: &str) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            "{}.{}.{n}.{TEMP_EXTENSION}",
            escape_key(key),
            std::process::id()
        ))
    }

    fn io_error(key: &str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    /// Writes to a temporary file and renames it over the entry, so readers
    /// see either the old or the new value and concurrent writers of one key
    /// never interleave.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error(key, e))?;
        let temp_path = self.temp_path_for(key);
        fs::write(&temp_path, value)
            .await
            .map_err(|e| Self::io_error(key, e))?;
        if let Err(e) = fs::rename(&temp_path, self.path_for(key)).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Self::io_error(key, e));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        fs::try_exists(self.path_for(key))
            .await
            .map_err(|e| Self::io_error(key, e))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Self::io_error("*", e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error("*", e))?
        {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext == "json" || ext == TEMP_EXTENSION)
            {
                fs::remove_file(&path)
                    .await
                    .map_err(|e| Self::io_error(&path.to_string_lossy(), e))?;
            }
        }
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physical records currently held
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Maps a key onto a file-name-safe string
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`, so distinct keys always map to distinct file names.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            escaped.push(byte as char);
        } else {
            let _ = write!(escaped, "%{byte:02X}");
        }
    }
    escaped
}
