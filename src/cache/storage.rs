//! Storage backends for the response cache
//!
//! The cache only needs four operations from its backing store, captured by the
//! [`Storage`] trait. Two backends are provided: an in-memory map and a
//! directory of JSON files in the XDG cache location.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use thiserror::Error;

/// Errors a storage backend can report
#[derive(Debug, Error)]
pub enum StorageError {
    /// Writing the value would exceed the backend's quota
    #[error("Storage quota exceeded ({used} of {limit} bytes in use)")]
    QuotaExceeded { used: usize, limit: usize },

    /// Filesystem error
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A string key-value store the cache can sit on top of
///
/// Methods take `&self` so one store can be shared behind an `Arc`.
pub trait Storage: Send + Sync {
    /// Returns the value stored under `key`, if any
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every key currently stored
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-memory storage with an optional size quota
///
/// The quota counts key and value bytes, roughly how browsers account for
/// session storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    /// Creates an unbounded in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an in-memory store that rejects writes beyond `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.lock().map(|items| items.len()).unwrap_or(0)
    }

    /// Whether the store holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.items
            .lock()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".to_string()))
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.lock()?;

        if let Some(limit) = self.quota_bytes {
            // Size after the write, not counting the entry being replaced
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > limit {
                return Err(StorageError::QuotaExceeded { used, limit });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// Stores each item as a JSON file in a cache directory
///
/// File names are the percent-encoded key plus `.json`, so arbitrary query
/// text is safe to use in keys. Uppercase ASCII letters are written as `^`
/// plus the lowercase letter, so keys differing only in case stay distinct
/// on case-insensitive filesystems.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Directory where cache files are stored
    dir: PathBuf,
    /// Maximum total size of all files in the directory
    quota_bytes: Option<usize>,
}

impl FileStorage {
    /// Creates file storage in the XDG-compliant cache directory
    ///
    /// Uses `~/.cache/moviefind/` on Linux. Returns `None` if the directory
    /// cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "moviefind")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates file storage rooted at a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self {
            dir,
            quota_bytes: None,
        }
    }

    /// Limits the total size of the cache directory
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }

    fn used_bytes(&self, excluding: &Path) -> Result<usize, StorageError> {
        let mut used = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().as_path() == excluding {
                continue;
            }
            used += entry.metadata()?.len() as usize;
        }
        Ok(used)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.item_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.item_path(key);

        if let Some(limit) = self.quota_bytes {
            let used = self.used_bytes(&path)?;
            if used + value.len() > limit {
                return Err(StorageError::QuotaExceeded { used, limit });
            }
        }

        fs::write(path, value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Some(key) = key_from_stem(stem) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// Maps a key to a case-insensitive-safe file stem
///
/// `^` never survives percent-encoding, so it is free to mark uppercase.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for c in urlencoding::encode(key).chars() {
        if c.is_ascii_uppercase() {
            stem.push('^');
            stem.push(c.to_ascii_lowercase());
        } else {
            stem.push(c);
        }
    }
    stem
}

/// Reverses [`file_stem`]; `None` for names this storage did not write
fn key_from_stem(stem: &str) -> Option<String> {
    let mut encoded = String::with_capacity(stem.len());
    let mut chars = stem.chars();
    while let Some(c) = chars.next() {
        if c == '^' {
            encoded.push(chars.next()?.to_ascii_uppercase());
        } else {
            encoded.push(c);
        }
    }
    urlencoding::decode(&encoded).ok().map(|key| key.into_owned())
}
