//! # Key-Value Storage
//!
//! Where the cart record lives between sessions.
//!
//! ## Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   CartStore / SaveWorker                                                │
//! │        │  PersistedCart                                                 │
//! │        ▼                                                                │
//! │   CartPersistence  ── encode/decode (shopbase_core::persist)            │
//! │        │  String record                                                 │
//! │        ▼                                                                │
//! │   dyn KeyValueStorage                                                   │
//! │        ├── FileStorage    {dir}/{key}.json, atomic replace              │
//! │        └── MemoryStorage  process-local map (tests, ephemeral carts)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Loading never fails outward: a missing, corrupt or too-new record means
//! "no persisted cart" and is logged.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, warn};

use shopbase_core::persist;
use shopbase_core::PersistedCart;

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Storage Trait
// =============================================================================

/// A string key-value store.
pub trait KeyValueStorage: Send + Sync {
    /// Returns the value under `key`, or `None` if nothing is stored.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

// =============================================================================
// File Storage
// =============================================================================

/// Stores each key as `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (and creates if needed) a storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Opened file storage");
        Ok(FileStorage { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');

        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        // Write then rename so a reader never sees a half-written record
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Memory Storage
// =============================================================================

/// Process-local storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

// =============================================================================
// Cart Persistence
// =============================================================================

/// Reads and writes the cart record under one key.
#[derive(Clone)]
pub struct CartPersistence {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl std::fmt::Debug for CartPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartPersistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl CartPersistence {
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        CartPersistence {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the persisted cart.
    ///
    /// Absent, unreadable, corrupt and newer-version records all come back
    /// as `None`.
    pub fn load(&self) -> Option<PersistedCart> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %self.key, "No persisted cart");
                return None;
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read persisted cart");
                return None;
            }
        };

        match persist::decode(&raw) {
            Ok(record) => {
                debug!(
                    key = %self.key,
                    lines = record.state.lines.len(),
                    version = record.version,
                    "Loaded persisted cart"
                );
                Some(record.state)
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable cart record");
                None
            }
        }
    }

    /// Writes the cart record, stamped with the current time.
    pub fn save(&self, cart: &PersistedCart) -> StoreResult<()> {
        let raw = persist::encode(cart, Utc::now())?;
        self.storage.set(&self.key, &raw)
    }

    /// Deletes the stored record.
    pub fn erase(&self) -> StoreResult<()> {
        self.storage.remove(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopbase_core::LineCandidate;

    fn one_line() -> PersistedCart {
        PersistedCart {
            lines: vec![LineCandidate::new("v1", 1000).into_line(2)],
        }
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("nested")).unwrap();

        assert_eq!(storage.get("cart-storage").unwrap(), None);

        storage.set("cart-storage", "{}").unwrap();
        assert_eq!(storage.get("cart-storage").unwrap().as_deref(), Some("{}"));
        assert!(dir.path().join("nested/cart-storage.json").exists());

        storage.remove("cart-storage").unwrap();
        storage.remove("cart-storage").unwrap();
        assert_eq!(storage.get("cart-storage").unwrap(), None);
    }

    #[test]
    fn test_file_storage_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                storage.set(key, "x"),
                Err(StoreError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn test_memory_storage_clones_share_entries() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let persistence = CartPersistence::new(Arc::new(MemoryStorage::new()), "cart-storage");
        assert_eq!(persistence.load(), None);

        persistence.save(&one_line()).unwrap();
        assert_eq!(persistence.load(), Some(one_line()));

        persistence.erase().unwrap();
        assert_eq!(persistence.load(), None);
    }

    #[test]
    fn test_corrupt_record_loads_as_absent() {
        let storage = MemoryStorage::new();
        storage.set("cart-storage", "{not json").unwrap();

        let persistence = CartPersistence::new(Arc::new(storage), "cart-storage");
        assert_eq!(persistence.load(), None);
    }

    #[test]
    fn test_newer_record_loads_as_absent() {
        let storage = MemoryStorage::new();
        storage
            .set("cart-storage", r#"{"state":{"lines":[]},"version":42}"#)
            .unwrap();

        let persistence = CartPersistence::new(Arc::new(storage), "cart-storage");
        assert_eq!(persistence.load(), None);
    }
}
