//! The "seeding already performed" flag and the key-value records behind it.
//!
//! The key-value record is expected to be synchronized by the cloud provider, so
//! the flag is per cloud identity rather than per device.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key under which the seed flag is stored.
pub const SEED_FLAG_KEY: &str = "SEED_DATA_FROM_LOCAL_STORE";

/// Small durable key-value record. Missing keys read as `false`.
///
/// Writes are fire-and-forget: `set_bool` reports whether the write was
/// accepted locally, never whether it has propagated. A failed write must
/// leave the old value readable.
pub trait KeyValueStore: Send + Sync {
    fn bool_for_key(&self, key: &str) -> bool;
    fn set_bool(&self, key: &str, value: bool) -> bool;
}

/// In-process record. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    values: Arc<Mutex<BTreeMap<String, bool>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn bool_for_key(&self, key: &str) -> bool {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.get(key).copied().unwrap_or(false)
    }

    fn set_bool(&self, key: &str, value: bool) -> bool {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value);
        true
    }
}

/// JSON object file, the shape a file-based sync container replicates.
pub struct FileKeyValueStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, std::io::Error> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    fn write(&self, key: &str, value: bool) -> Result<(), std::io::Error> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut map = self.load()?;
        map.insert(key.to_string(), Value::Bool(value));
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&map).map_err(std::io::Error::other)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn bool_for_key(&self, key: &str) -> bool {
        match self.load() {
            Ok(map) => map.get(key).and_then(Value::as_bool).unwrap_or(false),
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "unreadable key-value record");
                false
            }
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> bool {
        match self.write(key, value) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), key, %error, "key-value write failed");
                false
            }
        }
    }
}

/// Monotonic false→true flag recording that local data was copied to the cloud.
#[derive(Clone)]
pub struct SeedFlagStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SeedFlagStore {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn has_seeded(&self) -> bool {
        self.store.bool_for_key(&self.key)
    }

    /// Does not wait for the flag to propagate. There is deliberately no way
    /// to clear it.
    pub fn mark_seeded(&self) {
        if self.store.set_bool(&self.key, true) {
            tracing::info!(key = %self.key, "marked local store as seeded");
        } else {
            tracing::warn!(key = %self.key, "seed flag not recorded; next launch seeds again");
        }
    }
}
