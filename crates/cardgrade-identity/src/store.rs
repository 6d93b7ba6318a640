//! Key -> record stores backing the metadata cache.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::CacheError;

/// A pluggable key -> record map.
///
/// Writes are idempotent: the same key always resolves to the same upstream
/// record, so a racing writer can at worst cost a redundant remote lookup.
pub trait RecordStore<T>: Send + Sync {
    fn get(&self, key: &str) -> Option<T>;
    fn put(&self, key: &str, value: T) -> Result<(), CacheError>;
    fn len(&self) -> usize;
    /// Number of successful `put` calls since construction.
    fn writes(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store; nothing touches disk.
pub struct MemoryStore<T> {
    map: RwLock<BTreeMap<String, T>>,
    writes: AtomicUsize,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            map: RwLock::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
        }
    }
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Clone + Send + Sync> RecordStore<T> for MemoryStore<T> {
    fn get(&self, key: &str) -> Option<T> {
        self.map.read().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, value: T) -> Result<(), CacheError> {
        self.map
            .write()
            .map_err(|_| CacheError::Poisoned)?
            .insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn len(&self) -> usize {
        self.map.read().map(|m| m.len()).unwrap_or(0)
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

/// A whole-file JSON map, rewritten atomically after every insert.
pub struct JsonFileStore<T> {
    path: PathBuf,
    map: RwLock<BTreeMap<String, T>>,
    writes: AtomicUsize,
}

impl<T: Serialize + DeserializeOwned> JsonFileStore<T> {
    /// Open `path`, loading existing entries. A missing file starts empty; an
    /// unreadable one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("cache: ignoring corrupt {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("cache: cannot read {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        log::debug!("cache: {} entries from {}", map.len(), path.display());
        Self {
            path,
            map: RwLock::new(map),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<String, T>) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl<T> RecordStore<T> for JsonFileStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn get(&self, key: &str) -> Option<T> {
        self.map.read().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, value: T) -> Result<(), CacheError> {
        let mut map = self.map.write().map_err(|_| CacheError::Poisoned)?;
        map.insert(key.to_string(), value);
        self.persist(&map)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn len(&self) -> usize {
        self.map.read().map(|m| m.len()).unwrap_or(0)
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_counts_writes() {
        let store = MemoryStore::<u32>::new();
        assert!(store.is_empty());
        store.put("a", 1).unwrap();
        store.put("a", 1).unwrap();
        assert_eq!(store.get("a"), Some(1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sets.json");
        {
            let store = JsonFileStore::<String>::open(&path);
            store.put("SVI", "sv1".to_string()).unwrap();
            assert_eq!(store.writes(), 1);
        }
        assert!(!path.with_extension("json.tmp").exists());
        let reopened = JsonFileStore::<String>::open(&path);
        assert_eq!(reopened.get("SVI").as_deref(), Some("sv1"));
        assert_eq!(reopened.writes(), 0);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::<String>::open(&path);
        assert!(store.is_empty());
        store.put("k", "v".into()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"k\""));
    }
}
