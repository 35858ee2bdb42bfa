//! Local device storage.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Key-value storage scoped to the page, `window.localStorage`-shaped.
///
/// Like cookie writes, storage writes carry no success signal: a blocked
/// or full store degrades to "decision not persisted this time".
pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// In-memory [`LocalStorage`].
#[derive(Default)]
pub struct MemoryLocalStorage {
    store: DashMap<String, String>,
}

impl MemoryLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl LocalStorage for MemoryLocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.store.get(key).map(|entry| entry.value().clone())
    }

    fn set_item(&self, key: &str, value: &str) {
        self.store.insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.store.remove(key);
    }
}

/// File-backed [`LocalStorage`]: a JSON map on disk, written through on
/// every mutation. Gives headless embedders durable storage.
pub struct FileLocalStorage {
    path: PathBuf,
    cache: DashMap<String, String>,
}

impl FileLocalStorage {
    /// Open the store at `path`, loading any existing content. A missing
    /// or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = DashMap::new();

        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => {
                    for (key, value) in entries {
                        cache.insert(key, value);
                    }
                }
                Err(e) => tracing::warn!("storage file {} is malformed: {e}", path.display()),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("storage file {} unreadable: {e}", path.display()),
        }

        Self { path, cache }
    }

    fn flush(&self) {
        let snapshot: BTreeMap<String, String> = self
            .cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let raw = match serde_json::to_string_pretty(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("storage serialization failed: {e}");
                return;
            }
        };

        if let Err(e) = fs::write(&self.path, raw) {
            tracing::warn!("storage write to {} failed: {e}", self.path.display());
        }
    }
}

impl LocalStorage for FileLocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }

    fn set_item(&self, key: &str, value: &str) {
        self.cache.insert(key.to_string(), value.to_string());
        self.flush();
    }

    fn remove_item(&self, key: &str) {
        self.cache.remove(key);
        self.flush();
    }
}
