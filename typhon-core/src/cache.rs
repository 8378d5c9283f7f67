//! Per-user disk cache backing the packager and runner.
//!
//! The store hands every pipeline component a stable, namespaced place on
//! disk. Entries are named directories under `<root>/cache`, created lazily
//! and never evicted; re-running a package reuses (and overwrites) its
//! directory. A small in-memory key/value layer rides along for
//! process-local memoization.

use crate::error::{Result, TyphonError};
use crate::paths;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Disk cache of named directories plus an in-memory key/value layer.
#[derive(Debug)]
pub struct CacheStore {
    /// Root directory; the cache lives in `<root>/cache`.
    root: PathBuf,
    /// Process-local key/value layer (no persistence).
    memory: HashMap<String, String>,
}

impl CacheStore {
    /// Open the store at the default data directory.
    pub fn open() -> Self {
        Self::with_root(paths::data_dir())
    }

    /// Open the store at a custom root.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root, memory: HashMap::new() }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Idempotently create the root and its `cache` subdirectory.
    pub fn ensure_root(&self) -> Result<()> {
        let dir = self.cache_dir();
        fs::create_dir_all(&dir).map_err(|e| TyphonError::io(dir, e))
    }

    /// Return (creating if absent) the directory `<root>/cache/<name>`.
    ///
    /// Deterministic: the same name always yields the same path. Callers are
    /// responsible for passing pipeline-unique keys.
    pub fn ensure_cache_directory(&self, name: &str) -> Result<PathBuf> {
        self.ensure_root()?;
        let dir = self.cache_dir().join(name);
        fs::create_dir_all(&dir).map_err(|e| TyphonError::io(&dir, e))?;
        debug!(name, path = %dir.display(), "cache directory ready");
        Ok(dir)
    }

    /// Return the file's contents if present, otherwise write `data` and
    /// return it.
    ///
    /// Scratch caching only: idempotent at first write, so callers must not
    /// rely on it for correctness-critical state.
    pub fn retrieve_or_create_file(&self, name: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.ensure_root()?;
        let path = self.cache_dir().join(name);

        if path.exists() {
            return fs::read(&path).map_err(|e| TyphonError::io(path, e));
        }

        fs::write(&path, data).map_err(|e| TyphonError::io(&path, e))?;
        debug!(name, bytes = data.len(), "cache file created");
        Ok(data.to_vec())
    }

    /// Store a value in the in-memory layer.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.memory.insert(key.into(), value.into());
    }

    /// Look up a value in the in-memory layer.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.memory.get(key).map(String::as_str)
    }
}
