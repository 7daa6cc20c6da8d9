use lru::LruCache;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::processor::{
    ProcessorError,
    listings_table::{ListingsTable, LoadOptions},
};

const DEFAULT_CAPACITY: usize = 8;

/// Invalidation key: a file's canonical path plus its modification time
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CacheKey {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl CacheKey {
    pub fn for_path(path: &Path) -> Result<Self, ProcessorError> {
        let path = path.canonicalize()?;
        let modified = fs::metadata(&path)?.modified()?;
        Ok(Self { path, modified })
    }
}

/// Memoizes loaded tables so each interaction does not re-read the source file.
///
/// Tables are handed out as shared immutable `Arc`s. Rewriting the file changes its
/// modification time, which misses the cache and evicts the stale entry.
#[derive(Debug)]
pub struct TableCache {
    cache: Mutex<LruCache<CacheKey, Arc<ListingsTable>>>,
    options: LoadOptions,
}

impl TableCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, LoadOptions::default())
    }

    pub fn with_capacity(capacity: usize, options: LoadOptions) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Arc<ListingsTable>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ListingsTable>> {
        self.lock().get(key).cloned()
    }

    /// Returns the cached table for `path`, loading it when absent or stale
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<ListingsTable>, ProcessorError> {
        let key = CacheKey::for_path(path)?;

        if let Some(table) = self.get(&key) {
            debug!(path = %key.path.display(), "table cache hit");
            return Ok(table);
        }

        let (table, summary) = ListingsTable::load_csv_with(&key.path, &self.options)?;
        if !summary.errors.is_empty() {
            warn!(
                path = %key.path.display(),
                errors = summary.errors.len(),
                "cached table has field errors"
            );
        }
        let table = Arc::new(table);

        let mut cache = self.lock();
        let stale: Vec<CacheKey> = cache
            .iter()
            .filter(|(k, _)| k.path == key.path)
            .map(|(k, _)| k.clone())
            .collect();
        for k in stale {
            info!(path = %k.path.display(), "evicting stale table");
            cache.pop(&k);
        }
        cache.put(key, Arc::clone(&table));

        Ok(table)
    }

    /// Drops every cached version of `path`
    pub fn invalidate(&self, path: &Path) {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut cache = self.lock();
        let keys: Vec<CacheKey> = cache
            .iter()
            .filter(|(k, _)| k.path == path)
            .map(|(k, _)| k.clone())
            .collect();
        for k in keys {
            cache.pop(&k);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new()
    }
}
