//! Catalog lookup cache
//!
//! Workers memoize catalog lookups against their mirror. Every rebuild of
//! the mirror must be followed by [`CacheInvalidator::invalidate_all`].

use crate::source::CatalogSource;
use crate::table::CatalogTuple;
use ahash::AHashMap;
use parking_lot::RwLock;
use query_core::Oid;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Components holding derived catalog state
pub trait CacheInvalidator: Send + Sync {
    /// Drop every cached lookup
    fn invalidate_all(&self);
}

/// Hit/miss counters
#[derive(Debug, Default)]
pub struct SysCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl SysCacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct SysCache {
    entries: RwLock<AHashMap<(Oid, Oid), Arc<Vec<CatalogTuple>>>>,
    stats: SysCacheStats,
}

impl SysCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tuples of `catalog` keyed by `key`, served from the cache when present
    pub fn search(
        &self,
        source: &dyn CatalogSource,
        catalog: Oid,
        key: Oid,
    ) -> Arc<Vec<CatalogTuple>> {
        if let Some(hit) = self.entries.read().get(&(catalog, key)) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(hit);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let tuples = Arc::new(source.scan(catalog, key));
        self.entries
            .write()
            .insert((catalog, key), Arc::clone(&tuples));
        tuples
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> &SysCacheStats {
        &self.stats
    }
}

impl CacheInvalidator for SysCache {
    fn invalidate_all(&self) {
        let mut entries = self.entries.write();
        tracing::debug!("Invalidating {} syscache entries", entries.len());
        entries.clear();
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
    }
}
