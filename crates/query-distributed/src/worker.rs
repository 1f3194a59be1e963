//! Worker role

use crate::buffer::{ContextBuffer, DispatchedContext};
use crate::config::DispatchConfig;
use crate::error::Result;
use crate::rebuilder::{CatalogRebuilder, RebuildStats};
use crate::sendback::{pre_sendback_changed_catalog, SendBackRecord};
use query_catalog::{CacheInvalidator, CatalogMirror, CatalogTuple, SysCache};
use query_core::{ContentId, Oid};
use std::sync::Arc;

/// A segment worker: rebuilds dispatched contexts and reports storage growth
pub struct Worker {
    /// Content id of the segment this worker serves
    segindex: ContentId,
    /// Catalog rebuilt from the latest context
    mirror: CatalogMirror,
    /// Lookup cache over `mirror`
    syscache: SysCache,
    /// Dispatch and debug settings
    config: DispatchConfig,
}

impl Worker {
    /// Create a new worker with an empty mirror
    pub fn new(segindex: ContentId, config: DispatchConfig) -> Self {
        Self {
            segindex,
            mirror: CatalogMirror::new(),
            syscache: SysCache::new(),
            config,
        }
    }

    /// Content id of this worker
    pub fn segindex(&self) -> ContentId {
        self.segindex
    }

    /// Catalog mirror of the current statement
    pub fn mirror(&self) -> &CatalogMirror {
        &self.mirror
    }

    pub fn syscache(&self) -> &SysCache {
        &self.syscache
    }

    /// Replace the mirror with the contents of `buffer`
    ///
    /// The previous mirror is kept if the stream turns out to be malformed.
    /// Cached lookups are dropped once the new mirror is in place.
    pub fn rebuild_query_context(&mut self, buffer: &mut ContextBuffer) -> Result<RebuildStats> {
        let mut mirror = CatalogMirror::new();
        let stats = CatalogRebuilder::new(&mut mirror, self.segindex)
            .with_debug_print_tuple(self.config.debug_print_tuple)
            .run(buffer)?;
        self.mirror = mirror;
        self.syscache.invalidate_all();

        if self.config.debug_print {
            tracing::debug!(
                "Content {} rebuilt {} tables ({} tuples accepted, {} discarded) from {} bytes",
                self.segindex,
                self.mirror.table_count(),
                stats.tuples_accepted,
                stats.tuples_discarded,
                buffer.size()
            );
        }
        Ok(stats)
    }

    /// Rebuild from whatever the coordinator shipped, then release it
    pub fn rebuild_from_dispatched(&mut self, context: DispatchedContext) -> Result<RebuildStats> {
        let mut buffer = ContextBuffer::from_dispatched(context)?;
        let stats = self.rebuild_query_context(&mut buffer)?;
        buffer.drop_context()?;
        Ok(stats)
    }

    /// Catalog lookup through the worker's cache
    pub fn search(&self, catalog: Oid, key: Oid) -> Arc<Vec<CatalogTuple>> {
        self.syscache.search(&self.mirror, catalog, key)
    }

    /// Local path of a dispatched tablespace
    pub fn tablespace_path(&self, tablespace: Oid) -> Option<&str> {
        self.mirror.tablespace_path(tablespace)
    }

    /// Frame the storage facts of this statement's inserts
    pub fn sendback(&self, records: &[SendBackRecord]) -> Result<Vec<u8>> {
        let mut builder = pre_sendback_changed_catalog(self.segindex, records.len() as u32);
        for record in records {
            builder.add_sendback_changed_catalog_content(record)?;
        }
        builder.finish_sendback_changed_catalog()
    }
}
