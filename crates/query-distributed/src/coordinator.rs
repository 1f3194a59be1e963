//! Coordinator role

use crate::buffer::{ContextBuffer, DispatchedContext};
use crate::codec::{write_item, WireItem};
use crate::collector::{CatalogCollector, CollectStats};
use crate::config::DispatchConfig;
use crate::error::{DistributedError, Result};
use crate::sendback::{self, SendBackMessage, SendBackRecord};
use crate::spill::TransactionContext;
use query_catalog::{CatalogStore, CoordinatorCatalog, PrivilegeChecker};
use query_core::{ContentId, MASTER_CONTENT_ID};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Owns the authoritative catalog and builds one query context per statement
pub struct Coordinator<C> {
    /// Authoritative catalog
    catalog: Arc<C>,
    /// Dispatch settings, validated on construction
    config: DispatchConfig,
    /// Session the spill file names are scoped to
    session_id: u32,
    /// Next context id within the session
    counter: AtomicU32,
}

impl<C> Coordinator<C>
where
    C: CoordinatorCatalog + CatalogStore + PrivilegeChecker,
{
    /// Create a new coordinator, rejecting an invalid config
    pub fn new(catalog: Arc<C>, config: DispatchConfig, session_id: u32) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            catalog,
            config,
            session_id,
            counter: AtomicU32::new(0),
        })
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Directory spilled contexts are written to
    pub fn shared_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.config.shared_dir {
            return Ok(dir.clone());
        }
        let tablespace = self.catalog.database_default_tablespace();
        self.catalog
            .tablespace_location(tablespace, MASTER_CONTENT_ID)
            .map(PathBuf::from)
            .ok_or_else(|| {
                DistributedError::catalog(format!(
                    "default tablespace {} has no location for the coordinator",
                    tablespace
                ))
            })
    }

    /// Fresh context buffer for the next statement, MasterXid already written
    pub fn create_query_context_info(&self, txn: &mut TransactionContext) -> Result<ContextBuffer> {
        let dir = self.shared_dir()?;
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut buffer =
            ContextBuffer::create(&dir, self.session_id, counter, self.config.memory_limit_bytes());
        write_item(&mut buffer, txn, &WireItem::MasterXid(txn.xid()))?;
        Ok(buffer)
    }

    /// Collector writing into `buffer` with the configured debug flags
    pub fn collector<'a>(
        &'a self,
        buffer: &'a mut ContextBuffer,
        txn: &'a mut TransactionContext,
    ) -> CatalogCollector<'a> {
        CatalogCollector::new(self.catalog.as_ref(), self.catalog.as_ref(), buffer, txn)
            .with_debug(self.config.debug_print, self.config.debug_print_tuple)
    }

    /// Build, fill and seal the context of one statement
    pub fn dispatch_statement<F>(
        &self,
        txn: &mut TransactionContext,
        collect: F,
    ) -> Result<(DispatchedContext, CollectStats)>
    where
        F: FnOnce(&mut CatalogCollector<'_>) -> Result<()>,
    {
        let mut buffer = self.create_query_context_info(txn)?;
        let stats = {
            let mut collector = self.collector(&mut buffer, txn);
            collect(&mut collector)?;
            collector.stats().clone()
        };
        tracing::debug!(
            "Collected {} relations, {} tuples into {}",
            stats.relations,
            stats.tuples,
            buffer.path().display()
        );
        Ok((buffer.into_dispatched()?, stats))
    }

    pub fn update_catalog_modified_on_segments(
        &self,
        content: ContentId,
        record: &SendBackRecord,
    ) -> Result<()> {
        sendback::update_catalog_modified_on_segments(self.catalog.as_ref(), content, record)
    }

    /// Decode a worker's send-back message and commit every record in it
    pub fn apply_sendback(&self, bytes: &[u8]) -> Result<usize> {
        let message = SendBackMessage::decode(bytes)?;
        for record in &message.records {
            self.update_catalog_modified_on_segments(message.content, record)?;
        }
        tracing::info!(
            "Committed {} send-back records from content {}",
            message.records.len(),
            message.content
        );
        Ok(message.records.len())
    }
}
