//! Query-context dispatching for Query Engine
//!
//! The coordinator captures the catalog facts a statement needs, writes them
//! as a self-delimiting binary stream and ships that stream to workers, which
//! rebuild an in-memory catalog mirror from it. After an append-optimized
//! insert each worker reports its storage growth back to the coordinator.
//!
//! # Architecture
//!
//! - **Coordinator**: owns the authoritative catalog, creates context buffers
//!   and commits send-back messages
//! - **CatalogCollector**: walks range tables, plans and relations
//! - **ContextBuffer**: in-memory stream that spills to shared storage past
//!   its memory limit
//! - **Worker**: rebuilds the mirror and frames send-back messages
//!
//! # Example
//!
//! ```ignore
//! use query_distributed::{Coordinator, DispatchConfig, TransactionContext, Worker};
//! use query_planner::RangeTblEntry;
//! use std::sync::Arc;
//!
//! let coordinator = Coordinator::new(Arc::new(catalog), DispatchConfig::default(), session_id)?;
//! let mut txn = TransactionContext::new(xid);
//!
//! let (context, _) = coordinator.dispatch_statement(&mut txn, |collector| {
//!     collector.prepare_dispatched_catalog(&[RangeTblEntry::relation(orders)])
//! })?;
//!
//! let mut worker = Worker::new(0, DispatchConfig::default());
//! worker.rebuild_from_dispatched(context)?;
//!
//! txn.finish(true);
//! ```
//!
//! # Modules
//!
//! - [`buffer`]: context buffer and its memory/file modes
//! - [`codec`]: wire items
//! - [`collector`]: coordinator-side catalog collection
//! - [`rebuilder`]: worker-side mirror reconstruction
//! - [`sendback`]: worker to coordinator storage reports
//! - [`spill`]: transaction-scoped removal of spill files
//! - [`coordinator`] and [`worker`]: the two roles

pub mod buffer;
pub mod codec;
pub mod collector;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod rebuilder;
pub mod sendback;
pub mod spill;
pub mod worker;

#[cfg(test)]
mod test_support;

// Re-exports
pub use buffer::{context_path, ContextBuffer, DispatchedContext};
pub use codec::{read_item, write_item, ItemTag, PayloadLayout, WireItem};
pub use collector::{tablespace_template, CatalogCollector, CollectStats, DispatchKey, SegnoMap};
pub use config::DispatchConfig;
pub use coordinator::Coordinator;
pub use error::{DistributedError, Result};
pub use rebuilder::{format_location, CatalogRebuilder, RebuildState, RebuildStats};
pub use sendback::{
    pre_sendback_changed_catalog, update_catalog_modified_on_segments, SendBackBuilder,
    SendBackMessage, SendBackRecord, SENDBACK_MESSAGE_TYPE,
};
pub use spill::TransactionContext;
pub use worker::Worker;
