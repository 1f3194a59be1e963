//! Catalog model for query-context dispatching
//!
//! The coordinator reads its authoritative catalog through the traits in
//! [`source`]; workers rebuild a [`CatalogMirror`] from the dispatched stream
//! and look rows up through a [`SysCache`].
//!
//! # Modules
//!
//! - [`rows`]: catalog row structs and the [`CatalogRow`] union
//! - [`tuple`]: raw tuple header and data as shipped on the wire
//! - [`table`]: ordered in-memory catalog tables
//! - [`source`]: catalog access traits
//! - [`memory`]: in-memory coordinator catalog
//! - [`mirror`]: worker-side catalog mirror
//! - [`cache`]: lookup cache and invalidation
//!
//! # Example
//!
//! ```ignore
//! use query_catalog::{CatalogRow, CatalogSource, MemoryCatalog, PgNamespace};
//! use query_core::oids;
//!
//! let catalog = MemoryCatalog::new();
//! catalog.insert(CatalogRow::Namespace(PgNamespace { oid: 16390, nspname: "sales".into() }))?;
//! let tuple = catalog.lookup(oids::PG_NAMESPACE, 16390);
//! ```

pub mod cache;
pub mod memory;
pub mod mirror;
pub mod rows;
pub mod source;
pub mod table;
pub mod tuple;

pub use cache::{CacheInvalidator, SysCache, SysCacheStats};
pub use memory::MemoryCatalog;
pub use mirror::CatalogMirror;
pub use rows::*;
pub use source::{CatalogSource, CatalogStore, CoordinatorCatalog, PrivilegeChecker};
pub use table::{CatalogTable, CatalogTuple};
pub use tuple::{HeapTuple, ItemPointer, TupleHeader, TUPLE_HEADER_SIZE};
