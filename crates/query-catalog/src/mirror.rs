//! Worker-side catalog mirror
//!
//! Populated solely from a dispatched query context. A mirror table exists
//! once a tuple or an empty-table marker for its relation has been seen.

use crate::source::CatalogSource;
use crate::table::{CatalogTable, CatalogTuple};
use crate::tuple::HeapTuple;
use ahash::AHashMap;
use query_core::{Oid, Result, TransactionId};

#[derive(Debug, Default)]
pub struct CatalogMirror {
    tables: AHashMap<Oid, CatalogTable>,
    tablespaces: AHashMap<Oid, String>,
    master_xid: Option<TransactionId>,
}

impl CatalogMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_master_xid(&mut self, xid: TransactionId) {
        self.master_xid = Some(xid);
    }

    /// Coordinator transaction the statement's visibility is judged against
    pub fn master_xid(&self) -> Option<TransactionId> {
        self.master_xid
    }

    pub fn bind_tablespace(&mut self, tablespace: Oid, path: String) {
        self.tablespaces.insert(tablespace, path);
    }

    pub fn tablespace_path(&self, tablespace: Oid) -> Option<&str> {
        self.tablespaces.get(&tablespace).map(String::as_str)
    }

    pub fn tablespace_count(&self) -> usize {
        self.tablespaces.len()
    }

    pub fn has_table(&self, relid: Oid) -> bool {
        self.tables.contains_key(&relid)
    }

    pub fn table(&self, relid: Oid) -> Option<&CatalogTable> {
        self.tables.get(&relid)
    }

    /// Create an empty table for `relid`. Returns false if it already exists.
    pub fn create_empty_table(&mut self, relid: Oid) -> bool {
        if self.tables.contains_key(&relid) {
            return false;
        }
        self.tables.insert(relid, CatalogTable::new(relid));
        true
    }

    /// Append a tuple, creating the table on first sight
    pub fn insert_tuple(&mut self, relid: Oid, tuple: HeapTuple) -> Result<()> {
        self.tables
            .entry(relid)
            .or_insert_with(|| CatalogTable::new(relid))
            .insert(tuple)
    }

    pub fn table_ids(&self) -> Vec<Oid> {
        let mut ids: Vec<Oid> = self.tables.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn tuple_count(&self) -> usize {
        self.tables.values().map(CatalogTable::len).sum()
    }
}

impl CatalogSource for CatalogMirror {
    fn scan(&self, catalog: Oid, key: Oid) -> Vec<CatalogTuple> {
        self.tables
            .get(&catalog)
            .map(|t| t.scan(key).cloned().collect())
            .unwrap_or_default()
    }

    fn scan_all(&self, catalog: Oid) -> Vec<CatalogTuple> {
        self.tables
            .get(&catalog)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }
}
