//! In-memory coordinator catalog
//!
//! Holds the authoritative catalog tables, tablespace locations, the
//! inheritance graph and privilege grants for a coordinator. Safe to share
//! between threads; all state sits behind a single read-write lock.

use crate::rows::CatalogRow;
use crate::source::{CatalogSource, CatalogStore, CoordinatorCatalog, PrivilegeChecker};
use crate::table::{CatalogTable, CatalogTuple};
use crate::tuple::{HeapTuple, ItemPointer};
use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use query_core::oids;
use query_core::{AclMode, ContentId, Oid, QueryError, Result};

const SYSTEM_CATALOGS: [Oid; 9] = [
    oids::PG_CLASS,
    oids::PG_NAMESPACE,
    oids::PG_TYPE,
    oids::PG_ATTRIBUTE,
    oids::PG_ATTRDEF,
    oids::PG_CONSTRAINT,
    oids::PG_APPENDONLY,
    oids::PG_EXTTABLE,
    oids::GP_FASTSEQUENCE,
];

#[derive(Debug, Default)]
struct Inner {
    tables: AHashMap<Oid, CatalogTable>,
    /// Location prefix per tablespace; the content id is appended
    tablespaces: AHashMap<Oid, String>,
    inheritance: AHashMap<Oid, Vec<Oid>>,
    grants: AHashSet<(Oid, Oid, AclMode)>,
}

#[derive(Debug)]
pub struct MemoryCatalog {
    inner: RwLock<Inner>,
    default_tablespace: Oid,
    current_user: Oid,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Empty catalog whose database lives in `pg_default`, queried as the bootstrap superuser
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for catalog in SYSTEM_CATALOGS {
            inner.tables.insert(catalog, CatalogTable::new(catalog));
        }
        Self {
            inner: RwLock::new(inner),
            default_tablespace: oids::DEFAULT_TABLESPACE,
            current_user: 10,
        }
    }

    pub fn with_default_tablespace(mut self, tablespace: Oid) -> Self {
        self.default_tablespace = tablespace;
        self
    }

    pub fn with_current_user(mut self, user: Oid) -> Self {
        self.current_user = user;
        self
    }

    /// Register a tablespace. Content `n` resolves to `format!("{prefix}{n}")`.
    pub fn add_tablespace(&self, tablespace: Oid, prefix: impl Into<String>) {
        self.inner.write().tablespaces.insert(tablespace, prefix.into());
    }

    /// Record `children` as direct inheritors of `parent`
    pub fn add_inheritance(&self, parent: Oid, children: &[Oid]) {
        self.inner
            .write()
            .inheritance
            .entry(parent)
            .or_default()
            .extend_from_slice(children);
    }

    pub fn grant(&self, user: Oid, object: Oid, mode: AclMode) {
        self.inner.write().grants.insert((user, object, mode));
    }

    pub fn revoke(&self, user: Oid, object: Oid, mode: AclMode) {
        self.inner.write().grants.remove(&(user, object, mode));
    }

    /// Insert a row into its system catalog
    pub fn insert(&self, row: CatalogRow) -> Result<()> {
        let catalog = row.catalog_id().ok_or_else(|| {
            QueryError::CatalogInconsistency(format!(
                "{} rows need an explicit catalog relation",
                row.kind_name()
            ))
        })?;
        self.insert_into(catalog, row)
    }

    /// Insert a row into `catalog`
    pub fn insert_into(&self, catalog: Oid, row: CatalogRow) -> Result<()> {
        let mut inner = self.inner.write();
        let table = inner
            .tables
            .entry(catalog)
            .or_insert_with(|| CatalogTable::new(catalog));
        let ctid = ItemPointer::new(0, table.len() as u16 + 1);
        let tuple = HeapTuple::form(catalog, ctid, &row)?;
        table.push(CatalogTuple { tuple, row });
        Ok(())
    }

    /// Create an empty catalog relation, such as a new segment-file relation
    pub fn create_table(&self, catalog: Oid) {
        self.inner
            .write()
            .tables
            .entry(catalog)
            .or_insert_with(|| CatalogTable::new(catalog));
    }

    pub fn row_count(&self, catalog: Oid) -> usize {
        self.inner
            .read()
            .tables
            .get(&catalog)
            .map_or(0, |t| t.len())
    }
}

impl CatalogSource for MemoryCatalog {
    fn scan(&self, catalog: Oid, key: Oid) -> Vec<CatalogTuple> {
        self.inner
            .read()
            .tables
            .get(&catalog)
            .map(|t| t.scan(key).cloned().collect())
            .unwrap_or_default()
    }

    fn scan_all(&self, catalog: Oid) -> Vec<CatalogTuple> {
        self.inner
            .read()
            .tables
            .get(&catalog)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl CoordinatorCatalog for MemoryCatalog {
    fn database_default_tablespace(&self) -> Oid {
        self.default_tablespace
    }

    fn tablespace_location(&self, tablespace: Oid, content: ContentId) -> Option<String> {
        self.inner
            .read()
            .tablespaces
            .get(&tablespace)
            .map(|prefix| format!("{}{}", prefix, content))
    }

    fn inheritors(&self, relid: Oid) -> Vec<Oid> {
        let inner = self.inner.read();
        let mut out = vec![relid];
        let mut i = 0;
        while i < out.len() {
            if let Some(children) = inner.inheritance.get(&out[i]) {
                for child in children {
                    if !out.contains(child) {
                        out.push(*child);
                    }
                }
            }
            i += 1;
        }
        out
    }

    fn current_user(&self) -> Oid {
        self.current_user
    }
}

impl CatalogStore for MemoryCatalog {
    fn upsert(
        &self,
        catalog: Oid,
        row: CatalogRow,
        matches: &dyn Fn(&CatalogRow) -> bool,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let table = inner.tables.get_mut(&catalog).ok_or_else(|| {
            QueryError::CatalogInconsistency(format!("catalog relation {} does not exist", catalog))
        })?;
        if let Some(existing) = table.iter_mut().find(|t| matches(&t.row)) {
            let ctid = existing.tuple.header.ctid;
            existing.tuple = HeapTuple::form(catalog, ctid, &row)?;
            existing.row = row;
            return Ok(());
        }
        let ctid = ItemPointer::new(0, table.len() as u16 + 1);
        let tuple = HeapTuple::form(catalog, ctid, &row)?;
        table.push(CatalogTuple { tuple, row });
        Ok(())
    }
}

impl PrivilegeChecker for MemoryCatalog {
    fn has_privilege(&self, user: Oid, object: Oid, mode: AclMode) -> bool {
        let owner = self
            .relation(object)
            .map(|(_, class)| class.relowner)
            .ok();
        if owner == Some(user) {
            return true;
        }
        self.inner.read().grants.contains(&(user, object, mode))
    }
}
