//! Catalog access seams
//!
//! The collector reads through [`CoordinatorCatalog`], the send-back commit
//! writes through [`CatalogStore`], and workers read their rebuilt mirror
//! through [`CatalogSource`].

use crate::rows::{CatalogRow, PgClass};
use crate::table::CatalogTuple;
use query_core::oids;
use query_core::{AclMode, ContentId, Oid, QueryError, Result};

/// Read access to catalog tuples
pub trait CatalogSource {
    /// Tuples of `catalog` whose key column equals `key`
    fn scan(&self, catalog: Oid, key: Oid) -> Vec<CatalogTuple>;

    /// Every tuple of `catalog`
    fn scan_all(&self, catalog: Oid) -> Vec<CatalogTuple>;

    /// First tuple of `catalog` with key `key`
    fn lookup(&self, catalog: Oid, key: Oid) -> Option<CatalogTuple> {
        self.scan(catalog, key).into_iter().next()
    }

    /// pg_class entry of `relid`
    fn relation(&self, relid: Oid) -> Result<(CatalogTuple, PgClass)> {
        let tuple = self
            .lookup(oids::PG_CLASS, relid)
            .ok_or_else(|| QueryError::cache_lookup_failed("relation", relid))?;
        match &tuple.row {
            CatalogRow::Class(class) => {
                let class = class.clone();
                Ok((tuple, class))
            }
            other => Err(QueryError::CatalogInconsistency(format!(
                "pg_class lookup for {} returned a {} row",
                relid,
                other.kind_name()
            ))),
        }
    }
}

/// The coordinator's authoritative catalog
pub trait CoordinatorCatalog: CatalogSource {
    /// Default tablespace of the current database
    fn database_default_tablespace(&self) -> Oid;

    /// Filesystem location of `tablespace` for one content
    fn tablespace_location(&self, tablespace: Oid, content: ContentId) -> Option<String>;

    /// `relid` followed by every relation inheriting from it
    fn inheritors(&self, relid: Oid) -> Vec<Oid>;

    /// Whether `relid` has members besides itself
    fn is_partitioned(&self, relid: Oid) -> bool {
        self.inheritors(relid).len() > 1
    }

    /// User the current statement runs as
    fn current_user(&self) -> Oid;
}

/// Write access used when committing worker-reported storage facts
pub trait CatalogStore: CatalogSource {
    /// Replace the first row of `catalog` accepted by `matches`, or append `row`
    fn upsert(
        &self,
        catalog: Oid,
        row: CatalogRow,
        matches: &dyn Fn(&CatalogRow) -> bool,
    ) -> Result<()>;
}

/// Access-control predicate
pub trait PrivilegeChecker {
    fn has_privilege(&self, user: Oid, object: Oid, mode: AclMode) -> bool;
}
