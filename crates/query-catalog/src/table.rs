use crate::rows::CatalogRow;
use crate::tuple::HeapTuple;
use query_core::{Oid, Result};

/// A tuple together with its decoded row
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTuple {
    pub tuple: HeapTuple,
    pub row: CatalogRow,
}

impl CatalogTuple {
    pub fn new(tuple: HeapTuple) -> Result<Self> {
        let row = tuple.row()?;
        Ok(Self { tuple, row })
    }
}

/// In-memory catalog table: ordered tuples of one relation
#[derive(Debug, Clone, Default)]
pub struct CatalogTable {
    relid: Oid,
    tuples: Vec<CatalogTuple>,
}

impl CatalogTable {
    pub fn new(relid: Oid) -> Self {
        Self {
            relid,
            tuples: Vec::new(),
        }
    }

    pub fn relid(&self) -> Oid {
        self.relid
    }

    /// Decode and append a tuple
    pub fn insert(&mut self, tuple: HeapTuple) -> Result<()> {
        self.tuples.push(CatalogTuple::new(tuple)?);
        Ok(())
    }

    /// Append an already decoded tuple
    pub fn push(&mut self, tuple: CatalogTuple) {
        self.tuples.push(tuple);
    }

    /// Tuples whose key column equals `key`
    pub fn scan(&self, key: Oid) -> impl Iterator<Item = &CatalogTuple> {
        self.tuples.iter().filter(move |t| t.row.key() == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogTuple> {
        self.tuples.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CatalogTuple> {
        self.tuples.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}
