//! Catalog row model
//!
//! Only the columns the dispatcher reads, or a worker needs to plan and
//! execute against its mirror, are modelled.

use query_core::oids;
use query_core::{ContentId, Oid, QueryError, RelKind, RelStorage, Result, TypType};
use query_planner::Expr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgClass {
    pub oid: Oid,
    pub relname: String,
    pub relnamespace: Oid,
    pub reltype: Oid,
    pub relowner: Oid,
    pub reltablespace: Oid,
    pub reltoastrelid: Oid,
    pub relkind: RelKind,
    pub relstorage: RelStorage,
    pub relnatts: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgNamespace {
    pub oid: Oid,
    pub nspname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgType {
    pub oid: Oid,
    pub typname: String,
    pub typnamespace: Oid,
    pub typtype: TypType,
    /// Backing relation of a composite type
    pub typrelid: Oid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgAttribute {
    pub attrelid: Oid,
    pub attname: String,
    pub atttypid: Oid,
    pub attnum: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgAttrDef {
    pub adrelid: Oid,
    pub adnum: i16,
    pub adbin: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgConstraint {
    pub oid: Oid,
    pub conname: String,
    pub conrelid: Oid,
    pub contype: char,
    pub consrc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgAppendOnly {
    pub relid: Oid,
    pub segrelid: Oid,
    pub segidxid: Oid,
    pub blocksize: i32,
    pub compresstype: Option<String>,
    pub columnstore: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgExtTable {
    pub reloid: Oid,
    pub location: Vec<String>,
    pub fmttype: char,
    pub command: Option<String>,
}

/// gp_fastsequence row: next row number for one segment file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastSequence {
    /// Segment-file relation the counter belongs to
    pub objid: Oid,
    /// Segment-file number
    pub objmod: i64,
    pub last_sequence: i64,
    pub contentid: ContentId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEof {
    pub eof: i64,
    pub uncompressed_eof: i64,
}

impl FileEof {
    pub fn new(eof: i64, uncompressed_eof: i64) -> Self {
        Self {
            eof,
            uncompressed_eof,
        }
    }
}

/// Row of an append-optimized relation's segment-file relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoSegFile {
    pub segno: i32,
    pub content: ContentId,
    pub tupcount: i64,
    pub varblockcount: i64,
    /// One entry per physical file; a single entry for row storage
    pub eofs: Vec<FileEof>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CatalogRow {
    Class(PgClass),
    Namespace(PgNamespace),
    Type(PgType),
    Attribute(PgAttribute),
    AttrDef(PgAttrDef),
    Constraint(PgConstraint),
    AppendOnly(PgAppendOnly),
    ExtTable(PgExtTable),
    FastSequence(FastSequence),
    AoSegFile(AoSegFile),
}

impl CatalogRow {
    /// System catalog the row lives in. Segment-file rows live in a
    /// per-relation catalog and have none.
    pub fn catalog_id(&self) -> Option<Oid> {
        match self {
            CatalogRow::Class(_) => Some(oids::PG_CLASS),
            CatalogRow::Namespace(_) => Some(oids::PG_NAMESPACE),
            CatalogRow::Type(_) => Some(oids::PG_TYPE),
            CatalogRow::Attribute(_) => Some(oids::PG_ATTRIBUTE),
            CatalogRow::AttrDef(_) => Some(oids::PG_ATTRDEF),
            CatalogRow::Constraint(_) => Some(oids::PG_CONSTRAINT),
            CatalogRow::AppendOnly(_) => Some(oids::PG_APPENDONLY),
            CatalogRow::ExtTable(_) => Some(oids::PG_EXTTABLE),
            CatalogRow::FastSequence(_) => Some(oids::GP_FASTSEQUENCE),
            CatalogRow::AoSegFile(_) => None,
        }
    }

    /// Value of the column lookups on this catalog are keyed by
    pub fn key(&self) -> Oid {
        match self {
            CatalogRow::Class(r) => r.oid,
            CatalogRow::Namespace(r) => r.oid,
            CatalogRow::Type(r) => r.oid,
            CatalogRow::Attribute(r) => r.attrelid,
            CatalogRow::AttrDef(r) => r.adrelid,
            CatalogRow::Constraint(r) => r.conrelid,
            CatalogRow::AppendOnly(r) => r.relid,
            CatalogRow::ExtTable(r) => r.reloid,
            CatalogRow::FastSequence(r) => r.objid,
            CatalogRow::AoSegFile(r) => r.segno as Oid,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CatalogRow::Class(_) => "pg_class",
            CatalogRow::Namespace(_) => "pg_namespace",
            CatalogRow::Type(_) => "pg_type",
            CatalogRow::Attribute(_) => "pg_attribute",
            CatalogRow::AttrDef(_) => "pg_attrdef",
            CatalogRow::Constraint(_) => "pg_constraint",
            CatalogRow::AppendOnly(_) => "pg_appendonly",
            CatalogRow::ExtTable(_) => "pg_exttable",
            CatalogRow::FastSequence(_) => "gp_fastsequence",
            CatalogRow::AoSegFile(_) => "pg_aoseg",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| QueryError::SerializationError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (row, read): (CatalogRow, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| QueryError::SerializationError(e.to_string()))?;
        if read != bytes.len() {
            return Err(QueryError::SerializationError(format!(
                "{} trailing bytes after catalog row",
                bytes.len() - read
            )));
        }
        Ok(row)
    }

    pub fn as_class(&self) -> Option<&PgClass> {
        match self {
            CatalogRow::Class(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&PgType> {
        match self {
            CatalogRow::Type(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_attribute(&self) -> Option<&PgAttribute> {
        match self {
            CatalogRow::Attribute(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_attrdef(&self) -> Option<&PgAttrDef> {
        match self {
            CatalogRow::AttrDef(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_appendonly(&self) -> Option<&PgAppendOnly> {
        match self {
            CatalogRow::AppendOnly(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_fast_sequence(&self) -> Option<&FastSequence> {
        match self {
            CatalogRow::FastSequence(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_aoseg(&self) -> Option<&AoSegFile> {
        match self {
            CatalogRow::AoSegFile(r) => Some(r),
            _ => None,
        }
    }
}
