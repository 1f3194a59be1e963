//! Object ids fixed at bootstrap
//!
//! Anything below [`FIRST_NORMAL_OBJECT_ID`](crate::FIRST_NORMAL_OBJECT_ID) is
//! present on every node and never travels in a dispatched context.

use crate::Oid;

// System catalogs
pub const PG_TYPE: Oid = 1247;
pub const PG_ATTRIBUTE: Oid = 1249;
pub const PG_CLASS: Oid = 1259;
pub const PG_ATTRDEF: Oid = 2604;
pub const PG_CONSTRAINT: Oid = 2606;
pub const PG_NAMESPACE: Oid = 2615;
pub const GP_FASTSEQUENCE: Oid = 5043;
pub const PG_EXTTABLE: Oid = 6040;
pub const PG_APPENDONLY: Oid = 6105;

// Namespaces
pub const PG_CATALOG_NAMESPACE: Oid = 11;
pub const PG_TOAST_NAMESPACE: Oid = 99;
pub const PG_PUBLIC_NAMESPACE: Oid = 2200;
pub const PG_BITMAPINDEX_NAMESPACE: Oid = 3012;
pub const PG_AOSEGMENT_NAMESPACE: Oid = 6104;

// Tablespaces
pub const DEFAULT_TABLESPACE: Oid = 1663;
pub const GLOBAL_TABLESPACE: Oid = 1664;

// Functions and types referenced by default expressions
pub const NEXTVAL_FUNC: Oid = 1574;
pub const REGCLASS_TYPE: Oid = 2205;

/// Namespaces every node already has, never dispatched.
pub const BUILTIN_NAMESPACES: [Oid; 5] = [
    PG_CATALOG_NAMESPACE,
    PG_TOAST_NAMESPACE,
    PG_BITMAPINDEX_NAMESPACE,
    PG_PUBLIC_NAMESPACE,
    PG_AOSEGMENT_NAMESPACE,
];

pub fn is_builtin_namespace(oid: Oid) -> bool {
    BUILTIN_NAMESPACES.contains(&oid)
}

pub fn is_builtin_tablespace(oid: Oid) -> bool {
    oid == DEFAULT_TABLESPACE || oid == GLOBAL_TABLESPACE
}
