use serde::{Deserialize, Serialize};

/// Object identifier
pub type Oid = u32;
/// Transaction identifier
pub type TransactionId = u32;
/// Segment index of a worker, or [`MASTER_CONTENT_ID`]
pub type ContentId = i32;

pub const INVALID_OID: Oid = 0;
pub const INVALID_TRANSACTION_ID: TransactionId = 0;
/// Content id that applies to the coordinator rather than a specific worker
pub const MASTER_CONTENT_ID: ContentId = -1;
/// First object id handed out to user objects
pub const FIRST_NORMAL_OBJECT_ID: Oid = 16384;

/// Whether the object was created at bootstrap
pub fn is_builtin_object(oid: Oid) -> bool {
    oid < FIRST_NORMAL_OBJECT_ID
}

/// Kind of object tracked when deduplicating a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Relation,
    Tablespace,
    Namespace,
}

/// Physical storage layout of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelStorage {
    Heap,
    AoRows,
    AoCols,
    External,
    Virtual,
    Foreign,
}

impl RelStorage {
    pub fn is_append_optimized(&self) -> bool {
        matches!(self, RelStorage::AoRows | RelStorage::AoCols)
    }

    pub fn as_char(&self) -> char {
        match self {
            RelStorage::Heap => 'h',
            RelStorage::AoRows => 'a',
            RelStorage::AoCols => 'c',
            RelStorage::External => 'x',
            RelStorage::Virtual => 'v',
            RelStorage::Foreign => 'f',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelKind {
    Relation,
    Index,
    Sequence,
    Toast,
    View,
    CompositeType,
    AoSegments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypType {
    Base,
    Composite,
    Domain,
    Enum,
    Pseudo,
}

/// Privilege requested in an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AclMode {
    Select,
    Insert,
    Update,
    Delete,
    Usage,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Relation => write!(f, "relation"),
            ObjectKind::Tablespace => write!(f, "tablespace"),
            ObjectKind::Namespace => write!(f, "namespace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_boundary() {
        assert!(is_builtin_object(1259));
        assert!(is_builtin_object(FIRST_NORMAL_OBJECT_ID - 1));
        assert!(!is_builtin_object(FIRST_NORMAL_OBJECT_ID));
    }

    #[test]
    fn test_append_optimized_storage() {
        assert!(RelStorage::AoRows.is_append_optimized());
        assert!(RelStorage::AoCols.is_append_optimized());
        assert!(!RelStorage::Heap.is_append_optimized());
        assert!(!RelStorage::External.is_append_optimized());
        assert_eq!(RelStorage::AoCols.as_char(), 'c');
    }
}
