use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Catalog inconsistency: {0}")]
    CatalogInconsistency(String),

    #[error("Permission denied: {0}")]
    PrivilegeError(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl QueryError {
    /// Shorthand for a catalog lookup that came back empty
    pub fn cache_lookup_failed(what: &str, oid: crate::Oid) -> Self {
        QueryError::CatalogInconsistency(format!("cache lookup failed for {} {}", what, oid))
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
