//! Error types for query-context dispatching

use query_core::QueryError;
use thiserror::Error;

/// Errors raised while building, shipping or rebuilding a query context
#[derive(Error, Debug)]
pub enum DistributedError {
    /// Context buffer or spill file failure
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed or truncated stream
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Rejected dispatch configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed or written
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Catalog, privilege or unsupported-construct failure
    #[error("Query engine error: {0}")]
    QueryError(#[from] QueryError),
}

impl DistributedError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        DistributedError::ProtocolError(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        DistributedError::QueryError(QueryError::CatalogInconsistency(msg.into()))
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        DistributedError::QueryError(QueryError::NotImplemented(msg.into()))
    }

    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            DistributedError::IoError(_) | DistributedError::QueryError(QueryError::IoError(_))
        )
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, DistributedError::ProtocolError(_))
    }

    pub fn is_catalog_inconsistency(&self) -> bool {
        matches!(
            self,
            DistributedError::QueryError(QueryError::CatalogInconsistency(_))
        )
    }

    pub fn is_privilege_error(&self) -> bool {
        matches!(self, DistributedError::QueryError(QueryError::PrivilegeError(_)))
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, DistributedError::QueryError(QueryError::NotImplemented(_)))
    }
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DistributedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(DistributedError::protocol("bad tag").is_protocol_error());
        assert!(DistributedError::catalog("missing").is_catalog_inconsistency());
        assert!(DistributedError::not_implemented("cte").is_not_implemented());

        let io: DistributedError =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short").into();
        assert!(io.is_io_error());
        assert!(!io.is_protocol_error());

        let denied: DistributedError = QueryError::PrivilegeError("seq".into()).into();
        assert!(denied.is_privilege_error());
    }

    #[test]
    fn test_display() {
        let err = DistributedError::protocol("unknown item tag 9");
        assert_eq!(err.to_string(), "Protocol error: unknown item tag 9");
    }
}
