use tessdb_commons::ObjectNameValidationError;
use tessdb_store::StorageError;
use thiserror::Error;

/// Errors raised by catalog, maker and lifecycle operations
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Illegal names, missing or contradictory parameters, type mismatch,
    /// create/open mode violations, foreign or uninitialized stores
    #[error("Wrong configuration: {0}")]
    WrongConfiguration(String),

    /// The catalog was written by a newer, incompatible release
    #[error("Store format not supported by this version: {0}")]
    NewFormatUnsupported(String),

    /// A value or reference could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation attempted after close
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Operation not available on this store (read-only, no rollback)
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    pub fn wrong_configuration(msg: impl Into<String>) -> Self {
        Self::WrongConfiguration(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<StorageError> for CatalogError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ReadOnly(msg) => {
                CatalogError::UnsupportedOperation(format!("store is read-only: {}", msg))
            }
            StorageError::Closed => CatalogError::IllegalState("store is closed".to_string()),
            StorageError::SerializationError(msg) => CatalogError::Serialization(msg),
            StorageError::Unsupported(msg) => CatalogError::UnsupportedOperation(msg),
            other => CatalogError::Storage(other),
        }
    }
}

impl From<ObjectNameValidationError> for CatalogError {
    fn from(err: ObjectNameValidationError) -> Self {
        CatalogError::WrongConfiguration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessdb_commons::{ObjectName, RecordId};

    #[test]
    fn test_storage_error_mapping() {
        let err: CatalogError = StorageError::ReadOnly("x.db".to_string()).into();
        assert!(matches!(err, CatalogError::UnsupportedOperation(_)));

        let err: CatalogError = StorageError::Closed.into();
        assert!(matches!(err, CatalogError::IllegalState(_)));

        let err: CatalogError = StorageError::RecordNotFound(RecordId::new(3)).into();
        assert_eq!(err.to_string(), "Storage error: Record not found: 3");
    }

    #[test]
    fn test_name_error_mapping() {
        let err: CatalogError = ObjectName::try_new("bad#name").unwrap_err().into();
        assert!(matches!(err, CatalogError::WrongConfiguration(_)));
    }
}
