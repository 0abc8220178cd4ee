//! Record store abstraction for pluggable storage implementations.
//!
//! A record store hands out stable 64-bit [`RecordId`]s and keeps one binary
//! record per identifier. Records may be empty (`None`), which is how the
//! catalog reserves identifiers without giving them content.
//!
//! ## Transactions
//!
//! Stores are transactional at the granularity of one `commit()`: everything
//! written since the previous commit becomes durable together. Stores that
//! buffer writes can also `rollback()`; stores that cannot report
//! `supports_rollback() == false` and return `Unsupported`.
//!
//! ## Implementing a Custom Backend
//!
//! ```rust,ignore
//! use tessdb_store::storage_trait::{RecordStore, Result};
//!
//! pub struct MyStore { /* ... */ }
//!
//! impl RecordStore for MyStore {
//!     fn put(&self, value: Option<&[u8]>) -> Result<RecordId> {
//!         // Allocate the next identifier and store the value
//!         todo!()
//!     }
//!     // ... implement other required methods
//! }
//! ```

use std::any::Any;
use std::fmt;
use tessdb_commons::RecordId;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Record identifier was never allocated or has been deleted
    RecordNotFound(RecordId),

    /// Mutation attempted on a read-only store
    ReadOnly(String),

    /// Operation attempted after `close()`
    Closed,

    /// Generic I/O error from underlying storage
    IoError(String),

    /// Serialization/deserialization error
    SerializationError(String),

    /// Operation not supported by this backend
    Unsupported(String),

    /// Other errors
    Other(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::RecordNotFound(recid) => write!(f, "Record not found: {}", recid),
            StorageError::ReadOnly(msg) => write!(f, "Store is read-only: {}", msg),
            StorageError::Closed => write!(f, "Store is closed"),
            StorageError::IoError(msg) => write!(f, "I/O error: {}", msg),
            StorageError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::Unsupported(msg) => write!(f, "Unsupported operation: {}", msg),
            StorageError::Other(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Trait for pluggable record store implementations.
///
/// Implementations must be thread-safe (Send + Sync); callers coordinate
/// higher-level locking themselves.
pub trait RecordStore: Send + Sync {
    /// Allocates a new record holding `value` and returns its identifier.
    ///
    /// Identifiers are handed out in increasing order starting at the store's
    /// first identifier and are never reused.
    fn put(&self, value: Option<&[u8]>) -> Result<RecordId>;

    /// Reads a record.
    ///
    /// Returns `Ok(None)` for an empty record and `RecordNotFound` for an
    /// identifier that was never allocated or has been deleted.
    fn get(&self, recid: RecordId) -> Result<Option<Vec<u8>>>;

    /// Replaces the content of an existing record.
    fn update(&self, recid: RecordId, value: Option<&[u8]>) -> Result<()>;

    /// Deletes a record. Its identifier is not reused.
    fn delete(&self, recid: RecordId) -> Result<()>;

    /// Makes every write since the previous commit durable.
    fn commit(&self) -> Result<()>;

    /// Discards every write since the previous commit.
    fn rollback(&self) -> Result<()> {
        Err(StorageError::Unsupported(
            "rollback is not supported by this store".to_string(),
        ))
    }

    /// Whether `rollback()` is available.
    fn supports_rollback(&self) -> bool {
        false
    }

    /// Whether mutations are rejected.
    fn is_read_only(&self) -> bool;

    /// Whether no record has ever been allocated in this store.
    fn is_empty(&self) -> Result<bool>;

    /// Releases the store. Uncommitted writes are discarded. Idempotent.
    fn close(&self) -> Result<()>;

    /// Whether `close()` has been called.
    fn is_closed(&self) -> bool;

    /// Downcast support for callers that need a concrete backend.
    fn as_any(&self) -> &dyn Any;
}
