//! # tessdb-store
//!
//! Low-level record store abstraction for tessdb.
//!
//! ## Architecture
//!
//! ```text
//! tessdb-catalog (named collections, catalog, lifecycle)
//!     ↓
//! tessdb-store (RecordStore: put/get/update/delete by RecordId, commit/rollback)
//!     ↓
//! heap table | snapshot file | RocksDB
//! ```
//!
//! ## Backends
//!
//! - **MemoryRecordStore**: heap only, lost on close
//! - **FileRecordStore**: heap table persisted as one snapshot file per commit
//! - **RocksRecordStore**: RocksDB database (cargo feature `rocksdb`)

pub mod file_store;
pub mod memory_store;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_impl;
pub mod storage_trait;
mod write_set;

pub use file_store::FileRecordStore;
pub use memory_store::{MemoryRecordStore, MemoryStoreOptions};
#[cfg(feature = "rocksdb")]
pub use rocksdb_impl::RocksRecordStore;
pub use storage_trait::{RecordStore, Result, StorageError};

// Re-export RecordId from tessdb-commons to avoid import inconsistency
pub use tessdb_commons::RecordId;

// Make test_utils available for testing in dependent crates
pub mod test_utils;
