//! Test utilities for tessdb-store.
//!
//! Provides helpers for setting up test stores with minimal boilerplate.

use crate::file_store::FileRecordStore;
use crate::memory_store::{MemoryRecordStore, MemoryStoreOptions};
use crate::storage_trait::{RecordStore, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Snapshot-file store location that is cleaned up on drop.
pub struct TestStoreDir {
    /// Temporary directory (kept alive for the duration of the test)
    temp_dir: TempDir,
}

impl TestStoreDir {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Path of the snapshot file inside the temporary directory.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().join("test.db")
    }

    /// Open a writable transactional store.
    ///
    /// ```no_run
    /// use tessdb_store::test_utils::TestStoreDir;
    ///
    /// let dir = TestStoreDir::new().unwrap();
    /// let store = dir.open().unwrap();
    /// // ... close it and call `dir.open_read_only()` to inspect what was committed
    /// ```
    pub fn open(&self) -> Result<Arc<dyn RecordStore>> {
        Ok(Arc::new(FileRecordStore::open(self.path(), false, true)?))
    }

    /// Open the same file read-only.
    pub fn open_read_only(&self) -> Result<Arc<dyn RecordStore>> {
        Ok(Arc::new(FileRecordStore::open(self.path(), true, true)?))
    }
}

/// Transactional heap store as a trait object.
pub fn memory_store() -> Arc<dyn RecordStore> {
    Arc::new(MemoryRecordStore::new())
}

/// Heap store without rollback support.
pub fn direct_memory_store() -> Arc<dyn RecordStore> {
    Arc::new(MemoryRecordStore::with_options(MemoryStoreOptions {
        transactional: false,
        first_recid: 0,
    }))
}

/// Heap store whose identifiers start at `first_recid` instead of 0.
pub fn offset_memory_store(first_recid: u64) -> Arc<dyn RecordStore> {
    Arc::new(MemoryRecordStore::with_options(MemoryStoreOptions {
        transactional: true,
        first_recid,
    }))
}
