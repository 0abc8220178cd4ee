//! Heap-backed record store.
//!
//! `RecordTable` holds the committed records plus a [`WriteSet`] of pending
//! writes. `MemoryRecordStore` wraps it behind a lock; `FileRecordStore`
//! reuses the same table and adds snapshot persistence on commit.

use crate::storage_trait::{RecordStore, Result, StorageError};
use crate::write_set::{Slot, WriteSet};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tessdb_commons::RecordId;

/// Options for heap-backed tables.
#[derive(Debug, Clone, Copy)]
pub struct MemoryStoreOptions {
    /// Buffer writes until commit. Non-transactional tables apply every write
    /// immediately and cannot roll back.
    pub transactional: bool,
    /// First identifier handed out by `put()`.
    pub first_recid: u64,
}

impl Default for MemoryStoreOptions {
    fn default() -> Self {
        Self {
            transactional: true,
            first_recid: 0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct RecordTable {
    committed: BTreeMap<u64, Option<Vec<u8>>>,
    committed_next: u64,
    first_recid: u64,
    pending: WriteSet,
    transactional: bool,
}

impl RecordTable {
    pub(crate) fn new(options: MemoryStoreOptions) -> Self {
        Self::from_parts(BTreeMap::new(), options.first_recid, options)
    }

    pub(crate) fn from_parts(
        committed: BTreeMap<u64, Option<Vec<u8>>>,
        committed_next: u64,
        options: MemoryStoreOptions,
    ) -> Self {
        Self {
            committed,
            committed_next,
            first_recid: options.first_recid,
            pending: WriteSet::new(committed_next),
            transactional: options.transactional,
        }
    }

    pub(crate) fn put(&mut self, value: Option<&[u8]>) -> RecordId {
        let recid = self.pending.allocate(value.map(|v| v.to_vec()));
        self.apply_if_direct();
        RecordId::new(recid)
    }

    pub(crate) fn get(&self, recid: RecordId) -> Result<Option<Vec<u8>>> {
        match self.pending.lookup(recid.as_u64()) {
            Some(Slot::Value(v)) => Ok(v.clone()),
            Some(Slot::Deleted) => Err(StorageError::RecordNotFound(recid)),
            None => self
                .committed
                .get(&recid.as_u64())
                .cloned()
                .ok_or(StorageError::RecordNotFound(recid)),
        }
    }

    pub(crate) fn update(&mut self, recid: RecordId, value: Option<&[u8]>) -> Result<()> {
        self.get(recid)?;
        self.pending
            .set(recid.as_u64(), Slot::Value(value.map(|v| v.to_vec())));
        self.apply_if_direct();
        Ok(())
    }

    pub(crate) fn delete(&mut self, recid: RecordId) -> Result<()> {
        self.get(recid)?;
        self.pending.set(recid.as_u64(), Slot::Deleted);
        self.apply_if_direct();
        Ok(())
    }

    /// Move pending writes into the committed map.
    pub(crate) fn apply(&mut self) {
        for (recid, slot) in self.pending.drain() {
            match slot {
                Slot::Value(v) => {
                    self.committed.insert(recid, v);
                }
                Slot::Deleted => {
                    self.committed.remove(&recid);
                }
            }
        }
        self.committed_next = self.pending.next_recid();
    }

    pub(crate) fn rollback(&mut self) -> Result<()> {
        if !self.transactional {
            return Err(StorageError::Unsupported(
                "rollback requires a transactional store".to_string(),
            ));
        }
        self.pending.discard(self.committed_next);
        Ok(())
    }

    pub(crate) fn discard_pending(&mut self) {
        self.pending.discard(self.committed_next);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.next_recid() == self.first_recid
    }

    pub(crate) fn is_transactional(&self) -> bool {
        self.transactional
    }

    pub(crate) fn committed(&self) -> (&BTreeMap<u64, Option<Vec<u8>>>, u64) {
        (&self.committed, self.committed_next)
    }

    fn apply_if_direct(&mut self) {
        if !self.transactional {
            self.apply();
        }
    }
}

/// In-memory record store; contents are lost on close.
///
/// ## Example
///
/// ```rust
/// use tessdb_store::{MemoryRecordStore, RecordStore};
///
/// let store = MemoryRecordStore::new();
/// let recid = store.put(Some(b"hello")).unwrap();
/// store.commit().unwrap();
/// assert_eq!(store.get(recid).unwrap(), Some(b"hello".to_vec()));
/// ```
#[derive(Debug)]
pub struct MemoryRecordStore {
    table: RwLock<RecordTable>,
    closed: AtomicBool,
}

impl MemoryRecordStore {
    /// Creates a transactional store whose first identifier is 0.
    pub fn new() -> Self {
        Self::with_options(MemoryStoreOptions::default())
    }

    pub fn with_options(options: MemoryStoreOptions) -> Self {
        Self {
            table: RwLock::new(RecordTable::new(options)),
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    fn put(&self, value: Option<&[u8]>) -> Result<RecordId> {
        self.check_open()?;
        Ok(self.table.write().put(value))
    }

    fn get(&self, recid: RecordId) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        self.table.read().get(recid)
    }

    fn update(&self, recid: RecordId, value: Option<&[u8]>) -> Result<()> {
        self.check_open()?;
        self.table.write().update(recid, value)
    }

    fn delete(&self, recid: RecordId) -> Result<()> {
        self.check_open()?;
        self.table.write().delete(recid)
    }

    fn commit(&self) -> Result<()> {
        self.check_open()?;
        self.table.write().apply();
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.check_open()?;
        self.table.write().rollback()
    }

    fn supports_rollback(&self) -> bool {
        self.table.read().is_transactional()
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn is_empty(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.table.read().is_empty())
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.table.write().discard_pending();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_sequential() {
        let store = MemoryRecordStore::new();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.put(None).unwrap(), RecordId::new(0));
        assert_eq!(store.put(Some(b"a")).unwrap(), RecordId::new(1));
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn test_first_recid_offset() {
        let store = MemoryRecordStore::with_options(MemoryStoreOptions {
            first_recid: 100,
            ..Default::default()
        });
        assert!(store.is_empty().unwrap());
        assert_eq!(store.put(None).unwrap(), RecordId::new(100));
    }

    #[test]
    fn test_empty_record_vs_missing() {
        let store = MemoryRecordStore::new();
        let recid = store.put(None).unwrap();
        assert_eq!(store.get(recid).unwrap(), None);
        assert_eq!(
            store.get(RecordId::new(99)),
            Err(StorageError::RecordNotFound(RecordId::new(99)))
        );
    }

    #[test]
    fn test_update_and_delete() {
        let store = MemoryRecordStore::new();
        let recid = store.put(Some(b"v1")).unwrap();
        store.update(recid, Some(b"v2")).unwrap();
        assert_eq!(store.get(recid).unwrap(), Some(b"v2".to_vec()));

        store.delete(recid).unwrap();
        assert!(store.get(recid).is_err());
        assert!(store.update(recid, None).is_err());
        // identifiers are never reused
        assert_eq!(store.put(None).unwrap(), RecordId::new(1));
    }

    #[test]
    fn test_rollback_discards_uncommitted() {
        let store = MemoryRecordStore::new();
        let kept = store.put(Some(b"kept")).unwrap();
        store.commit().unwrap();

        let dropped = store.put(Some(b"dropped")).unwrap();
        store.update(kept, Some(b"changed")).unwrap();
        store.rollback().unwrap();

        assert_eq!(store.get(kept).unwrap(), Some(b"kept".to_vec()));
        assert!(store.get(dropped).is_err());
        // allocation counter rewinds with the transaction
        assert_eq!(store.put(None).unwrap(), dropped);
    }

    #[test]
    fn test_non_transactional_cannot_rollback() {
        let store = MemoryRecordStore::with_options(MemoryStoreOptions {
            transactional: false,
            ..Default::default()
        });
        assert!(!store.supports_rollback());
        store.put(Some(b"x")).unwrap();
        assert!(matches!(store.rollback(), Err(StorageError::Unsupported(_))));
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let store = MemoryRecordStore::new();
        store.close().unwrap();
        store.close().unwrap();
        assert!(store.is_closed());
        assert_eq!(store.put(None), Err(StorageError::Closed));
    }
}
