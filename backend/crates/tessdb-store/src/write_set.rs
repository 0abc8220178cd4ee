//! Uncommitted writes buffered in front of a backend.
//!
//! Both the heap table and the RocksDB backend keep writes here until
//! `commit()`, which is what makes `rollback()` possible.

use std::collections::BTreeMap;

/// Pending state of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Value(Option<Vec<u8>>),
    Deleted,
}

#[derive(Debug, Default)]
pub(crate) struct WriteSet {
    writes: BTreeMap<u64, Slot>,
    next_recid: u64,
}

impl WriteSet {
    pub(crate) fn new(next_recid: u64) -> Self {
        Self {
            writes: BTreeMap::new(),
            next_recid,
        }
    }

    /// Allocate the next identifier for `value`.
    pub(crate) fn allocate(&mut self, value: Option<Vec<u8>>) -> u64 {
        let recid = self.next_recid;
        self.next_recid += 1;
        self.writes.insert(recid, Slot::Value(value));
        recid
    }

    pub(crate) fn set(&mut self, recid: u64, slot: Slot) {
        self.writes.insert(recid, slot);
    }

    pub(crate) fn lookup(&self, recid: u64) -> Option<&Slot> {
        self.writes.get(&recid)
    }

    pub(crate) fn next_recid(&self) -> u64 {
        self.next_recid
    }

    /// Take all buffered writes, keeping the allocation counter.
    pub(crate) fn drain(&mut self) -> BTreeMap<u64, Slot> {
        std::mem::take(&mut self.writes)
    }

    /// Drop buffered writes and rewind the allocation counter.
    pub(crate) fn discard(&mut self, committed_next: u64) {
        self.writes.clear();
        self.next_recid = committed_next;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        !self.writes.is_empty()
    }
}
