//! RocksDB implementation of the RecordStore trait.
//!
//! Records live in the default column family under `r` + big-endian record
//! identifier; the allocation counter lives under a separate meta key. Writes
//! are buffered in a [`WriteSet`] and applied as one `WriteBatch` on commit.

use crate::storage_trait::{RecordStore, Result, StorageError};
use crate::write_set::{Slot, WriteSet};
use parking_lot::Mutex;
use rocksdb::{Options, WriteBatch, DB};
use std::any::Any;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tessdb_commons::RecordId;

const RECORD_PREFIX: u8 = b'r';
const META_NEXT_RECID: &[u8] = b"m:next_recid";

const TAG_EMPTY: u8 = 0;
const TAG_VALUE: u8 = 1;

fn record_key(recid: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = RECORD_PREFIX;
    key[1..].copy_from_slice(&recid.to_be_bytes());
    key
}

fn encode_record(value: &Option<Vec<u8>>) -> Vec<u8> {
    match value {
        None => vec![TAG_EMPTY],
        Some(v) => {
            let mut out = Vec::with_capacity(v.len() + 1);
            out.push(TAG_VALUE);
            out.extend_from_slice(v);
            out
        }
    }
}

fn decode_record(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    match bytes.split_first() {
        Some((&TAG_EMPTY, _)) => Ok(None),
        Some((&TAG_VALUE, rest)) => Ok(Some(rest.to_vec())),
        _ => Err(StorageError::SerializationError(
            "corrupt record envelope".to_string(),
        )),
    }
}

struct RocksState {
    pending: WriteSet,
    committed_next: u64,
}

/// Record store over a RocksDB database.
pub struct RocksRecordStore {
    db: Arc<DB>,
    state: Mutex<RocksState>,
    read_only: bool,
    closed: AtomicBool,
}

impl RocksRecordStore {
    /// Opens or creates the database directory at `path`.
    pub fn open(path: impl AsRef<Path>, read_only: bool) -> Result<Self> {
        let path = path.as_ref();
        let db = if read_only {
            DB::open_for_read_only(&Options::default(), path, false)
        } else {
            let mut opts = Options::default();
            opts.create_if_missing(true);
            DB::open(&opts, path)
        }
        .map_err(|e| StorageError::IoError(e.to_string()))?;

        let committed_next = match db
            .get(META_NEXT_RECID)
            .map_err(|e| StorageError::IoError(e.to_string()))?
        {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StorageError::SerializationError("corrupt allocation counter".to_string())
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        log::debug!(
            "Opened RocksDB record store at {} (next recid {})",
            path.display(),
            committed_next
        );

        Ok(Self {
            db: Arc::new(db),
            state: Mutex::new(RocksState {
                pending: WriteSet::new(committed_next),
                committed_next,
            }),
            read_only,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns a reference to the underlying database.
    pub fn db(&self) -> &Arc<DB> {
        &self.db
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        self.check_open()?;
        if self.read_only {
            return Err(StorageError::ReadOnly(self.db.path().display().to_string()));
        }
        Ok(())
    }

    fn read(&self, state: &RocksState, recid: RecordId) -> Result<Option<Vec<u8>>> {
        match state.pending.lookup(recid.as_u64()) {
            Some(Slot::Value(v)) => Ok(v.clone()),
            Some(Slot::Deleted) => Err(StorageError::RecordNotFound(recid)),
            None => match self
                .db
                .get(record_key(recid.as_u64()))
                .map_err(|e| StorageError::IoError(e.to_string()))?
            {
                Some(bytes) => decode_record(&bytes),
                None => Err(StorageError::RecordNotFound(recid)),
            },
        }
    }
}

impl RecordStore for RocksRecordStore {
    fn put(&self, value: Option<&[u8]>) -> Result<RecordId> {
        self.check_writable()?;
        let mut state = self.state.lock();
        Ok(RecordId::new(state.pending.allocate(value.map(|v| v.to_vec()))))
    }

    fn get(&self, recid: RecordId) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        let state = self.state.lock();
        self.read(&state, recid)
    }

    fn update(&self, recid: RecordId, value: Option<&[u8]>) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock();
        self.read(&state, recid)?;
        state
            .pending
            .set(recid.as_u64(), Slot::Value(value.map(|v| v.to_vec())));
        Ok(())
    }

    fn delete(&self, recid: RecordId) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock();
        self.read(&state, recid)?;
        state.pending.set(recid.as_u64(), Slot::Deleted);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.check_open()?;
        if self.read_only {
            return Ok(());
        }
        let mut state = self.state.lock();
        let next = state.pending.next_recid();
        let mut batch = WriteBatch::default();
        for (recid, slot) in state.pending.drain() {
            match slot {
                Slot::Value(v) => batch.put(record_key(recid), encode_record(&v)),
                Slot::Deleted => batch.delete(record_key(recid)),
            }
        }
        batch.put(META_NEXT_RECID, next.to_be_bytes());
        self.db
            .write(batch)
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        state.committed_next = next;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.check_open()?;
        let mut state = self.state.lock();
        let committed_next = state.committed_next;
        state.pending.discard(committed_next);
        Ok(())
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn is_empty(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.state.lock().pending.next_recid() == 0)
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let mut state = self.state.lock();
            let committed_next = state.committed_next;
            state.pending.discard(committed_next);
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
