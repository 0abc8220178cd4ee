//! Snapshot-file record store.
//!
//! Keeps the whole table on the heap and rewrites a single snapshot file on
//! every commit. The new snapshot is written to a temporary file in the same
//! directory and renamed over the old one, so a crash leaves either the
//! previous or the new committed state on disk, never a mix.

use crate::memory_store::{MemoryStoreOptions, RecordTable};
use crate::storage_trait::{RecordStore, Result, StorageError};
use bincode::{Decode, Encode};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tessdb_commons::RecordId;

const SNAPSHOT_MAGIC: u32 = 0x7E55_DB01;

#[derive(Debug, Encode, Decode)]
struct Snapshot {
    magic: u32,
    next_recid: u64,
    records: BTreeMap<u64, Option<Vec<u8>>>,
}

/// Record store persisted as one snapshot file.
///
/// ## Example
///
/// ```rust,no_run
/// use tessdb_store::{FileRecordStore, RecordStore};
///
/// let store = FileRecordStore::open("/tmp/example.db", false, true).unwrap();
/// let recid = store.put(Some(b"value")).unwrap();
/// store.commit().unwrap();
/// store.close().unwrap();
///
/// let reopened = FileRecordStore::open("/tmp/example.db", true, true).unwrap();
/// assert_eq!(reopened.get(recid).unwrap(), Some(b"value".to_vec()));
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    table: RwLock<RecordTable>,
    read_only: bool,
    closed: AtomicBool,
}

impl FileRecordStore {
    /// Opens (or, unless read-only, creates) the snapshot file at `path`.
    pub fn open(path: impl AsRef<Path>, read_only: bool, transactional: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let options = MemoryStoreOptions {
            transactional,
            first_recid: 0,
        };

        let table = if path.exists() {
            let snapshot = read_snapshot(&path)?;
            log::debug!(
                "Loaded snapshot {} ({} records, next recid {})",
                path.display(),
                snapshot.records.len(),
                snapshot.next_recid
            );
            RecordTable::from_parts(snapshot.records, snapshot.next_recid, options)
        } else if read_only {
            return Err(StorageError::IoError(format!(
                "cannot open missing store {} read-only",
                path.display()
            )));
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StorageError::IoError(e.to_string()))?;
                }
            }
            RecordTable::new(options)
        };

        Ok(Self {
            path,
            table: RwLock::new(table),
            read_only,
            closed: AtomicBool::new(false),
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
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
            return Err(StorageError::ReadOnly(self.path.display().to_string()));
        }
        Ok(())
    }

    fn persist(&self, table: &RecordTable) -> Result<()> {
        let (records, next_recid) = table.committed();
        let snapshot = Snapshot {
            magic: SNAPSHOT_MAGIC,
            next_recid,
            records: records.clone(),
        };
        let bytes = bincode::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| StorageError::SerializationError(format!("snapshot encode failed: {e}")))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        tmp.write_all(&bytes)
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let bytes = std::fs::read(path).map_err(|e| StorageError::IoError(e.to_string()))?;
    let (snapshot, _): (Snapshot, usize) =
        bincode::decode_from_slice(&bytes, bincode::config::standard()).map_err(|e| {
            StorageError::SerializationError(format!("snapshot decode failed: {e}"))
        })?;
    if snapshot.magic != SNAPSHOT_MAGIC {
        return Err(StorageError::SerializationError(format!(
            "{} is not a tessdb snapshot",
            path.display()
        )));
    }
    Ok(snapshot)
}

impl RecordStore for FileRecordStore {
    fn put(&self, value: Option<&[u8]>) -> Result<RecordId> {
        self.check_writable()?;
        Ok(self.table.write().put(value))
    }

    fn get(&self, recid: RecordId) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        self.table.read().get(recid)
    }

    fn update(&self, recid: RecordId, value: Option<&[u8]>) -> Result<()> {
        self.check_writable()?;
        self.table.write().update(recid, value)
    }

    fn delete(&self, recid: RecordId) -> Result<()> {
        self.check_writable()?;
        self.table.write().delete(recid)
    }

    fn commit(&self) -> Result<()> {
        self.check_open()?;
        if self.read_only {
            return Ok(());
        }
        let mut table = self.table.write();
        table.apply();
        self.persist(&table)
    }

    fn rollback(&self) -> Result<()> {
        self.check_open()?;
        self.table.write().rollback()
    }

    fn supports_rollback(&self) -> bool {
        self.table.read().is_transactional()
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn is_empty(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.table.read().is_empty())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut table = self.table.write();
        if !self.read_only && !table.is_transactional() {
            // Direct writes were applied in memory only; flush them now
            self.persist(&table)?;
        }
        table.discard_pending();
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
    use tempfile::TempDir;

    #[test]
    fn test_commit_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");

        let store = FileRecordStore::open(&path, false, true).unwrap();
        let a = store.put(Some(b"a")).unwrap();
        let b = store.put(None).unwrap();
        store.commit().unwrap();
        store.put(Some(b"uncommitted")).unwrap();
        store.close().unwrap();

        let reopened = FileRecordStore::open(&path, false, true).unwrap();
        assert_eq!(reopened.get(a).unwrap(), Some(b"a".to_vec()));
        assert_eq!(reopened.get(b).unwrap(), None);
        assert!(reopened.get(RecordId::new(2)).is_err());
        assert_eq!(reopened.put(None).unwrap(), RecordId::new(2));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = FileRecordStore::open(&path, false, true).unwrap();
            store.put(Some(b"x")).unwrap();
            store.commit().unwrap();
        }

        let ro = FileRecordStore::open(&path, true, true).unwrap();
        assert!(ro.is_read_only());
        assert_eq!(ro.get(RecordId::new(0)).unwrap(), Some(b"x".to_vec()));
        assert!(matches!(ro.put(None), Err(StorageError::ReadOnly(_))));
        assert!(matches!(
            ro.update(RecordId::new(0), None),
            Err(StorageError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_read_only_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = FileRecordStore::open(dir.path().join("none.db"), true, true);
        assert!(matches!(result, Err(StorageError::IoError(_))));
    }

    #[test]
    fn test_foreign_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foreign.db");
        std::fs::write(&path, b"not a snapshot at all").unwrap();
        assert!(FileRecordStore::open(&path, false, true).is_err());
    }

    #[test]
    fn test_non_transactional_flushes_on_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("direct.db");
        let store = FileRecordStore::open(&path, false, false).unwrap();
        let recid = store.put(Some(b"direct")).unwrap();
        store.close().unwrap();

        let reopened = FileRecordStore::open(&path, true, false).unwrap();
        assert_eq!(reopened.get(recid).unwrap(), Some(b"direct".to_vec()));
    }
}
