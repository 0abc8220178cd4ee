//! Live collection objects built by the makers.
//!
//! Atomics are fully functional. Hash and index-tree collections are handles
//! carrying their descriptor, store handles and modification listeners; the
//! ordered map adds a read path over bulk-loaded nodes.

pub mod atomic;
pub mod hash;
pub mod index_tree;
pub mod listener;
pub mod tree;

pub use atomic::{AtomicBoolean, AtomicInteger, AtomicLong, AtomicString, AtomicVar};
pub use hash::{HashTreeMap, HashTreeSet};
pub use index_tree::{IndexTreeList, IndexTreeLongLongMap};
pub use listener::ModificationListener;
pub use tree::{OrderedMap, OrderedSet};

use tessdb_commons::RecordId;
use tessdb_store::RecordStore;

use crate::error::{CatalogError, Result};

/// Content of a freshly allocated, empty index directory.
pub(crate) const EMPTY_DIR_NODE: &[u8] = &[];

pub(crate) fn encode_u64(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

pub(crate) fn decode_u64(recid: RecordId, bytes: &[u8]) -> Result<u64> {
    let buf: [u8; 8] = bytes.try_into().map_err(|_| {
        CatalogError::serialization(format!(
            "record {} holds {} bytes, expected an 8 byte counter",
            recid,
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(buf))
}

/// Reads an 8 byte big-endian number; an empty record reads as 0.
pub(crate) fn read_u64(store: &dyn RecordStore, recid: RecordId) -> Result<u64> {
    match store.get(recid)? {
        Some(bytes) => decode_u64(recid, &bytes),
        None => Ok(0),
    }
}

pub(crate) fn put_u64(store: &dyn RecordStore, n: u64) -> Result<RecordId> {
    Ok(store.put(Some(&encode_u64(n)))?)
}
