//! Segmented hash collections.
//!
//! Only the structural shell lives here: per-segment root and counter records,
//! expiration queue anchors and the runtime expiration settings. Node layout and
//! eviction are handled by the hash engine that consumes these handles.

use std::fmt;
use std::sync::Arc;

use tessdb_commons::{ObjectName, RecordId};
use tessdb_store::RecordStore;

use super::{listener::ModificationListener, put_u64, read_u64, EMPTY_DIR_NODE};
use crate::descriptor::{ExpireAxis, ExpireQueue, HashDescriptor};
use crate::error::{CatalogError, Result};
use crate::executor::BackgroundExecutor;
use crate::serializers::Serializer;
use crate::value::Value;

/// Expiration options that are supplied on every open and never persisted.
#[derive(Clone, Default)]
pub struct ExpirationSettings {
    pub max_size: u64,
    pub store_size: u64,
    pub executor: Option<Arc<dyn BackgroundExecutor>>,
}

impl fmt::Debug for ExpirationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirationSettings")
            .field("max_size", &self.max_size)
            .field("store_size", &self.store_size)
            .field(
                "executor",
                &self.executor.as_ref().map(|executor| executor.name().to_string()),
            )
            .finish()
    }
}

/// Allocates one empty root directory per segment.
pub(crate) fn allocate_segments(store: &dyn RecordStore, segments: usize) -> Result<Vec<RecordId>> {
    (0..segments)
        .map(|_| store.put(Some(EMPTY_DIR_NODE)).map_err(CatalogError::from))
        .collect()
}

pub(crate) fn allocate_counters(store: &dyn RecordStore, segments: usize) -> Result<Vec<RecordId>> {
    (0..segments).map(|_| put_u64(store, 0)).collect()
}

/// Allocates a sentinel node plus head, tail and head-predecessor records.
///
/// Head and tail both point at the sentinel; the predecessor starts at 0.
pub(crate) fn allocate_queue(store: &dyn RecordStore) -> Result<ExpireQueue> {
    let sentinel = store.put(None)?;
    let head = put_u64(store, sentinel.as_u64())?;
    let tail = put_u64(store, sentinel.as_u64())?;
    let head_prev = put_u64(store, 0)?;
    Ok(ExpireQueue {
        head,
        tail,
        head_prev,
    })
}

pub(crate) fn allocate_queues(store: &dyn RecordStore, segments: usize) -> Result<Vec<ExpireQueue>> {
    (0..segments).map(|_| allocate_queue(store)).collect()
}

pub struct HashTreeMap {
    name: ObjectName,
    descriptor: HashDescriptor,
    stores: Vec<Arc<dyn RecordStore>>,
    key_serializer: Arc<dyn Serializer>,
    value_serializer: Arc<dyn Serializer>,
    listeners: Vec<Arc<dyn ModificationListener>>,
    expiration: ExpirationSettings,
}

impl HashTreeMap {
    pub(crate) fn new(
        name: ObjectName,
        descriptor: HashDescriptor,
        store: Arc<dyn RecordStore>,
        key_serializer: Arc<dyn Serializer>,
        value_serializer: Arc<dyn Serializer>,
        listeners: Vec<Arc<dyn ModificationListener>>,
        expiration: ExpirationSettings,
    ) -> Self {
        let stores = (0..descriptor.segment_count())
            .map(|_| Arc::clone(&store))
            .collect();
        Self {
            name,
            descriptor,
            stores,
            key_serializer,
            value_serializer,
            listeners,
            expiration,
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn descriptor(&self) -> &HashDescriptor {
        &self.descriptor
    }

    pub fn key_serializer(&self) -> &Arc<dyn Serializer> {
        &self.key_serializer
    }

    pub fn value_serializer(&self) -> &Arc<dyn Serializer> {
        &self.value_serializer
    }

    pub fn segment_count(&self) -> usize {
        self.stores.len()
    }

    pub fn segment_store(&self, segment: usize) -> Option<&Arc<dyn RecordStore>> {
        self.stores.get(segment)
    }

    pub fn segment_root(&self, segment: usize) -> Option<RecordId> {
        self.descriptor.segment_recids.get(segment).copied()
    }

    pub fn modification_listeners(&self) -> &[Arc<dyn ModificationListener>] {
        &self.listeners
    }

    pub fn expiration(&self) -> &ExpirationSettings {
        &self.expiration
    }

    /// Sum of the segment counters, `None` when counters are disabled.
    pub fn size(&self) -> Result<Option<u64>> {
        let Some(counters) = &self.descriptor.counter_recids else {
            return Ok(None);
        };
        let mut total = 0u64;
        for (segment, recid) in counters.iter().enumerate() {
            total += read_u64(self.stores[segment].as_ref(), *recid)?;
        }
        Ok(Some(total))
    }

    /// Record currently pointed to by the head of `segment`'s queue for `axis`.
    pub fn queue_head(&self, axis: ExpireAxis, segment: usize) -> Result<Option<RecordId>> {
        let Some(queue) = self
            .descriptor
            .queues(axis)
            .and_then(|queues| queues.get(segment))
        else {
            return Ok(None);
        };
        let head = read_u64(self.stores[segment].as_ref(), queue.head)?;
        Ok(Some(RecordId::new(head)))
    }

    /// Hands a change to every registered listener.
    pub fn notify(&self, key: &Value, old: Option<&Value>, new: Option<&Value>, expired: bool) {
        for listener in &self.listeners {
            listener.modify(key, old, new, expired);
        }
    }
}

impl fmt::Debug for HashTreeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTreeMap")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("listeners", &self.listeners.len())
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Hash set: a hash map whose values use the `Nothing` serializer.
#[derive(Debug)]
pub struct HashTreeSet {
    map: HashTreeMap,
}

impl HashTreeSet {
    pub(crate) fn new(map: HashTreeMap) -> Self {
        Self { map }
    }

    pub fn name(&self) -> &ObjectName {
        self.map.name()
    }

    pub fn descriptor(&self) -> &HashDescriptor {
        self.map.descriptor()
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        self.map.key_serializer()
    }

    pub fn segment_count(&self) -> usize {
        self.map.segment_count()
    }

    pub fn size(&self) -> Result<Option<u64>> {
        self.map.size()
    }

    pub fn queue_head(&self, axis: ExpireAxis, segment: usize) -> Result<Option<RecordId>> {
        self.map.queue_head(axis, segment)
    }

    pub fn expiration(&self) -> &ExpirationSettings {
        self.map.expiration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessdb_store::test_utils::memory_store;

    #[test]
    fn test_allocate_queue_links_sentinel() {
        let store = memory_store();
        let queue = allocate_queue(store.as_ref()).unwrap();
        let sentinel = RecordId::new(queue.head.as_u64() - 1);

        assert_eq!(store.get(sentinel).unwrap(), None);
        assert_eq!(read_u64(store.as_ref(), queue.head).unwrap(), sentinel.as_u64());
        assert_eq!(read_u64(store.as_ref(), queue.tail).unwrap(), sentinel.as_u64());
        assert_eq!(read_u64(store.as_ref(), queue.head_prev).unwrap(), 0);
    }

    #[test]
    fn test_allocate_segments_and_counters() {
        let store = memory_store();
        let roots = allocate_segments(store.as_ref(), 4).unwrap();
        let counters = allocate_counters(store.as_ref(), 4).unwrap();
        assert_eq!(roots.len(), 4);
        assert_eq!(store.get(roots[0]).unwrap(), Some(Vec::new()));
        assert_eq!(read_u64(store.as_ref(), counters[3]).unwrap(), 0);
    }
}
