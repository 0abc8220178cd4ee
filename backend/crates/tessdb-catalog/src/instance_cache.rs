//! Name-keyed cache of live collections.
//!
//! While an entry is retained, every lookup of its name returns the same `Arc`.
//! Eviction is explicit: by name, or of every entry no caller still holds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tessdb_commons::ObjectName;

use crate::collections::{
    AtomicBoolean, AtomicInteger, AtomicLong, AtomicString, AtomicVar, HashTreeMap, HashTreeSet,
    IndexTreeList, IndexTreeLongLongMap, OrderedMap, OrderedSet,
};
use crate::schema::CollectionType;

/// Any live collection, as held by the cache.
#[derive(Debug, Clone)]
pub enum LiveObject {
    HashMap(Arc<HashTreeMap>),
    HashSet(Arc<HashTreeSet>),
    TreeMap(Arc<OrderedMap>),
    TreeSet(Arc<OrderedSet>),
    AtomicBoolean(Arc<AtomicBoolean>),
    AtomicInteger(Arc<AtomicInteger>),
    AtomicLong(Arc<AtomicLong>),
    AtomicString(Arc<AtomicString>),
    AtomicVar(Arc<AtomicVar>),
    IndexTreeList(Arc<IndexTreeList>),
    IndexTreeLongLongMap(Arc<IndexTreeLongLongMap>),
}

macro_rules! each_live_object {
    ($value:expr, $obj:ident => $body:expr) => {
        match $value {
            LiveObject::HashMap($obj) => $body,
            LiveObject::HashSet($obj) => $body,
            LiveObject::TreeMap($obj) => $body,
            LiveObject::TreeSet($obj) => $body,
            LiveObject::AtomicBoolean($obj) => $body,
            LiveObject::AtomicInteger($obj) => $body,
            LiveObject::AtomicLong($obj) => $body,
            LiveObject::AtomicString($obj) => $body,
            LiveObject::AtomicVar($obj) => $body,
            LiveObject::IndexTreeList($obj) => $body,
            LiveObject::IndexTreeLongLongMap($obj) => $body,
        }
    };
}

impl LiveObject {
    pub fn collection_type(&self) -> CollectionType {
        match self {
            LiveObject::HashMap(_) => CollectionType::HashMap,
            LiveObject::HashSet(_) => CollectionType::HashSet,
            LiveObject::TreeMap(_) => CollectionType::TreeMap,
            LiveObject::TreeSet(_) => CollectionType::TreeSet,
            LiveObject::AtomicBoolean(_) => CollectionType::AtomicBoolean,
            LiveObject::AtomicInteger(_) => CollectionType::AtomicInteger,
            LiveObject::AtomicLong(_) => CollectionType::AtomicLong,
            LiveObject::AtomicString(_) => CollectionType::AtomicString,
            LiveObject::AtomicVar(_) => CollectionType::AtomicVar,
            LiveObject::IndexTreeList(_) => CollectionType::IndexTreeList,
            LiveObject::IndexTreeLongLongMap(_) => CollectionType::IndexTreeLongLongMap,
        }
    }

    pub fn name(&self) -> &ObjectName {
        each_live_object!(self, obj => obj.name())
    }

    pub fn strong_count(&self) -> usize {
        each_live_object!(self, obj => Arc::strong_count(obj))
    }

    /// True when both hold the same allocation.
    pub fn ptr_eq(&self, other: &LiveObject) -> bool {
        match (self, other) {
            (LiveObject::HashMap(a), LiveObject::HashMap(b)) => Arc::ptr_eq(a, b),
            (LiveObject::HashSet(a), LiveObject::HashSet(b)) => Arc::ptr_eq(a, b),
            (LiveObject::TreeMap(a), LiveObject::TreeMap(b)) => Arc::ptr_eq(a, b),
            (LiveObject::TreeSet(a), LiveObject::TreeSet(b)) => Arc::ptr_eq(a, b),
            (LiveObject::AtomicBoolean(a), LiveObject::AtomicBoolean(b)) => Arc::ptr_eq(a, b),
            (LiveObject::AtomicInteger(a), LiveObject::AtomicInteger(b)) => Arc::ptr_eq(a, b),
            (LiveObject::AtomicLong(a), LiveObject::AtomicLong(b)) => Arc::ptr_eq(a, b),
            (LiveObject::AtomicString(a), LiveObject::AtomicString(b)) => Arc::ptr_eq(a, b),
            (LiveObject::AtomicVar(a), LiveObject::AtomicVar(b)) => Arc::ptr_eq(a, b),
            (LiveObject::IndexTreeList(a), LiveObject::IndexTreeList(b)) => Arc::ptr_eq(a, b),
            (LiveObject::IndexTreeLongLongMap(a), LiveObject::IndexTreeLongLongMap(b)) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct InstanceCache {
    entries: Mutex<HashMap<ObjectName, LiveObject>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &ObjectName) -> Option<LiveObject> {
        let found = self.entries.lock().get(name).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, name: ObjectName, object: LiveObject) {
        self.entries.lock().insert(name, object);
    }

    pub fn contains(&self, name: &ObjectName) -> bool {
        self.entries.lock().contains_key(name)
    }

    /// Name under which `object` is cached, if it is this exact instance.
    pub fn name_of(&self, object: &LiveObject) -> Option<ObjectName> {
        let entries = self.entries.lock();
        entries
            .get(object.name())
            .filter(|cached| cached.ptr_eq(object))
            .map(|cached| cached.name().clone())
    }

    pub fn evict(&self, name: &ObjectName) -> bool {
        self.entries.lock().remove(name).is_some()
    }

    /// Drops entries referenced only by the cache. Returns how many were dropped.
    pub fn evict_unused(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, object| object.strong_count() > 1);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns (hits, misses).
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn hit_rate(&self) -> f64 {
        let (hits, misses) = self.stats();
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
