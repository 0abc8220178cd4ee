//! Ordered maps and sets over a B-link style node chain.
//!
//! Leaves hold sorted encoded keys and values and link to their right sibling;
//! directory nodes hold the first key of each child. The catalog only stores the
//! record that points at the root (`rootRecidRecid`), so a root can be replaced
//! without touching the catalog.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use bincode::{Decode, Encode};
use tessdb_commons::{ObjectName, RecordId};
use tessdb_store::RecordStore;

use super::{listener::ModificationListener, read_u64};
use crate::descriptor::TreeDescriptor;
use crate::error::{CatalogError, Result};
use crate::serializers::Serializer;
use crate::value::Value;

pub const DEFAULT_MAX_NODE_SIZE: u32 = 32;
pub const MIN_MAX_NODE_SIZE: u32 = 4;

#[derive(Debug, Clone, Default, Encode, Decode)]
struct TreeNode {
    leaf: bool,
    keys: Vec<Vec<u8>>,
    /// Leaf only, parallel to `keys`.
    values: Vec<Vec<u8>>,
    /// Directory only, parallel to `keys`.
    children: Vec<u64>,
    /// Right sibling of a leaf, 0 for the last leaf.
    next: u64,
}

impl TreeNode {
    fn empty_leaf() -> Self {
        TreeNode {
            leaf: true,
            ..Default::default()
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CatalogError::serialization(format!("tree node: {}", e)))
    }

    fn decode(recid: RecordId, bytes: &[u8]) -> Result<Self> {
        let (node, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CatalogError::serialization(format!("tree node {}: {}", recid, e)))?;
        Ok(node)
    }
}

/// Writes an empty leaf and returns its record id.
pub(crate) fn allocate_empty_root(store: &dyn RecordStore) -> Result<RecordId> {
    Ok(store.put(Some(&TreeNode::empty_leaf().encode()?))?)
}

/// Builds a tree bottom-up from strictly ascending entries and returns the root.
pub(crate) fn bulk_load(
    store: &dyn RecordStore,
    key_serializer: &dyn Serializer,
    value_serializer: &dyn Serializer,
    entries: &[(Value, Value)],
    max_node_size: u32,
) -> Result<RecordId> {
    for (position, pair) in entries.windows(2).enumerate() {
        if pair[0].0.compare(&pair[1].0) != Some(Ordering::Less) {
            return Err(CatalogError::wrong_configuration(format!(
                "bulk load input is not strictly ascending at position {}",
                position + 1
            )));
        }
    }
    if entries.is_empty() {
        return allocate_empty_root(store);
    }

    let fanout = max_node_size as usize;
    let chunks: Vec<&[(Value, Value)]> = entries.chunks(fanout).collect();
    let leaf_recids = chunks
        .iter()
        .map(|_| store.put(None))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut level: Vec<(Vec<u8>, RecordId)> = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let mut node = TreeNode::empty_leaf();
        for (key, value) in chunk.iter() {
            node.keys.push(key_serializer.encode(key)?);
            node.values.push(value_serializer.encode(value)?);
        }
        node.next = leaf_recids.get(i + 1).map(RecordId::as_u64).unwrap_or(0);
        store.update(leaf_recids[i], Some(&node.encode()?))?;
        level.push((node.keys[0].clone(), leaf_recids[i]));
    }

    while level.len() > 1 {
        let mut parents = Vec::with_capacity(level.len() / fanout + 1);
        for group in level.chunks(fanout) {
            let node = TreeNode {
                leaf: false,
                keys: group.iter().map(|(key, _)| key.clone()).collect(),
                children: group.iter().map(|(_, recid)| recid.as_u64()).collect(),
                ..Default::default()
            };
            let recid = store.put(Some(&node.encode()?))?;
            parents.push((group[0].0.clone(), recid));
        }
        level = parents;
    }

    log::debug!(
        "Bulk loaded {} entries into {} leaves",
        entries.len(),
        leaf_recids.len()
    );
    Ok(level[0].1)
}

pub struct OrderedMap {
    name: ObjectName,
    descriptor: TreeDescriptor,
    store: Arc<dyn RecordStore>,
    key_serializer: Arc<dyn Serializer>,
    value_serializer: Arc<dyn Serializer>,
    listeners: Vec<Arc<dyn ModificationListener>>,
}

impl OrderedMap {
    pub(crate) fn new(
        name: ObjectName,
        descriptor: TreeDescriptor,
        store: Arc<dyn RecordStore>,
        key_serializer: Arc<dyn Serializer>,
        value_serializer: Arc<dyn Serializer>,
        listeners: Vec<Arc<dyn ModificationListener>>,
    ) -> Self {
        Self {
            name,
            descriptor,
            store,
            key_serializer,
            value_serializer,
            listeners,
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn descriptor(&self) -> &TreeDescriptor {
        &self.descriptor
    }

    pub fn key_serializer(&self) -> &Arc<dyn Serializer> {
        &self.key_serializer
    }

    pub fn value_serializer(&self) -> &Arc<dyn Serializer> {
        &self.value_serializer
    }

    pub fn modification_listeners(&self) -> &[Arc<dyn ModificationListener>] {
        &self.listeners
    }

    /// Current root, read through `rootRecidRecid`.
    pub fn root_recid(&self) -> Result<RecordId> {
        Ok(RecordId::new(read_u64(
            self.store.as_ref(),
            self.descriptor.root_recid_recid,
        )?))
    }

    fn load_node(&self, recid: RecordId) -> Result<TreeNode> {
        match self.store.get(recid)? {
            Some(bytes) => TreeNode::decode(recid, &bytes),
            None => Err(CatalogError::serialization(format!(
                "tree node {} is empty",
                recid
            ))),
        }
    }

    fn compare_key(&self, key: &Value, stored: &[u8]) -> Result<Ordering> {
        let stored = self.key_serializer.decode(stored)?;
        key.compare(&stored).ok_or_else(|| {
            CatalogError::serialization(format!(
                "{} key is not comparable with stored {} key",
                key.kind(),
                stored.kind()
            ))
        })
    }

    fn leftmost_leaf(&self) -> Result<TreeNode> {
        let mut node = self.load_node(self.root_recid()?)?;
        while !node.leaf {
            let first = node.children.first().copied().ok_or_else(|| {
                CatalogError::serialization("directory node without children")
            })?;
            node = self.load_node(RecordId::new(first))?;
        }
        Ok(node)
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>> {
        let mut node = self.load_node(self.root_recid()?)?;
        while !node.leaf {
            let mut child = node.children.first().copied().ok_or_else(|| {
                CatalogError::serialization("directory node without children")
            })?;
            for (stored, recid) in node.keys.iter().zip(node.children.iter()).skip(1) {
                if self.compare_key(key, stored)? == Ordering::Less {
                    break;
                }
                child = *recid;
            }
            node = self.load_node(RecordId::new(child))?;
        }

        for (i, stored) in node.keys.iter().enumerate() {
            match self.compare_key(key, stored)? {
                Ordering::Equal => {
                    let bytes = node.values.get(i).ok_or_else(|| {
                        CatalogError::serialization("leaf node is missing a value")
                    })?;
                    return self.value_serializer.decode(bytes).map(Some);
                }
                Ordering::Less => break,
                Ordering::Greater => {}
            }
        }
        Ok(None)
    }

    /// All entries in key order.
    pub fn entries(&self) -> Result<Vec<(Value, Value)>> {
        let mut node = self.leftmost_leaf()?;
        let mut entries = Vec::new();
        loop {
            for (key, value) in node.keys.iter().zip(node.values.iter()) {
                entries.push((
                    self.key_serializer.decode(key)?,
                    self.value_serializer.decode(value)?,
                ));
            }
            if node.next == 0 {
                return Ok(entries);
            }
            node = self.load_node(RecordId::new(node.next))?;
        }
    }

    pub fn keys(&self) -> Result<Vec<Value>> {
        Ok(self.entries()?.into_iter().map(|(key, _)| key).collect())
    }

    /// Entry count, from the counter record when one exists.
    pub fn len(&self) -> Result<u64> {
        match self.descriptor.counter_recid {
            Some(recid) => read_u64(self.store.as_ref(), recid),
            None => Ok(self.entries()?.len() as u64),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl fmt::Debug for OrderedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMap")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Ordered set: an ordered map whose values use the `Nothing` serializer.
#[derive(Debug)]
pub struct OrderedSet {
    map: OrderedMap,
}

impl OrderedSet {
    pub(crate) fn new(map: OrderedMap) -> Self {
        Self { map }
    }

    pub fn name(&self) -> &ObjectName {
        self.map.name()
    }

    pub fn descriptor(&self) -> &TreeDescriptor {
        self.map.descriptor()
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        self.map.key_serializer()
    }

    pub fn root_recid(&self) -> Result<RecordId> {
        self.map.root_recid()
    }

    pub fn contains(&self, key: &Value) -> Result<bool> {
        Ok(self.map.get(key)?.is_some())
    }

    pub fn keys(&self) -> Result<Vec<Value>> {
        self.map.keys()
    }

    pub fn len(&self) -> Result<u64> {
        self.map.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::put_u64;
    use crate::serializers::BuiltinSerializer;
    use tessdb_store::test_utils::memory_store;

    fn entries(n: i64) -> Vec<(Value, Value)> {
        (0..n)
            .map(|i| (Value::Long(i * 2), Value::String(format!("v{}", i))))
            .collect()
    }

    fn map_over(store: Arc<dyn RecordStore>, root: RecordId, counter: Option<RecordId>) -> OrderedMap {
        let root_recid_recid = put_u64(store.as_ref(), root.as_u64()).unwrap();
        OrderedMap::new(
            ObjectName::try_new("t").unwrap(),
            TreeDescriptor {
                kind: crate::descriptor::CollectionKind::Map,
                key_serializer: "Long".to_string(),
                value_serializer: Some("String".to_string()),
                value_inline: true,
                root_recid_recid,
                counter_recid: counter,
                max_node_size: 4,
            },
            store,
            Arc::new(BuiltinSerializer::long()),
            Arc::new(BuiltinSerializer::string()),
            Vec::new(),
        )
    }

    #[test]
    fn test_bulk_load_multi_level() {
        let store = memory_store();
        let data = entries(50);
        let root = bulk_load(
            store.as_ref(),
            &BuiltinSerializer::long(),
            &BuiltinSerializer::string(),
            &data,
            4,
        )
        .unwrap();
        let map = map_over(store, root, None);

        assert_eq!(map.len().unwrap(), 50);
        assert_eq!(map.get(&Value::Long(0)).unwrap(), Some(Value::from("v0")));
        assert_eq!(map.get(&Value::Long(98)).unwrap(), Some(Value::from("v49")));
        assert_eq!(map.get(&Value::Long(40)).unwrap(), Some(Value::from("v20")));
        assert_eq!(map.get(&Value::Long(41)).unwrap(), None);
        assert_eq!(map.get(&Value::Long(-1)).unwrap(), None);
        assert_eq!(map.get(&Value::Long(1000)).unwrap(), None);

        let keys = map.keys().unwrap();
        let expected: Vec<Value> = data.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_bulk_load_rejects_unsorted_input() {
        let store = memory_store();
        let data = vec![
            (Value::Long(1), Value::from("a")),
            (Value::Long(1), Value::from("b")),
        ];
        let err = bulk_load(
            store.as_ref(),
            &BuiltinSerializer::long(),
            &BuiltinSerializer::string(),
            &data,
            4,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::WrongConfiguration(_)));
    }

    #[test]
    fn test_empty_root() {
        let store = memory_store();
        let root = allocate_empty_root(store.as_ref()).unwrap();
        let counter = put_u64(store.as_ref(), 0).unwrap();
        let map = map_over(store, root, Some(counter));
        assert!(map.is_empty().unwrap());
        assert!(map.keys().unwrap().is_empty());
        assert_eq!(map.get(&Value::Long(1)).unwrap(), None);
    }

    #[test]
    fn test_leaf_sizes_respect_max_node_size() {
        let store = memory_store();
        let root = bulk_load(
            store.as_ref(),
            &BuiltinSerializer::long(),
            &BuiltinSerializer::string(),
            &entries(9),
            4,
        )
        .unwrap();
        let map = map_over(store, root, None);
        let mut leaf = map.leftmost_leaf().unwrap();
        let mut sizes = vec![leaf.keys.len()];
        while leaf.next != 0 {
            leaf = map.load_node(RecordId::new(leaf.next)).unwrap();
            sizes.push(leaf.keys.len());
        }
        assert_eq!(sizes, vec![4, 4, 1]);
    }
}
