//! Decoded parameter sets of cataloged collections.
//!
//! Each descriptor knows how to write itself into the name catalog on create and
//! how to read itself back on open. Serializers are kept as their catalog names;
//! makers resolve them against the registry.

use tessdb_commons::{ObjectName, RecordId};

use crate::error::{CatalogError, Result};
use crate::name_catalog::NameCatalog;
use crate::schema::keys;
use crate::validator::{MAX_CONC_SHIFT, QUEUE_RECIDS_PER_SEGMENT};

/// Head, tail and head predecessor of one segment's expiration queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpireQueue {
    pub head: RecordId,
    pub tail: RecordId,
    pub head_prev: RecordId,
}

impl ExpireQueue {
    pub fn flatten(queues: &[ExpireQueue]) -> Vec<RecordId> {
        queues
            .iter()
            .flat_map(|q| [q.head, q.tail, q.head_prev])
            .collect()
    }

    pub fn unflatten(recids: &[RecordId]) -> Vec<ExpireQueue> {
        recids
            .chunks_exact(QUEUE_RECIDS_PER_SEGMENT)
            .map(|chunk| ExpireQueue {
                head: chunk[0],
                tail: chunk[1],
                head_prev: chunk[2],
            })
            .collect()
    }
}

/// The three expiration axes of a hash collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireAxis {
    Create,
    Update,
    Get,
}

impl ExpireAxis {
    pub fn ttl_key(&self) -> &'static str {
        match self {
            ExpireAxis::Create => keys::EXPIRE_CREATE_TTL,
            ExpireAxis::Update => keys::EXPIRE_UPDATE_TTL,
            ExpireAxis::Get => keys::EXPIRE_GET_TTL,
        }
    }

    pub fn queue_key(&self) -> &'static str {
        match self {
            ExpireAxis::Create => keys::EXPIRE_CREATE_QUEUE,
            ExpireAxis::Update => keys::EXPIRE_UPDATE_QUEUE,
            ExpireAxis::Get => keys::EXPIRE_GET_QUEUE,
        }
    }
}

/// Map or set flavour of a hash or tree collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Map,
    Set,
}

impl CollectionKind {
    pub fn key_serializer_param(&self) -> &'static str {
        match self {
            CollectionKind::Map => keys::KEY_SERIALIZER,
            CollectionKind::Set => keys::SERIALIZER,
        }
    }

    /// Expiration axes stored for this kind; sets have no update axis.
    pub fn expire_axes(&self) -> &'static [ExpireAxis] {
        match self {
            CollectionKind::Map => &[ExpireAxis::Create, ExpireAxis::Update, ExpireAxis::Get],
            CollectionKind::Set => &[ExpireAxis::Create, ExpireAxis::Get],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashDescriptor {
    pub kind: CollectionKind,
    pub key_serializer: String,
    /// `None` for sets.
    pub value_serializer: Option<String>,
    pub value_inline: bool,
    pub conc_shift: u32,
    pub dir_shift: u32,
    pub levels: u32,
    pub hash_seed: i32,
    pub segment_recids: Vec<RecordId>,
    pub counter_recids: Option<Vec<RecordId>>,
    pub remove_collapses_index_tree: bool,
    pub expire_create_ttl: u64,
    pub expire_update_ttl: u64,
    pub expire_get_ttl: u64,
    pub expire_create_queues: Option<Vec<ExpireQueue>>,
    pub expire_update_queues: Option<Vec<ExpireQueue>>,
    pub expire_get_queues: Option<Vec<ExpireQueue>>,
}

impl HashDescriptor {
    pub fn segment_count(&self) -> usize {
        1usize << self.conc_shift
    }

    pub fn ttl(&self, axis: ExpireAxis) -> u64 {
        match axis {
            ExpireAxis::Create => self.expire_create_ttl,
            ExpireAxis::Update => self.expire_update_ttl,
            ExpireAxis::Get => self.expire_get_ttl,
        }
    }

    pub fn queues(&self, axis: ExpireAxis) -> Option<&[ExpireQueue]> {
        match axis {
            ExpireAxis::Create => self.expire_create_queues.as_deref(),
            ExpireAxis::Update => self.expire_update_queues.as_deref(),
            ExpireAxis::Get => self.expire_get_queues.as_deref(),
        }
    }

    pub fn has_expiration(&self) -> bool {
        self.kind
            .expire_axes()
            .iter()
            .any(|axis| self.ttl(*axis) > 0)
    }

    pub fn write_to(&self, name: &ObjectName, catalog: &mut NameCatalog) {
        catalog.set_param(name, self.kind.key_serializer_param(), &self.key_serializer);
        if self.kind == CollectionKind::Map {
            if let Some(value_serializer) = &self.value_serializer {
                catalog.set_param(name, keys::VALUE_SERIALIZER, value_serializer);
            }
            catalog.set_param(name, keys::VALUE_INLINE, self.value_inline);
        }
        catalog.set_param(name, keys::CONC_SHIFT, self.conc_shift);
        catalog.set_param(name, keys::DIR_SHIFT, self.dir_shift);
        catalog.set_param(name, keys::LEVELS, self.levels);
        catalog.set_param(name, keys::HASH_SEED, self.hash_seed);
        catalog.set_recid_list(name, keys::SEGMENT_RECIDS, &self.segment_recids);
        if let Some(counters) = &self.counter_recids {
            catalog.set_recid_list(name, keys::COUNTER_RECIDS, counters);
        }
        catalog.set_param(
            name,
            keys::REMOVE_COLLAPSES_INDEX_TREE,
            self.remove_collapses_index_tree,
        );
        for axis in self.kind.expire_axes() {
            catalog.set_param(name, axis.ttl_key(), self.ttl(*axis));
            if let Some(queues) = self.queues(*axis) {
                catalog.set_recid_list(name, axis.queue_key(), &ExpireQueue::flatten(queues));
            }
        }
    }

    pub fn read_from(
        name: &ObjectName,
        catalog: &NameCatalog,
        kind: CollectionKind,
    ) -> Result<Self> {
        let conc_shift: u32 = catalog.parse_param(name, keys::CONC_SHIFT)?;
        if conc_shift > MAX_CONC_SHIFT {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}' is {}, at most {} is supported",
                name.param_key(keys::CONC_SHIFT),
                conc_shift,
                MAX_CONC_SHIFT
            )));
        }
        let segments = 1usize << conc_shift;

        let segment_recids = catalog.recid_list_param(name, keys::SEGMENT_RECIDS)?;
        check_len(name, keys::SEGMENT_RECIDS, segment_recids.len(), segments)?;
        let counter_recids = catalog.optional_recid_list_param(name, keys::COUNTER_RECIDS)?;
        if let Some(counters) = &counter_recids {
            check_len(name, keys::COUNTER_RECIDS, counters.len(), segments)?;
        }

        let (value_serializer, value_inline) = match kind {
            CollectionKind::Map => (
                Some(catalog.require_param(name, keys::VALUE_SERIALIZER)?.to_string()),
                catalog.parse_param(name, keys::VALUE_INLINE)?,
            ),
            CollectionKind::Set => (None, false),
        };

        let mut descriptor = HashDescriptor {
            kind,
            key_serializer: catalog
                .require_param(name, kind.key_serializer_param())?
                .to_string(),
            value_serializer,
            value_inline,
            conc_shift,
            dir_shift: catalog.parse_param(name, keys::DIR_SHIFT)?,
            levels: catalog.parse_param(name, keys::LEVELS)?,
            hash_seed: catalog.parse_param(name, keys::HASH_SEED)?,
            segment_recids,
            counter_recids,
            remove_collapses_index_tree: catalog
                .parse_param(name, keys::REMOVE_COLLAPSES_INDEX_TREE)?,
            expire_create_ttl: 0,
            expire_update_ttl: 0,
            expire_get_ttl: 0,
            expire_create_queues: None,
            expire_update_queues: None,
            expire_get_queues: None,
        };

        for axis in kind.expire_axes() {
            let ttl: u64 = catalog.parse_param(name, axis.ttl_key())?;
            let queues = catalog.optional_recid_list_param(name, axis.queue_key())?;
            if let Some(recids) = &queues {
                check_len(
                    name,
                    axis.queue_key(),
                    recids.len(),
                    segments * QUEUE_RECIDS_PER_SEGMENT,
                )?;
            }
            let queues = queues.map(|recids| ExpireQueue::unflatten(&recids));
            match axis {
                ExpireAxis::Create => {
                    descriptor.expire_create_ttl = ttl;
                    descriptor.expire_create_queues = queues;
                }
                ExpireAxis::Update => {
                    descriptor.expire_update_ttl = ttl;
                    descriptor.expire_update_queues = queues;
                }
                ExpireAxis::Get => {
                    descriptor.expire_get_ttl = ttl;
                    descriptor.expire_get_queues = queues;
                }
            }
        }

        Ok(descriptor)
    }
}

fn check_len(name: &ObjectName, param: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(CatalogError::wrong_configuration(format!(
            "'{}' has {} record ids, expected {}",
            name.param_key(param),
            actual,
            expected
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDescriptor {
    pub kind: CollectionKind,
    pub key_serializer: String,
    pub value_serializer: Option<String>,
    pub value_inline: bool,
    pub root_recid_recid: RecordId,
    pub counter_recid: Option<RecordId>,
    pub max_node_size: u32,
}

impl TreeDescriptor {
    pub fn write_to(&self, name: &ObjectName, catalog: &mut NameCatalog) {
        catalog.set_param(name, self.kind.key_serializer_param(), &self.key_serializer);
        if self.kind == CollectionKind::Map {
            if let Some(value_serializer) = &self.value_serializer {
                catalog.set_param(name, keys::VALUE_SERIALIZER, value_serializer);
            }
            catalog.set_param(name, keys::VALUE_INLINE, self.value_inline);
        }
        catalog.set_param(name, keys::ROOT_RECID_RECID, self.root_recid_recid);
        catalog.set_param(name, keys::MAX_NODE_SIZE, self.max_node_size);
        if let Some(counter) = self.counter_recid {
            catalog.set_param(name, keys::COUNTER_RECID, counter);
        }
    }

    pub fn read_from(
        name: &ObjectName,
        catalog: &NameCatalog,
        kind: CollectionKind,
    ) -> Result<Self> {
        let (value_serializer, value_inline) = match kind {
            CollectionKind::Map => (
                Some(catalog.require_param(name, keys::VALUE_SERIALIZER)?.to_string()),
                catalog.parse_param(name, keys::VALUE_INLINE)?,
            ),
            CollectionKind::Set => (None, false),
        };
        let counter_recid = match catalog.param(name, keys::COUNTER_RECID) {
            Some(_) => Some(catalog.recid_param(name, keys::COUNTER_RECID)?),
            None => None,
        };
        Ok(TreeDescriptor {
            kind,
            key_serializer: catalog
                .require_param(name, kind.key_serializer_param())?
                .to_string(),
            value_serializer,
            value_inline,
            root_recid_recid: catalog.recid_param(name, keys::ROOT_RECID_RECID)?,
            counter_recid,
            max_node_size: catalog.parse_param(name, keys::MAX_NODE_SIZE)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTreeDescriptor {
    /// Element serializer, lists only.
    pub serializer: Option<String>,
    pub dir_shift: u32,
    pub levels: u32,
    pub remove_collapses_index_tree: bool,
    pub root_recid: RecordId,
    /// Size counter record, lists only.
    pub size_recid: Option<RecordId>,
}

impl IndexTreeDescriptor {
    pub fn write_to(&self, name: &ObjectName, catalog: &mut NameCatalog) {
        if let Some(serializer) = &self.serializer {
            catalog.set_param(name, keys::SERIALIZER, serializer);
        }
        catalog.set_param(name, keys::DIR_SHIFT, self.dir_shift);
        catalog.set_param(name, keys::LEVELS, self.levels);
        catalog.set_param(
            name,
            keys::REMOVE_COLLAPSES_INDEX_TREE,
            self.remove_collapses_index_tree,
        );
        catalog.set_param(name, keys::ROOT_RECID, self.root_recid);
        if let Some(size) = self.size_recid {
            catalog.set_param(name, keys::SIZE, size);
        }
    }

    pub fn read_from(name: &ObjectName, catalog: &NameCatalog, list: bool) -> Result<Self> {
        let (serializer, size_recid) = if list {
            (
                Some(catalog.require_param(name, keys::SERIALIZER)?.to_string()),
                Some(catalog.recid_param(name, keys::SIZE)?),
            )
        } else {
            (None, None)
        };
        Ok(IndexTreeDescriptor {
            serializer,
            dir_shift: catalog.parse_param(name, keys::DIR_SHIFT)?,
            levels: catalog.parse_param(name, keys::LEVELS)?,
            remove_collapses_index_tree: catalog
                .parse_param(name, keys::REMOVE_COLLAPSES_INDEX_TREE)?,
            root_recid: catalog.recid_param(name, keys::ROOT_RECID)?,
            size_recid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> ObjectName {
        ObjectName::try_new("sessions").unwrap()
    }

    fn recids(range: std::ops::Range<u64>) -> Vec<RecordId> {
        range.map(RecordId::new).collect()
    }

    fn hash_map_descriptor() -> HashDescriptor {
        HashDescriptor {
            kind: CollectionKind::Map,
            key_serializer: "String".to_string(),
            value_serializer: Some("Generic".to_string()),
            value_inline: false,
            conc_shift: 1,
            dir_shift: 7,
            levels: 4,
            hash_seed: 42,
            segment_recids: recids(9..11),
            counter_recids: Some(recids(11..13)),
            remove_collapses_index_tree: true,
            expire_create_ttl: 1000,
            expire_update_ttl: 0,
            expire_get_ttl: 500,
            expire_create_queues: Some(ExpireQueue::unflatten(&recids(20..26))),
            expire_update_queues: None,
            expire_get_queues: Some(ExpireQueue::unflatten(&recids(30..36))),
        }
    }

    #[test]
    fn test_hash_descriptor_through_catalog() {
        let descriptor = hash_map_descriptor();
        let mut catalog = NameCatalog::new();
        descriptor.write_to(&name(), &mut catalog);

        assert_eq!(catalog.get("sessions#expireCreateQueue"), Some("20,21,22,23,24,25"));
        assert!(catalog.get("sessions#expireUpdateQueue").is_none());
        assert_eq!(catalog.get("sessions#expireUpdateTTL"), Some("0"));

        let decoded = HashDescriptor::read_from(&name(), &catalog, CollectionKind::Map).unwrap();
        assert_eq!(decoded, descriptor);
        assert!(decoded.has_expiration());
    }

    #[test]
    fn test_short_queue_list_rejected() {
        let mut catalog = NameCatalog::new();
        hash_map_descriptor().write_to(&name(), &mut catalog);
        catalog.insert("sessions#expireGetQueue", "30,31,32");

        let err = HashDescriptor::read_from(&name(), &catalog, CollectionKind::Map).unwrap_err();
        assert!(err.to_string().contains("sessions#expireGetQueue"));
    }

    #[test]
    fn test_queue_flatten_order() {
        let queues = ExpireQueue::unflatten(&recids(1..7));
        assert_eq!(queues.len(), 2);
        assert_eq!(queues[1].head, RecordId::new(4));
        assert_eq!(queues[1].head_prev, RecordId::new(6));
        assert_eq!(ExpireQueue::flatten(&queues), recids(1..7));
    }

    #[test]
    fn test_tree_set_descriptor() {
        let descriptor = TreeDescriptor {
            kind: CollectionKind::Set,
            key_serializer: "Long".to_string(),
            value_serializer: None,
            value_inline: false,
            root_recid_recid: RecordId::new(12),
            counter_recid: None,
            max_node_size: 16,
        };
        let mut catalog = NameCatalog::new();
        descriptor.write_to(&name(), &mut catalog);
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            TreeDescriptor::read_from(&name(), &catalog, CollectionKind::Set).unwrap(),
            descriptor
        );
    }
}
