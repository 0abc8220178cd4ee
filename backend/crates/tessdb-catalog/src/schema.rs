//! Per-type declarations of the catalog parameters each collection type stores.

use std::fmt;

use tessdb_commons::ids::parse_recid_list;

/// Catalog parameter names.
pub mod keys {
    pub const TYPE: &str = "type";

    pub const SERIALIZER: &str = "serializer";
    pub const KEY_SERIALIZER: &str = "keySerializer";
    pub const VALUE_SERIALIZER: &str = "valueSerializer";
    pub const VALUE_INLINE: &str = "valueInline";

    pub const CONC_SHIFT: &str = "concShift";
    pub const DIR_SHIFT: &str = "dirShift";
    pub const LEVELS: &str = "levels";
    pub const HASH_SEED: &str = "hashSeed";
    pub const SEGMENT_RECIDS: &str = "segmentRecids";
    pub const COUNTER_RECIDS: &str = "counterRecids";
    pub const REMOVE_COLLAPSES_INDEX_TREE: &str = "removeCollapsesIndexTree";

    pub const EXPIRE_CREATE_TTL: &str = "expireCreateTTL";
    pub const EXPIRE_UPDATE_TTL: &str = "expireUpdateTTL";
    pub const EXPIRE_GET_TTL: &str = "expireGetTTL";
    pub const EXPIRE_CREATE_QUEUE: &str = "expireCreateQueue";
    pub const EXPIRE_UPDATE_QUEUE: &str = "expireUpdateQueue";
    pub const EXPIRE_GET_QUEUE: &str = "expireGetQueue";

    pub const ROOT_RECID: &str = "rootRecid";
    pub const ROOT_RECID_RECID: &str = "rootRecidRecid";
    pub const COUNTER_RECID: &str = "counterRecid";
    pub const MAX_NODE_SIZE: &str = "maxNodeSize";

    pub const RECID: &str = "recid";
    pub const SIZE: &str = "size";

    /// Reserved parameterless key holding the catalog format version.
    pub const FORMAT_VERSION: &str = "formatVersion";
}

/// Closed set of collection types the catalog knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionType {
    HashMap,
    HashSet,
    TreeMap,
    TreeSet,
    AtomicBoolean,
    AtomicInteger,
    AtomicLong,
    AtomicString,
    AtomicVar,
    IndexTreeList,
    IndexTreeLongLongMap,
}

impl CollectionType {
    pub const ALL: [CollectionType; 11] = [
        CollectionType::HashMap,
        CollectionType::HashSet,
        CollectionType::TreeMap,
        CollectionType::TreeSet,
        CollectionType::AtomicBoolean,
        CollectionType::AtomicInteger,
        CollectionType::AtomicLong,
        CollectionType::AtomicString,
        CollectionType::AtomicVar,
        CollectionType::IndexTreeList,
        CollectionType::IndexTreeLongLongMap,
    ];

    /// Type tag stored under `<name>#type`.
    pub fn tag(&self) -> &'static str {
        match self {
            CollectionType::HashMap => "HashMap",
            CollectionType::HashSet => "HashSet",
            CollectionType::TreeMap => "TreeMap",
            CollectionType::TreeSet => "TreeSet",
            CollectionType::AtomicBoolean => "AtomicBoolean",
            CollectionType::AtomicInteger => "AtomicInteger",
            CollectionType::AtomicLong => "AtomicLong",
            CollectionType::AtomicString => "AtomicString",
            CollectionType::AtomicVar => "AtomicVar",
            CollectionType::IndexTreeList => "IndexTreeList",
            CollectionType::IndexTreeLongLongMap => "IndexTreeLongLongMap",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.tag() == tag)
    }

    /// Parameters stored for this type, type tag excluded.
    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            CollectionType::HashMap => HASH_MAP_PARAMS,
            CollectionType::HashSet => HASH_SET_PARAMS,
            CollectionType::TreeMap => TREE_MAP_PARAMS,
            CollectionType::TreeSet => TREE_SET_PARAMS,
            CollectionType::AtomicBoolean
            | CollectionType::AtomicInteger
            | CollectionType::AtomicLong
            | CollectionType::AtomicString => ATOMIC_PARAMS,
            CollectionType::AtomicVar => ATOMIC_VAR_PARAMS,
            CollectionType::IndexTreeList => INDEX_TREE_LIST_PARAMS,
            CollectionType::IndexTreeLongLongMap => INDEX_TREE_LONG_LONG_MAP_PARAMS,
        }
    }

    pub fn param(&self, key: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|spec| spec.key == key)
    }

    pub fn is_hash(&self) -> bool {
        matches!(self, CollectionType::HashMap | CollectionType::HashSet)
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Value format a parameter must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamFormat {
    Int,
    NonNegativeInt,
    RecidList,
    Bool,
    Opaque,
}

impl ParamFormat {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ParamFormat::Int => value.parse::<i64>().is_ok(),
            ParamFormat::NonNegativeInt => value.parse::<u64>().is_ok(),
            ParamFormat::RecidList => parse_recid_list(value).is_ok(),
            ParamFormat::Bool => value == "true" || value == "false",
            ParamFormat::Opaque => true,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ParamFormat::Int => "an integer",
            ParamFormat::NonNegativeInt => "a non-negative integer",
            ParamFormat::RecidList => "a comma-separated record id list",
            ParamFormat::Bool => "'true' or 'false'",
            ParamFormat::Opaque => "any value",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub key: &'static str,
    pub format: ParamFormat,
    pub required: bool,
}

const fn required(key: &'static str, format: ParamFormat) -> ParamSpec {
    ParamSpec {
        key,
        format,
        required: true,
    }
}

const fn optional(key: &'static str, format: ParamFormat) -> ParamSpec {
    ParamSpec {
        key,
        format,
        required: false,
    }
}

use ParamFormat::{Bool, Int, NonNegativeInt, Opaque, RecidList};

static HASH_MAP_PARAMS: &[ParamSpec] = &[
    required(keys::KEY_SERIALIZER, Opaque),
    required(keys::VALUE_SERIALIZER, Opaque),
    required(keys::VALUE_INLINE, Bool),
    required(keys::CONC_SHIFT, NonNegativeInt),
    required(keys::DIR_SHIFT, NonNegativeInt),
    required(keys::LEVELS, NonNegativeInt),
    required(keys::HASH_SEED, Int),
    required(keys::SEGMENT_RECIDS, RecidList),
    required(keys::REMOVE_COLLAPSES_INDEX_TREE, Bool),
    required(keys::EXPIRE_CREATE_TTL, NonNegativeInt),
    required(keys::EXPIRE_UPDATE_TTL, NonNegativeInt),
    required(keys::EXPIRE_GET_TTL, NonNegativeInt),
    optional(keys::COUNTER_RECIDS, RecidList),
    optional(keys::EXPIRE_CREATE_QUEUE, RecidList),
    optional(keys::EXPIRE_UPDATE_QUEUE, RecidList),
    optional(keys::EXPIRE_GET_QUEUE, RecidList),
];

static HASH_SET_PARAMS: &[ParamSpec] = &[
    required(keys::SERIALIZER, Opaque),
    required(keys::CONC_SHIFT, NonNegativeInt),
    required(keys::DIR_SHIFT, NonNegativeInt),
    required(keys::LEVELS, NonNegativeInt),
    required(keys::HASH_SEED, Int),
    required(keys::SEGMENT_RECIDS, RecidList),
    required(keys::REMOVE_COLLAPSES_INDEX_TREE, Bool),
    required(keys::EXPIRE_CREATE_TTL, NonNegativeInt),
    required(keys::EXPIRE_GET_TTL, NonNegativeInt),
    optional(keys::COUNTER_RECIDS, RecidList),
    optional(keys::EXPIRE_CREATE_QUEUE, RecidList),
    optional(keys::EXPIRE_GET_QUEUE, RecidList),
];

static TREE_MAP_PARAMS: &[ParamSpec] = &[
    required(keys::KEY_SERIALIZER, Opaque),
    required(keys::VALUE_SERIALIZER, Opaque),
    required(keys::ROOT_RECID_RECID, NonNegativeInt),
    required(keys::MAX_NODE_SIZE, NonNegativeInt),
    required(keys::VALUE_INLINE, Bool),
    optional(keys::COUNTER_RECID, NonNegativeInt),
];

static TREE_SET_PARAMS: &[ParamSpec] = &[
    required(keys::SERIALIZER, Opaque),
    required(keys::ROOT_RECID_RECID, NonNegativeInt),
    required(keys::MAX_NODE_SIZE, NonNegativeInt),
    optional(keys::COUNTER_RECID, NonNegativeInt),
];

static ATOMIC_PARAMS: &[ParamSpec] = &[required(keys::RECID, NonNegativeInt)];

static ATOMIC_VAR_PARAMS: &[ParamSpec] = &[
    required(keys::RECID, NonNegativeInt),
    required(keys::SERIALIZER, Opaque),
];

static INDEX_TREE_LIST_PARAMS: &[ParamSpec] = &[
    required(keys::SERIALIZER, Opaque),
    required(keys::DIR_SHIFT, NonNegativeInt),
    required(keys::LEVELS, NonNegativeInt),
    required(keys::REMOVE_COLLAPSES_INDEX_TREE, Bool),
    required(keys::ROOT_RECID, NonNegativeInt),
    required(keys::SIZE, NonNegativeInt),
];

static INDEX_TREE_LONG_LONG_MAP_PARAMS: &[ParamSpec] = &[
    required(keys::DIR_SHIFT, NonNegativeInt),
    required(keys::LEVELS, NonNegativeInt),
    required(keys::REMOVE_COLLAPSES_INDEX_TREE, Bool),
    required(keys::ROOT_RECID, NonNegativeInt),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for ty in CollectionType::ALL {
            assert_eq!(CollectionType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(CollectionType::from_tag("Queue"), None);
    }

    #[test]
    fn test_param_formats() {
        assert!(Int.accepts("-5"));
        assert!(!NonNegativeInt.accepts("-5"));
        assert!(RecidList.accepts("1,2,3"));
        assert!(RecidList.accepts(""));
        assert!(!RecidList.accepts("1,,3"));
        assert!(Bool.accepts("false"));
        assert!(!Bool.accepts("yes"));
        assert!(Opaque.accepts(""));
    }

    #[test]
    fn test_param_tables() {
        let hash_set = CollectionType::HashSet;
        assert!(hash_set.param(keys::EXPIRE_UPDATE_TTL).is_none());
        assert!(!hash_set.param(keys::COUNTER_RECIDS).unwrap().required);
        assert!(CollectionType::TreeMap.param(keys::MAX_NODE_SIZE).unwrap().required);
        assert_eq!(CollectionType::AtomicLong.params().len(), 1);
    }
}
