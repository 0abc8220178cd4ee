//! Makers for segmented hash maps and sets.

use std::sync::Arc;
use std::time::Duration;

use tessdb_commons::ObjectName;

use super::Maker;
use crate::collections::hash::{
    allocate_counters, allocate_queues, allocate_segments, ExpirationSettings,
};
use crate::collections::{HashTreeMap, HashTreeSet, ModificationListener};
use crate::db::Db;
use crate::descriptor::{CollectionKind, ExpireAxis, HashDescriptor};
use crate::error::{CatalogError, Result};
use crate::executor::BackgroundExecutor;
use crate::instance_cache::LiveObject;
use crate::name_catalog::NameCatalog;
use crate::schema::{keys, CollectionType};
use crate::serializers::{Serializer, SerializerId};
use crate::validator::MAX_CONC_SHIFT;

pub const DEFAULT_CONC_SHIFT: u32 = 3;
pub const DEFAULT_DIR_SHIFT: u32 = 7;
pub const DEFAULT_LEVELS: u32 = 4;
const MAX_DIR_SHIFT: u32 = 7;
const MAX_HASH_BITS: u32 = 32;

/// Shift of the smallest power of two holding `n`; past `2^31` it answers
/// 32, which `verify` rejects for every layout parameter.
fn shift_for(n: u32) -> u32 {
    n.max(1)
        .checked_next_power_of_two()
        .map_or(u32::BITS, u32::trailing_zeros)
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Options shared by hash maps and sets.
#[derive(Clone)]
struct HashOptions {
    conc_shift: u32,
    dir_shift: u32,
    levels: u32,
    hash_seed: Option<i32>,
    counter_enable: bool,
    remove_collapses_index_tree: bool,
    expire_create_ttl: u64,
    expire_update_ttl: u64,
    expire_get_ttl: u64,
    expire_max_size: u64,
    expire_store_size: u64,
    expire_executor: Option<Arc<dyn BackgroundExecutor>>,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self {
            conc_shift: DEFAULT_CONC_SHIFT,
            dir_shift: DEFAULT_DIR_SHIFT,
            levels: DEFAULT_LEVELS,
            hash_seed: None,
            counter_enable: false,
            remove_collapses_index_tree: true,
            expire_create_ttl: 0,
            expire_update_ttl: 0,
            expire_get_ttl: 0,
            expire_max_size: 0,
            expire_store_size: 0,
            expire_executor: None,
        }
    }
}

impl HashOptions {
    fn has_expiration(&self) -> bool {
        self.expire_create_ttl > 0
            || self.expire_update_ttl > 0
            || self.expire_get_ttl > 0
            || self.expire_max_size > 0
            || self.expire_store_size > 0
    }

    fn verify(&self, name: &str) -> Result<()> {
        if self.conc_shift > MAX_CONC_SHIFT {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': concurrency shift {} exceeds {}",
                name, self.conc_shift, MAX_CONC_SHIFT
            )));
        }
        if self.dir_shift < 1 || self.dir_shift > MAX_DIR_SHIFT {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': directory shift {} is outside 1..={}",
                name, self.dir_shift, MAX_DIR_SHIFT
            )));
        }
        if self.levels < 1 {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': at least one index level is required",
                name
            )));
        }
        let hash_bits =
            u64::from(self.conc_shift) + u64::from(self.dir_shift) * u64::from(self.levels);
        if hash_bits > u64::from(MAX_HASH_BITS) {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': concShift + dirShift * levels = {} exceeds {} hash bits",
                name, hash_bits, MAX_HASH_BITS
            )));
        }
        if self.expire_executor.is_some() && !self.has_expiration() {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': an expiration executor needs an expiration setting",
                name
            )));
        }
        if self.expire_max_size > 0 && !self.counter_enable {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': expire_max_size requires counter_enable",
                name
            )));
        }
        Ok(())
    }

    fn ttl(&self, axis: ExpireAxis) -> u64 {
        match axis {
            ExpireAxis::Create => self.expire_create_ttl,
            ExpireAxis::Update => self.expire_update_ttl,
            ExpireAxis::Get => self.expire_get_ttl,
        }
    }

    fn expiration(&self) -> ExpirationSettings {
        ExpirationSettings {
            max_size: self.expire_max_size,
            store_size: self.expire_store_size,
            executor: self.expire_executor.clone(),
        }
    }
}

/// Allocates segment, counter and queue records and writes the descriptor.
#[allow(clippy::too_many_arguments)]
fn create_descriptor(
    db: &Db,
    name: &ObjectName,
    catalog: &mut NameCatalog,
    kind: CollectionKind,
    options: &HashOptions,
    key_serializer: &dyn Serializer,
    value_serializer: Option<&dyn Serializer>,
    value_inline: bool,
) -> Result<HashDescriptor> {
    let store = db.store().as_ref();
    let segments = 1usize << options.conc_shift;

    let segment_recids = allocate_segments(store, segments)?;
    let counter_recids = if options.counter_enable {
        Some(allocate_counters(store, segments)?)
    } else {
        None
    };

    let mut queues = [None, None, None];
    for (slot, axis) in [ExpireAxis::Create, ExpireAxis::Update, ExpireAxis::Get]
        .into_iter()
        .enumerate()
    {
        if kind.expire_axes().contains(&axis) && options.ttl(axis) > 0 {
            queues[slot] = Some(allocate_queues(store, segments)?);
        }
    }
    let [expire_create_queues, expire_update_queues, expire_get_queues] = queues;

    let registry = db.serializers();
    let descriptor = HashDescriptor {
        kind,
        key_serializer: registry.catalog_name(key_serializer).to_string(),
        value_serializer: value_serializer.map(|s| registry.catalog_name(s).to_string()),
        value_inline,
        conc_shift: options.conc_shift,
        dir_shift: options.dir_shift,
        levels: options.levels,
        hash_seed: options.hash_seed.unwrap_or_else(rand::random),
        segment_recids,
        counter_recids,
        remove_collapses_index_tree: options.remove_collapses_index_tree,
        expire_create_ttl: options.expire_create_ttl,
        expire_update_ttl: if kind == CollectionKind::Map {
            options.expire_update_ttl
        } else {
            0
        },
        expire_get_ttl: options.expire_get_ttl,
        expire_create_queues,
        expire_update_queues,
        expire_get_queues,
    };
    descriptor.write_to(name, catalog);
    Ok(descriptor)
}

fn open_descriptor(
    name: &ObjectName,
    catalog: &NameCatalog,
    kind: CollectionKind,
    options: &HashOptions,
) -> Result<HashDescriptor> {
    let descriptor = HashDescriptor::read_from(name, catalog, kind)?;
    if options.expire_max_size > 0 && descriptor.counter_recids.is_none() {
        return Err(CatalogError::wrong_configuration(format!(
            "'{}' was created without counters; expire_max_size cannot be used",
            name
        )));
    }
    Ok(descriptor)
}

macro_rules! hash_option_setters {
    () => {
        /// Number of segments, rounded up to a power of two.
        pub fn concurrency(mut self, segments: u32) -> Self {
            self.options.conc_shift = shift_for(segments);
            self
        }

        /// Segment count, directory fan-out and depth of each segment's index tree.
        pub fn layout(mut self, segments: u32, dir_size: u32, levels: u32) -> Self {
            self.options.conc_shift = shift_for(segments);
            self.options.dir_shift = shift_for(dir_size);
            self.options.levels = levels;
            self
        }

        pub fn hash_seed(mut self, seed: i32) -> Self {
            self.options.hash_seed = Some(seed);
            self
        }

        pub fn counter_enable(mut self) -> Self {
            self.options.counter_enable = true;
            self
        }

        pub fn remove_collapses_index_tree(mut self, collapse: bool) -> Self {
            self.options.remove_collapses_index_tree = collapse;
            self
        }

        /// A zero duration leaves the axis disabled.
        pub fn expire_after_create(mut self, ttl: Duration) -> Self {
            self.options.expire_create_ttl = millis(ttl);
            self
        }

        pub fn expire_after_get(mut self, ttl: Duration) -> Self {
            self.options.expire_get_ttl = millis(ttl);
            self
        }

        pub fn expire_max_size(mut self, max_size: u64) -> Self {
            self.options.expire_max_size = max_size;
            self
        }

        pub fn expire_store_size(mut self, store_size: u64) -> Self {
            self.options.expire_store_size = store_size;
            self
        }

        /// Executor running expiration in the background. Owned by the database
        /// for shutdown once the collection is built.
        pub fn expire_executor(mut self, executor: Arc<dyn BackgroundExecutor>) -> Self {
            self.options.expire_executor = Some(executor);
            self
        }
    };
}

pub struct HashMapMaker<'a> {
    db: &'a Db,
    name: String,
    key_serializer: Option<Arc<dyn Serializer>>,
    value_serializer: Option<Arc<dyn Serializer>>,
    value_inline: bool,
    options: HashOptions,
    listeners: Vec<Arc<dyn ModificationListener>>,
    expire_overflow: Option<Arc<dyn ModificationListener>>,
}

impl<'a> HashMapMaker<'a> {
    pub(crate) fn new(db: &'a Db, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
            key_serializer: None,
            value_serializer: None,
            value_inline: false,
            options: HashOptions::default(),
            listeners: Vec::new(),
            expire_overflow: None,
        }
    }

    pub fn key_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.key_serializer = Some(serializer);
        self
    }

    pub fn value_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.value_serializer = Some(serializer);
        self
    }

    /// Store values inside index nodes instead of separate records.
    pub fn value_inline(mut self) -> Self {
        self.value_inline = true;
        self
    }

    pub fn expire_after_update(mut self, ttl: Duration) -> Self {
        self.options.expire_update_ttl = millis(ttl);
        self
    }

    /// Receives entries evicted by expiration.
    pub fn expire_overflow(mut self, sink: Arc<dyn ModificationListener>) -> Self {
        self.expire_overflow = Some(sink);
        self
    }

    pub fn modification_listener(mut self, listener: Arc<dyn ModificationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    hash_option_setters!();

    fn build(
        &self,
        name: &ObjectName,
        descriptor: HashDescriptor,
        key_serializer: Arc<dyn Serializer>,
        value_serializer: Arc<dyn Serializer>,
    ) -> HashTreeMap {
        if let Some(executor) = &self.options.expire_executor {
            self.db.register_executor(Arc::clone(executor));
        }
        let mut listeners = self.listeners.clone();
        listeners.extend(self.expire_overflow.iter().cloned());
        HashTreeMap::new(
            name.clone(),
            descriptor,
            Arc::clone(self.db.store()),
            key_serializer,
            value_serializer,
            listeners,
            self.options.expiration(),
        )
    }
}

impl Maker for HashMapMaker<'_> {
    type Output = HashTreeMap;

    const TYPE: CollectionType = CollectionType::HashMap;

    fn db(&self) -> &Db {
        self.db
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn verify(&self) -> Result<()> {
        self.options.verify(&self.name)?;
        if self.expire_overflow.is_some() && !self.options.has_expiration() {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': an expiration overflow needs an expiration setting",
                self.name
            )));
        }
        Ok(())
    }

    fn open_existing(&self, name: &ObjectName, catalog: &NameCatalog) -> Result<HashTreeMap> {
        let descriptor = open_descriptor(name, catalog, CollectionKind::Map, &self.options)?;
        let registry = self.db.serializers();
        let key_serializer = registry.resolve_for_open(
            &name.param_key(keys::KEY_SERIALIZER),
            &descriptor.key_serializer,
            self.key_serializer.as_ref(),
        )?;
        let value_serializer = registry.resolve_for_open(
            &name.param_key(keys::VALUE_SERIALIZER),
            descriptor
                .value_serializer
                .as_deref()
                .unwrap_or(SerializerId::Generic.name()),
            self.value_serializer.as_ref(),
        )?;
        Ok(self.build(name, descriptor, key_serializer, value_serializer))
    }

    fn create_new(&self, name: &ObjectName, catalog: &mut NameCatalog) -> Result<HashTreeMap> {
        let key_serializer = self
            .key_serializer
            .clone()
            .unwrap_or_else(|| self.db.default_serializer());
        let value_serializer = self
            .value_serializer
            .clone()
            .unwrap_or_else(|| self.db.default_serializer());
        let descriptor = create_descriptor(
            self.db,
            name,
            catalog,
            CollectionKind::Map,
            &self.options,
            key_serializer.as_ref(),
            Some(value_serializer.as_ref()),
            self.value_inline,
        )?;
        Ok(self.build(name, descriptor, key_serializer, value_serializer))
    }

    fn into_live(object: Arc<HashTreeMap>) -> LiveObject {
        LiveObject::HashMap(object)
    }

    fn from_live(object: &LiveObject) -> Option<Arc<HashTreeMap>> {
        match object {
            LiveObject::HashMap(object) => Some(Arc::clone(object)),
            _ => None,
        }
    }
}

maker_entry_points!(HashMapMaker);

pub struct HashSetMaker<'a> {
    db: &'a Db,
    name: String,
    serializer: Option<Arc<dyn Serializer>>,
    options: HashOptions,
}

impl<'a> HashSetMaker<'a> {
    pub(crate) fn new(db: &'a Db, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
            serializer: None,
            options: HashOptions::default(),
        }
    }

    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    hash_option_setters!();

    fn build(
        &self,
        name: &ObjectName,
        descriptor: HashDescriptor,
        serializer: Arc<dyn Serializer>,
    ) -> HashTreeSet {
        if let Some(executor) = &self.options.expire_executor {
            self.db.register_executor(Arc::clone(executor));
        }
        HashTreeSet::new(HashTreeMap::new(
            name.clone(),
            descriptor,
            Arc::clone(self.db.store()),
            serializer,
            self.db.serializers().get(SerializerId::Nothing),
            Vec::new(),
            self.options.expiration(),
        ))
    }
}

impl Maker for HashSetMaker<'_> {
    type Output = HashTreeSet;

    const TYPE: CollectionType = CollectionType::HashSet;

    fn db(&self) -> &Db {
        self.db
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn verify(&self) -> Result<()> {
        self.options.verify(&self.name)
    }

    fn open_existing(&self, name: &ObjectName, catalog: &NameCatalog) -> Result<HashTreeSet> {
        let descriptor = open_descriptor(name, catalog, CollectionKind::Set, &self.options)?;
        let serializer = self.db.serializers().resolve_for_open(
            &name.param_key(keys::SERIALIZER),
            &descriptor.key_serializer,
            self.serializer.as_ref(),
        )?;
        Ok(self.build(name, descriptor, serializer))
    }

    fn create_new(&self, name: &ObjectName, catalog: &mut NameCatalog) -> Result<HashTreeSet> {
        let serializer = self
            .serializer
            .clone()
            .unwrap_or_else(|| self.db.default_serializer());
        let descriptor = create_descriptor(
            self.db,
            name,
            catalog,
            CollectionKind::Set,
            &self.options,
            serializer.as_ref(),
            None,
            false,
        )?;
        Ok(self.build(name, descriptor, serializer))
    }

    fn into_live(object: Arc<HashTreeSet>) -> LiveObject {
        LiveObject::HashSet(object)
    }

    fn from_live(object: &LiveObject) -> Option<Arc<HashTreeSet>> {
        match object {
            LiveObject::HashSet(object) => Some(Arc::clone(object)),
            _ => None,
        }
    }
}

maker_entry_points!(HashSetMaker);
