//! Makers for ordered maps and sets, including bulk loading.

use std::sync::Arc;

use tessdb_commons::ObjectName;

use super::Maker;
use crate::collections::tree::{
    allocate_empty_root, bulk_load, DEFAULT_MAX_NODE_SIZE, MIN_MAX_NODE_SIZE,
};
use crate::collections::{put_u64, ModificationListener, OrderedMap, OrderedSet};
use crate::db::Db;
use crate::descriptor::{CollectionKind, TreeDescriptor};
use crate::error::{CatalogError, Result};
use crate::instance_cache::LiveObject;
use crate::name_catalog::NameCatalog;
use crate::schema::{keys, CollectionType};
use crate::serializers::{Serializer, SerializerId};
use crate::value::Value;

#[derive(Clone)]
struct TreeOptions {
    max_node_size: u32,
    counter_enable: bool,
    entries: Option<Vec<(Value, Value)>>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_node_size: DEFAULT_MAX_NODE_SIZE,
            counter_enable: false,
            entries: None,
        }
    }
}

impl TreeOptions {
    fn verify(&self, name: &str) -> Result<()> {
        if self.max_node_size < MIN_MAX_NODE_SIZE {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': max node size {} is below {}",
                name, self.max_node_size, MIN_MAX_NODE_SIZE
            )));
        }
        Ok(())
    }

    fn reject_bulk_load_on_open(&self, name: &ObjectName) -> Result<()> {
        if self.entries.is_some() {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}' already exists; bulk load only applies to new collections",
                name
            )));
        }
        Ok(())
    }
}

/// Writes the root (empty or bulk loaded), its pointer record and the optional
/// counter, then records the descriptor.
#[allow(clippy::too_many_arguments)]
fn create_descriptor(
    db: &Db,
    name: &ObjectName,
    catalog: &mut NameCatalog,
    kind: CollectionKind,
    options: &TreeOptions,
    key_serializer: &dyn Serializer,
    value_serializer: &dyn Serializer,
    value_inline: bool,
) -> Result<TreeDescriptor> {
    let store = db.store().as_ref();
    let (root, count) = match &options.entries {
        Some(entries) => (
            bulk_load(
                store,
                key_serializer,
                value_serializer,
                entries,
                options.max_node_size,
            )?,
            entries.len() as u64,
        ),
        None => (allocate_empty_root(store)?, 0),
    };
    let root_recid_recid = put_u64(store, root.as_u64())?;
    let counter_recid = if options.counter_enable {
        Some(put_u64(store, count)?)
    } else {
        None
    };

    let registry = db.serializers();
    let descriptor = TreeDescriptor {
        kind,
        key_serializer: registry.catalog_name(key_serializer).to_string(),
        value_serializer: match kind {
            CollectionKind::Map => Some(registry.catalog_name(value_serializer).to_string()),
            CollectionKind::Set => None,
        },
        value_inline: kind == CollectionKind::Map && value_inline,
        root_recid_recid,
        counter_recid,
        max_node_size: options.max_node_size,
    };
    descriptor.write_to(name, catalog);
    Ok(descriptor)
}

pub struct TreeMapMaker<'a> {
    db: &'a Db,
    name: String,
    key_serializer: Option<Arc<dyn Serializer>>,
    value_serializer: Option<Arc<dyn Serializer>>,
    values_outside_nodes: bool,
    options: TreeOptions,
    listeners: Vec<Arc<dyn ModificationListener>>,
}

impl<'a> TreeMapMaker<'a> {
    pub(crate) fn new(db: &'a Db, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
            key_serializer: None,
            value_serializer: None,
            values_outside_nodes: false,
            options: TreeOptions::default(),
            listeners: Vec::new(),
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

    pub fn max_node_size(mut self, size: u32) -> Self {
        self.options.max_node_size = size;
        self
    }

    pub fn counter_enable(mut self) -> Self {
        self.options.counter_enable = true;
        self
    }

    /// Keep values in their own records rather than inside leaf nodes.
    pub fn values_outside_nodes(mut self) -> Self {
        self.values_outside_nodes = true;
        self
    }

    pub fn modification_listener(mut self, listener: Arc<dyn ModificationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Builds the new map from strictly ascending entries instead of starting empty.
    pub fn bulk_load<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        self.options.entries = Some(entries.into_iter().collect());
        self
    }
}

impl Maker for TreeMapMaker<'_> {
    type Output = OrderedMap;

    const TYPE: CollectionType = CollectionType::TreeMap;

    fn db(&self) -> &Db {
        self.db
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn verify(&self) -> Result<()> {
        self.options.verify(&self.name)
    }

    fn open_existing(&self, name: &ObjectName, catalog: &NameCatalog) -> Result<OrderedMap> {
        self.options.reject_bulk_load_on_open(name)?;
        let descriptor = TreeDescriptor::read_from(name, catalog, CollectionKind::Map)?;
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
        Ok(OrderedMap::new(
            name.clone(),
            descriptor,
            Arc::clone(self.db.store()),
            key_serializer,
            value_serializer,
            self.listeners.clone(),
        ))
    }

    fn create_new(&self, name: &ObjectName, catalog: &mut NameCatalog) -> Result<OrderedMap> {
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
            value_serializer.as_ref(),
            !self.values_outside_nodes,
        )?;
        Ok(OrderedMap::new(
            name.clone(),
            descriptor,
            Arc::clone(self.db.store()),
            key_serializer,
            value_serializer,
            self.listeners.clone(),
        ))
    }

    fn into_live(object: Arc<OrderedMap>) -> LiveObject {
        LiveObject::TreeMap(object)
    }

    fn from_live(object: &LiveObject) -> Option<Arc<OrderedMap>> {
        match object {
            LiveObject::TreeMap(object) => Some(Arc::clone(object)),
            _ => None,
        }
    }
}

maker_entry_points!(TreeMapMaker);

pub struct TreeSetMaker<'a> {
    db: &'a Db,
    name: String,
    serializer: Option<Arc<dyn Serializer>>,
    options: TreeOptions,
}

impl<'a> TreeSetMaker<'a> {
    pub(crate) fn new(db: &'a Db, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
            serializer: None,
            options: TreeOptions::default(),
        }
    }

    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn max_node_size(mut self, size: u32) -> Self {
        self.options.max_node_size = size;
        self
    }

    pub fn counter_enable(mut self) -> Self {
        self.options.counter_enable = true;
        self
    }

    /// Builds the new set from strictly ascending keys.
    pub fn bulk_load<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.options.entries = Some(keys.into_iter().map(|key| (key, Value::Null)).collect());
        self
    }
}

impl Maker for TreeSetMaker<'_> {
    type Output = OrderedSet;

    const TYPE: CollectionType = CollectionType::TreeSet;

    fn db(&self) -> &Db {
        self.db
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn verify(&self) -> Result<()> {
        self.options.verify(&self.name)
    }

    fn open_existing(&self, name: &ObjectName, catalog: &NameCatalog) -> Result<OrderedSet> {
        self.options.reject_bulk_load_on_open(name)?;
        let descriptor = TreeDescriptor::read_from(name, catalog, CollectionKind::Set)?;
        let serializer = self.db.serializers().resolve_for_open(
            &name.param_key(keys::SERIALIZER),
            &descriptor.key_serializer,
            self.serializer.as_ref(),
        )?;
        Ok(OrderedSet::new(OrderedMap::new(
            name.clone(),
            descriptor,
            Arc::clone(self.db.store()),
            serializer,
            self.db.serializers().get(SerializerId::Nothing),
            Vec::new(),
        )))
    }

    fn create_new(&self, name: &ObjectName, catalog: &mut NameCatalog) -> Result<OrderedSet> {
        let serializer = self
            .serializer
            .clone()
            .unwrap_or_else(|| self.db.default_serializer());
        let nothing = self.db.serializers().get(SerializerId::Nothing);
        let descriptor = create_descriptor(
            self.db,
            name,
            catalog,
            CollectionKind::Set,
            &self.options,
            serializer.as_ref(),
            nothing.as_ref(),
            false,
        )?;
        Ok(OrderedSet::new(OrderedMap::new(
            name.clone(),
            descriptor,
            Arc::clone(self.db.store()),
            serializer,
            nothing,
            Vec::new(),
        )))
    }

    fn into_live(object: Arc<OrderedSet>) -> LiveObject {
        LiveObject::TreeSet(object)
    }

    fn from_live(object: &LiveObject) -> Option<Arc<OrderedSet>> {
        match object {
            LiveObject::TreeSet(object) => Some(Arc::clone(object)),
            _ => None,
        }
    }
}

maker_entry_points!(TreeSetMaker);
