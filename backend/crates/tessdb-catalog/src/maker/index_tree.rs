//! Makers for index-tree lists and long-to-long maps.

use std::sync::Arc;

use tessdb_commons::ObjectName;

use super::Maker;
use crate::collections::index_tree::{DEFAULT_INDEX_DIR_SHIFT, DEFAULT_INDEX_LEVELS};
use crate::collections::{put_u64, IndexTreeList, IndexTreeLongLongMap, EMPTY_DIR_NODE};
use crate::db::Db;
use crate::descriptor::IndexTreeDescriptor;
use crate::error::{CatalogError, Result};
use crate::instance_cache::LiveObject;
use crate::name_catalog::NameCatalog;
use crate::schema::{keys, CollectionType};
use crate::serializers::Serializer;

const MAX_INDEX_DIR_SHIFT: u32 = 7;
const MAX_INDEX_BITS: u32 = 64;

#[derive(Debug, Clone, Copy)]
struct IndexTreeOptions {
    dir_shift: u32,
    levels: u32,
    remove_collapses_index_tree: bool,
}

impl Default for IndexTreeOptions {
    fn default() -> Self {
        Self {
            dir_shift: DEFAULT_INDEX_DIR_SHIFT,
            levels: DEFAULT_INDEX_LEVELS,
            remove_collapses_index_tree: true,
        }
    }
}

impl IndexTreeOptions {
    fn verify(&self, name: &str) -> Result<()> {
        if self.dir_shift < 1 || self.dir_shift > MAX_INDEX_DIR_SHIFT {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': directory shift {} is outside 1..={}",
                name, self.dir_shift, MAX_INDEX_DIR_SHIFT
            )));
        }
        let index_bits = u64::from(self.dir_shift) * u64::from(self.levels);
        if self.levels < 1 || index_bits > u64::from(MAX_INDEX_BITS) {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}': {} levels of shift {} do not fit a {} bit index",
                name, self.levels, self.dir_shift, MAX_INDEX_BITS
            )));
        }
        Ok(())
    }
}

pub struct IndexTreeListMaker<'a> {
    db: &'a Db,
    name: String,
    serializer: Option<Arc<dyn Serializer>>,
    options: IndexTreeOptions,
}

impl<'a> IndexTreeListMaker<'a> {
    pub(crate) fn new(db: &'a Db, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
            serializer: None,
            options: IndexTreeOptions::default(),
        }
    }

    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn layout(mut self, dir_shift: u32, levels: u32) -> Self {
        self.options.dir_shift = dir_shift;
        self.options.levels = levels;
        self
    }

    pub fn remove_collapses_index_tree(mut self, collapse: bool) -> Self {
        self.options.remove_collapses_index_tree = collapse;
        self
    }
}

impl Maker for IndexTreeListMaker<'_> {
    type Output = IndexTreeList;

    const TYPE: CollectionType = CollectionType::IndexTreeList;

    fn db(&self) -> &Db {
        self.db
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn verify(&self) -> Result<()> {
        self.options.verify(&self.name)
    }

    fn open_existing(&self, name: &ObjectName, catalog: &NameCatalog) -> Result<IndexTreeList> {
        let descriptor = IndexTreeDescriptor::read_from(name, catalog, true)?;
        let stored = descriptor.serializer.as_deref().unwrap_or_default();
        let serializer = self.db.serializers().resolve_for_open(
            &name.param_key(keys::SERIALIZER),
            stored,
            self.serializer.as_ref(),
        )?;
        Ok(IndexTreeList::new(
            name.clone(),
            descriptor,
            Arc::clone(self.db.store()),
            serializer,
        ))
    }

    fn create_new(&self, name: &ObjectName, catalog: &mut NameCatalog) -> Result<IndexTreeList> {
        let store = self.db.store();
        let serializer = self
            .serializer
            .clone()
            .unwrap_or_else(|| self.db.default_serializer());
        let root_recid = store.put(Some(EMPTY_DIR_NODE))?;
        let size_recid = put_u64(store.as_ref(), 0)?;
        let descriptor = IndexTreeDescriptor {
            serializer: Some(
                self.db
                    .serializers()
                    .catalog_name(serializer.as_ref())
                    .to_string(),
            ),
            dir_shift: self.options.dir_shift,
            levels: self.options.levels,
            remove_collapses_index_tree: self.options.remove_collapses_index_tree,
            root_recid,
            size_recid: Some(size_recid),
        };
        descriptor.write_to(name, catalog);
        Ok(IndexTreeList::new(
            name.clone(),
            descriptor,
            Arc::clone(store),
            serializer,
        ))
    }

    fn into_live(object: Arc<IndexTreeList>) -> LiveObject {
        LiveObject::IndexTreeList(object)
    }

    fn from_live(object: &LiveObject) -> Option<Arc<IndexTreeList>> {
        match object {
            LiveObject::IndexTreeList(object) => Some(Arc::clone(object)),
            _ => None,
        }
    }
}

maker_entry_points!(IndexTreeListMaker);

pub struct IndexTreeLongLongMapMaker<'a> {
    db: &'a Db,
    name: String,
    options: IndexTreeOptions,
}

impl<'a> IndexTreeLongLongMapMaker<'a> {
    pub(crate) fn new(db: &'a Db, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
            options: IndexTreeOptions::default(),
        }
    }

    pub fn layout(mut self, dir_shift: u32, levels: u32) -> Self {
        self.options.dir_shift = dir_shift;
        self.options.levels = levels;
        self
    }

    pub fn remove_collapses_index_tree(mut self, collapse: bool) -> Self {
        self.options.remove_collapses_index_tree = collapse;
        self
    }
}

impl Maker for IndexTreeLongLongMapMaker<'_> {
    type Output = IndexTreeLongLongMap;

    const TYPE: CollectionType = CollectionType::IndexTreeLongLongMap;

    fn db(&self) -> &Db {
        self.db
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn verify(&self) -> Result<()> {
        self.options.verify(&self.name)
    }

    fn open_existing(
        &self,
        name: &ObjectName,
        catalog: &NameCatalog,
    ) -> Result<IndexTreeLongLongMap> {
        let descriptor = IndexTreeDescriptor::read_from(name, catalog, false)?;
        Ok(IndexTreeLongLongMap::new(
            name.clone(),
            descriptor,
            Arc::clone(self.db.store()),
        ))
    }

    fn create_new(
        &self,
        name: &ObjectName,
        catalog: &mut NameCatalog,
    ) -> Result<IndexTreeLongLongMap> {
        let store = self.db.store();
        let descriptor = IndexTreeDescriptor {
            serializer: None,
            dir_shift: self.options.dir_shift,
            levels: self.options.levels,
            remove_collapses_index_tree: self.options.remove_collapses_index_tree,
            root_recid: store.put(Some(EMPTY_DIR_NODE))?,
            size_recid: None,
        };
        descriptor.write_to(name, catalog);
        Ok(IndexTreeLongLongMap::new(
            name.clone(),
            descriptor,
            Arc::clone(store),
        ))
    }

    fn into_live(object: Arc<IndexTreeLongLongMap>) -> LiveObject {
        LiveObject::IndexTreeLongLongMap(object)
    }

    fn from_live(object: &LiveObject) -> Option<Arc<IndexTreeLongLongMap>> {
        match object {
            LiveObject::IndexTreeLongLongMap(object) => Some(Arc::clone(object)),
            _ => None,
        }
    }
}

maker_entry_points!(IndexTreeLongLongMapMaker);
