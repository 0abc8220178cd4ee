//! Create/open reconciliation shared by every collection type.
//!
//! A maker is a builder for one collection type. It only knows how to rebuild
//! its object from catalog parameters ([`Maker::open_existing`]) and how to
//! allocate fresh backing records ([`Maker::create_new`]); [`make`] decides
//! which of the two runs, under the database write lock.

use std::sync::Arc;

use tessdb_commons::ObjectName;

use crate::db::Db;
use crate::error::{CatalogError, Result};
use crate::instance_cache::LiveObject;
use crate::name_catalog::NameCatalog;
use crate::schema::{keys, CollectionType};

/// How a maker treats an existing or missing name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail if the name already exists.
    CreateOnly,
    /// Fail if the name does not exist.
    OpenOnly,
    CreateOrOpen,
}

pub trait Maker {
    type Output: Send + Sync + 'static;

    const TYPE: CollectionType;

    fn db(&self) -> &Db;

    fn name(&self) -> &str;

    /// Checks builder options before anything is allocated.
    fn verify(&self) -> Result<()> {
        Ok(())
    }

    /// Rebuilds the object from existing records. Must not allocate or edit the catalog.
    fn open_existing(&self, name: &ObjectName, catalog: &NameCatalog) -> Result<Self::Output>;

    /// Allocates backing records and writes every parameter into `catalog`.
    fn create_new(&self, name: &ObjectName, catalog: &mut NameCatalog) -> Result<Self::Output>;

    fn into_live(object: Arc<Self::Output>) -> LiveObject;

    fn from_live(object: &LiveObject) -> Option<Arc<Self::Output>>;
}

/// Resolves `maker`'s name to a live object according to `mode`.
pub fn make<M: Maker>(maker: &M, mode: CreateMode) -> Result<Arc<M::Output>> {
    let db = maker.db();
    let name = ObjectName::try_new(maker.name())?;

    let _guard = db.write_lock();
    db.ensure_open()?;
    maker.verify()?;

    let store = db.store();
    let mut catalog = NameCatalog::load(store.as_ref())?;
    let requested = M::TYPE;
    let existing = catalog.get_type(name.as_str()).map(str::to_string);

    if let Some(tag) = &existing {
        if tag != requested.tag() {
            return Err(CatalogError::wrong_configuration(format!(
                "type mismatch: '{}' is a {} but a {} was requested",
                name, tag, requested
            )));
        }
    }
    match (mode, existing.is_some()) {
        (CreateMode::CreateOnly, true) => {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}' already exists",
                name
            )))
        }
        (CreateMode::OpenOnly, false) => {
            return Err(CatalogError::wrong_configuration(format!(
                "'{}' does not exist",
                name
            )))
        }
        _ => {}
    }

    if let Some(cached) = db.instance_cache().get(&name) {
        if let Some(object) = M::from_live(&cached) {
            return Ok(object);
        }
    }

    let object = if existing.is_some() {
        log::debug!("Opening {} '{}'", requested, name);
        maker.open_existing(&name, &catalog)?
    } else {
        if store.is_read_only() {
            return Err(CatalogError::UnsupportedOperation(format!(
                "cannot create '{}' in a read-only store",
                name
            )));
        }
        log::debug!("Creating {} '{}'", requested, name);
        catalog.set_param(&name, keys::TYPE, requested.tag());
        let object = maker.create_new(&name, &mut catalog)?;
        catalog.save(store.as_ref())?;
        object
    };

    let object = Arc::new(object);
    db.instance_cache()
        .insert(name, M::into_live(Arc::clone(&object)));
    Ok(object)
}

/// Adds `create`, `open`, `create_or_open` and `make` to a maker.
macro_rules! maker_entry_points {
    ($maker:ident) => {
        impl<'a> $maker<'a> {
            /// Creates the collection; fails if the name already exists.
            pub fn create(
                self,
            ) -> $crate::error::Result<std::sync::Arc<<Self as $crate::maker::Maker>::Output>> {
                $crate::maker::make(&self, $crate::maker::CreateMode::CreateOnly)
            }

            /// Opens the collection; fails if the name does not exist.
            pub fn open(
                self,
            ) -> $crate::error::Result<std::sync::Arc<<Self as $crate::maker::Maker>::Output>> {
                $crate::maker::make(&self, $crate::maker::CreateMode::OpenOnly)
            }

            pub fn create_or_open(
                self,
            ) -> $crate::error::Result<std::sync::Arc<<Self as $crate::maker::Maker>::Output>> {
                $crate::maker::make(&self, $crate::maker::CreateMode::CreateOrOpen)
            }

            pub fn make(
                self,
                mode: $crate::maker::CreateMode,
            ) -> $crate::error::Result<std::sync::Arc<<Self as $crate::maker::Maker>::Output>> {
                $crate::maker::make(&self, mode)
            }
        }
    };
}

mod atomic;
mod hash;
mod index_tree;
mod tree;

pub use atomic::{
    AtomicBooleanMaker, AtomicIntegerMaker, AtomicLongMaker, AtomicStringMaker, AtomicVarMaker,
};
pub use hash::{HashMapMaker, HashSetMaker};
pub use index_tree::{IndexTreeListMaker, IndexTreeLongLongMapMaker};
pub use tree::{TreeMapMaker, TreeSetMaker};
