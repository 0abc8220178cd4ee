use std::sync::Arc;

use tessdb_commons::ObjectName;

use super::Maker;
use crate::collections::{AtomicBoolean, AtomicInteger, AtomicLong, AtomicString, AtomicVar};
use crate::db::Db;
use crate::error::Result;
use crate::instance_cache::LiveObject;
use crate::name_catalog::NameCatalog;
use crate::schema::{keys, CollectionType};
use crate::serializers::{Serializer, SerializerId};
use crate::value::Value;

macro_rules! atomic_maker {
    ($maker:ident, $output:ident, $ty:ty, $serializer:ident, $default:expr) => {
        /// Builder for a single-record atomic; `init` sets the value written on create.
        pub struct $maker<'a> {
            db: &'a Db,
            name: String,
            initial: $ty,
        }

        impl<'a> $maker<'a> {
            pub(crate) fn new(db: &'a Db, name: impl Into<String>) -> Self {
                Self {
                    db,
                    name: name.into(),
                    initial: $default,
                }
            }

            pub fn init(mut self, value: impl Into<$ty>) -> Self {
                self.initial = value.into();
                self
            }

            fn serializer(&self) -> Arc<dyn Serializer> {
                self.db.serializers().get(SerializerId::$serializer)
            }
        }

        impl Maker for $maker<'_> {
            type Output = $output;

            const TYPE: CollectionType = CollectionType::$output;

            fn db(&self) -> &Db {
                self.db
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn open_existing(&self, name: &ObjectName, catalog: &NameCatalog) -> Result<$output> {
                let recid = catalog.recid_param(name, keys::RECID)?;
                Ok($output::new(
                    name.clone(),
                    Arc::clone(self.db.store()),
                    recid,
                    self.serializer(),
                ))
            }

            fn create_new(&self, name: &ObjectName, catalog: &mut NameCatalog) -> Result<$output> {
                let serializer = self.serializer();
                let bytes = serializer.encode(&Value::from(self.initial.clone()))?;
                let recid = self.db.store().put(Some(&bytes))?;
                catalog.set_param(name, keys::RECID, recid);
                Ok($output::new(
                    name.clone(),
                    Arc::clone(self.db.store()),
                    recid,
                    serializer,
                ))
            }

            fn into_live(object: Arc<$output>) -> LiveObject {
                LiveObject::$output(object)
            }

            fn from_live(object: &LiveObject) -> Option<Arc<$output>> {
                match object {
                    LiveObject::$output(object) => Some(Arc::clone(object)),
                    _ => None,
                }
            }
        }

        maker_entry_points!($maker);
    };
}

atomic_maker!(AtomicLongMaker, AtomicLong, i64, Long, 0);
atomic_maker!(AtomicIntegerMaker, AtomicInteger, i32, Integer, 0);
atomic_maker!(AtomicBooleanMaker, AtomicBoolean, bool, Boolean, false);
atomic_maker!(AtomicStringMaker, AtomicString, String, String, String::new());

/// Builder for an atomic reference to any value.
pub struct AtomicVarMaker<'a> {
    db: &'a Db,
    name: String,
    serializer: Option<Arc<dyn Serializer>>,
    initial: Value,
}

impl<'a> AtomicVarMaker<'a> {
    pub(crate) fn new(db: &'a Db, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
            serializer: None,
            initial: Value::Null,
        }
    }

    /// Value serializer; the generic serializer when not set.
    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn init(mut self, value: Value) -> Self {
        self.initial = value;
        self
    }
}

impl Maker for AtomicVarMaker<'_> {
    type Output = AtomicVar;

    const TYPE: CollectionType = CollectionType::AtomicVar;

    fn db(&self) -> &Db {
        self.db
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open_existing(&self, name: &ObjectName, catalog: &NameCatalog) -> Result<AtomicVar> {
        let recid = catalog.recid_param(name, keys::RECID)?;
        let stored = catalog.require_param(name, keys::SERIALIZER)?;
        let serializer = self.db.serializers().resolve_for_open(
            &name.param_key(keys::SERIALIZER),
            stored,
            self.serializer.as_ref(),
        )?;
        Ok(AtomicVar::new(
            name.clone(),
            Arc::clone(self.db.store()),
            recid,
            serializer,
        ))
    }

    fn create_new(&self, name: &ObjectName, catalog: &mut NameCatalog) -> Result<AtomicVar> {
        let serializer = self
            .serializer
            .clone()
            .unwrap_or_else(|| self.db.default_serializer());
        let recid = if self.initial.is_null() {
            self.db.store().put(None)?
        } else {
            let bytes = serializer.encode(&self.initial)?;
            self.db.store().put(Some(&bytes))?
        };
        catalog.set_param(name, keys::RECID, recid);
        catalog.set_param(
            name,
            keys::SERIALIZER,
            self.db.serializers().catalog_name(serializer.as_ref()),
        );
        Ok(AtomicVar::new(
            name.clone(),
            Arc::clone(self.db.store()),
            recid,
            serializer,
        ))
    }

    fn into_live(object: Arc<AtomicVar>) -> LiveObject {
        LiveObject::AtomicVar(object)
    }

    fn from_live(object: &LiveObject) -> Option<Arc<AtomicVar>> {
        match object {
            LiveObject::AtomicVar(object) => Some(Arc::clone(object)),
            _ => None,
        }
    }
}

maker_entry_points!(AtomicVarMaker);
