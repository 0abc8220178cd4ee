//! # tessdb-catalog
//!
//! Named-object catalog and collection factory on top of a [`RecordStore`].
//!
//! ```text
//! Db ── makers (create / open / create_or_open)
//!  │        ↓
//!  ├── NameCatalog (record 0)      TypeCatalog (record 1)
//!  ├── InstanceCache               SerializerRegistry
//!  └── RecordStore (tessdb-store)
//! ```
//!
//! [`RecordStore`]: tessdb_store::RecordStore

pub mod bootstrap;
pub mod collections;
pub mod db;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod generic;
pub mod instance_cache;
pub mod maker;
pub mod name_catalog;
pub mod schema;
pub mod serializers;
pub mod shutdown;
pub mod type_catalog;
pub mod validator;
pub mod value;

pub use bootstrap::{initialize_store, Bootstrap};
pub use collections::{
    AtomicBoolean, AtomicInteger, AtomicLong, AtomicString, AtomicVar, HashTreeMap, HashTreeSet,
    IndexTreeList, IndexTreeLongLongMap, ModificationListener, OrderedMap, OrderedSet,
};
pub use db::Db;
pub use error::{CatalogError, Result};
pub use executor::{BackgroundExecutor, PeriodicExecutor};
pub use generic::GenericSerializer;
pub use instance_cache::{InstanceCache, LiveObject};
pub use maker::CreateMode;
pub use name_catalog::NameCatalog;
pub use schema::CollectionType;
pub use serializers::{BuiltinSerializer, Serializer, SerializerId, SerializerRegistry};
pub use shutdown::{HookId, ShutdownRegistry};
pub use type_catalog::{TypeCatalog, TypeDescriptor};
pub use validator::validate;
pub use value::{CollectionRef, DbId, GenericRecord, Value};
