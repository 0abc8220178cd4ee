//! The database handle: lifecycle manager and entry point for named collections.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tessdb_commons::ObjectName;
use tessdb_configs::EngineConfig;
use tessdb_store::{MemoryRecordStore, RecordStore};

use crate::bootstrap::{initialize_store, Bootstrap};
use crate::error::{CatalogError, Result};
use crate::executor::BackgroundExecutor;
use crate::generic::GenericSerializer;
use crate::instance_cache::{InstanceCache, LiveObject};
use crate::maker::{
    AtomicBooleanMaker, AtomicIntegerMaker, AtomicLongMaker, AtomicStringMaker, AtomicVarMaker,
    HashMapMaker, HashSetMaker, IndexTreeListMaker, IndexTreeLongLongMapMaker, TreeMapMaker,
    TreeSetMaker,
};
use crate::name_catalog::NameCatalog;
use crate::schema::CollectionType;
use crate::serializers::{Serializer, SerializerRegistry};
use crate::shutdown::{HookId, ShutdownRegistry};
use crate::type_catalog::TypeCatalog;
use crate::validator::validate;
use crate::value::{CollectionRef, DbId};

pub struct Db {
    id: DbId,
    store: Arc<dyn RecordStore>,
    /// `None` in single-threaded mode.
    lock: Option<RwLock<()>>,
    closed: AtomicBool,
    types: Arc<TypeCatalog>,
    serializers: SerializerRegistry,
    cache: InstanceCache,
    executors: Mutex<Vec<Arc<dyn BackgroundExecutor>>>,
    executor_await_timeout: Duration,
    exit_hook: Mutex<Option<(Arc<ShutdownRegistry>, HookId)>>,
}

impl Db {
    /// Opens a database over `store`, initializing the reserved records of an
    /// empty store.
    pub fn open(store: Arc<dyn RecordStore>, config: &EngineConfig) -> Result<Arc<Db>> {
        let bootstrap = initialize_store(store.as_ref())?;
        if bootstrap == Bootstrap::Existing && config.catalog.verify_on_open {
            let problems = validate(&NameCatalog::load(store.as_ref())?);
            if !problems.is_empty() {
                return Err(CatalogError::NewFormatUnsupported(problems.join("\n")));
            }
        }

        let types = Arc::new(TypeCatalog::load(store.as_ref())?);
        let id = DbId::next();
        let generic = Arc::new(GenericSerializer::new(id, Arc::clone(&types)));

        let db = Arc::new(Db {
            id,
            store,
            lock: config.catalog.thread_safe.then(|| RwLock::new(())),
            closed: AtomicBool::new(false),
            types,
            serializers: SerializerRegistry::new(generic),
            cache: InstanceCache::new(),
            executors: Mutex::new(Vec::new()),
            executor_await_timeout: Duration::from_millis(
                config.shutdown.executor_await_timeout_ms,
            ),
            exit_hook: Mutex::new(None),
        });

        if config.shutdown.close_on_exit {
            db.register_exit_hook(&ShutdownRegistry::global(), config.shutdown.weak_reference);
        }

        log::info!(
            "Opened database {} ({} type descriptors, read_only={}, thread_safe={})",
            id.as_u64(),
            db.types.persisted_len(),
            db.store.is_read_only(),
            config.catalog.thread_safe
        );
        Ok(db)
    }

    /// Opens a fresh in-memory database with default settings.
    pub fn memory() -> Result<Arc<Db>> {
        Self::open(Arc::new(MemoryRecordStore::new()), &EngineConfig::default())
    }

    pub fn id(&self) -> DbId {
        self.id
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// The generic serializer, used wherever no serializer is supplied.
    pub fn default_serializer(&self) -> Arc<dyn Serializer> {
        self.serializers.generic()
    }

    pub fn type_catalog(&self) -> &Arc<TypeCatalog> {
        &self.types
    }

    pub fn instance_cache(&self) -> &InstanceCache {
        &self.cache
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_read_only(&self) -> bool {
        self.store.is_read_only()
    }

    pub(crate) fn read_lock(&self) -> Option<RwLockReadGuard<'_, ()>> {
        self.lock.as_ref().map(|lock| lock.read())
    }

    pub(crate) fn write_lock(&self) -> Option<RwLockWriteGuard<'_, ()>> {
        self.lock.as_ref().map(|lock| lock.write())
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CatalogError::IllegalState("database is closed".to_string()));
        }
        Ok(())
    }

    /// Hands an executor to the database; it is shut down on close.
    pub fn register_executor(&self, executor: Arc<dyn BackgroundExecutor>) {
        let mut executors = self.executors.lock();
        if !executors.iter().any(|known| Arc::ptr_eq(known, &executor)) {
            executors.push(executor);
        }
    }

    pub fn executor_count(&self) -> usize {
        self.executors.lock().len()
    }

    /// Registers this database with `registry`, replacing an earlier registration.
    pub fn register_exit_hook(self: &Arc<Self>, registry: &Arc<ShutdownRegistry>, weak: bool) {
        let id = registry.register(self, weak);
        if let Some((previous, previous_id)) =
            self.exit_hook.lock().replace((Arc::clone(registry), id))
        {
            previous.deregister(previous_id);
        }
    }

    // --- catalog inspection -------------------------------------------------

    /// Snapshot of the name catalog.
    pub fn name_catalog(&self) -> Result<NameCatalog> {
        let _guard = self.read_lock();
        self.ensure_open()?;
        NameCatalog::load(self.store.as_ref())
    }

    pub fn all_names(&self) -> Result<Vec<String>> {
        Ok(self.name_catalog()?.all_names().into_iter().collect())
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.name_catalog()?.get_type(name).is_some())
    }

    /// Raw type tag of `name`.
    pub fn get_type(&self, name: &str) -> Result<Option<String>> {
        Ok(self.name_catalog()?.get_type(name).map(str::to_string))
    }

    /// Every parameter of `name`, keyed by parameter.
    pub fn params_for(&self, name: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.name_catalog()?.params_for(name))
    }

    /// Problems the validator finds in the current catalog.
    pub fn verify_catalog(&self) -> Result<Vec<String>> {
        Ok(validate(&self.name_catalog()?))
    }

    // --- named collections --------------------------------------------------

    /// Opens any existing name with its type's default maker.
    pub fn get(&self, name: &str) -> Result<Option<LiveObject>> {
        let Some(tag) = self.get_type(name)? else {
            return Ok(None);
        };
        let ty = CollectionType::from_tag(&tag).ok_or_else(|| {
            CatalogError::NewFormatUnsupported(format!("'{}' has unknown type '{}'", name, tag))
        })?;
        let object = match ty {
            CollectionType::HashMap => LiveObject::HashMap(self.hash_map(name).open()?),
            CollectionType::HashSet => LiveObject::HashSet(self.hash_set(name).open()?),
            CollectionType::TreeMap => LiveObject::TreeMap(self.tree_map(name).open()?),
            CollectionType::TreeSet => LiveObject::TreeSet(self.tree_set(name).open()?),
            CollectionType::AtomicBoolean => {
                LiveObject::AtomicBoolean(self.atomic_boolean(name).open()?)
            }
            CollectionType::AtomicInteger => {
                LiveObject::AtomicInteger(self.atomic_integer(name).open()?)
            }
            CollectionType::AtomicLong => LiveObject::AtomicLong(self.atomic_long(name).open()?),
            CollectionType::AtomicString => {
                LiveObject::AtomicString(self.atomic_string(name).open()?)
            }
            CollectionType::AtomicVar => LiveObject::AtomicVar(self.atomic_var(name).open()?),
            CollectionType::IndexTreeList => {
                LiveObject::IndexTreeList(self.index_tree_list(name).open()?)
            }
            CollectionType::IndexTreeLongLongMap => {
                LiveObject::IndexTreeLongLongMap(self.index_tree_long_long_map(name).open()?)
            }
        };
        Ok(Some(object))
    }

    pub fn hash_map(&self, name: &str) -> HashMapMaker<'_> {
        HashMapMaker::new(self, name)
    }

    pub fn hash_set(&self, name: &str) -> HashSetMaker<'_> {
        HashSetMaker::new(self, name)
    }

    pub fn tree_map(&self, name: &str) -> TreeMapMaker<'_> {
        TreeMapMaker::new(self, name)
    }

    pub fn tree_set(&self, name: &str) -> TreeSetMaker<'_> {
        TreeSetMaker::new(self, name)
    }

    pub fn atomic_long(&self, name: &str) -> AtomicLongMaker<'_> {
        AtomicLongMaker::new(self, name)
    }

    pub fn atomic_integer(&self, name: &str) -> AtomicIntegerMaker<'_> {
        AtomicIntegerMaker::new(self, name)
    }

    pub fn atomic_boolean(&self, name: &str) -> AtomicBooleanMaker<'_> {
        AtomicBooleanMaker::new(self, name)
    }

    pub fn atomic_string(&self, name: &str) -> AtomicStringMaker<'_> {
        AtomicStringMaker::new(self, name)
    }

    pub fn atomic_var(&self, name: &str) -> AtomicVarMaker<'_> {
        AtomicVarMaker::new(self, name)
    }

    pub fn index_tree_list(&self, name: &str) -> IndexTreeListMaker<'_> {
        IndexTreeListMaker::new(self, name)
    }

    pub fn index_tree_long_long_map(&self, name: &str) -> IndexTreeLongLongMapMaker<'_> {
        IndexTreeLongLongMapMaker::new(self, name)
    }

    /// Drops the cached instance of `name`; the next lookup rebuilds it.
    pub fn evict(&self, name: &str) -> bool {
        match ObjectName::try_new(name) {
            Ok(name) => self.cache.evict(&name),
            Err(_) => false,
        }
    }

    /// Reference to `object` that the generic serializer can store.
    pub fn reference_to(&self, object: &LiveObject) -> Result<CollectionRef> {
        let name = self.cache.name_of(object).ok_or_else(|| {
            CatalogError::serialization(format!(
                "'{}' is not a live collection of this database",
                object.name()
            ))
        })?;
        Ok(CollectionRef::new(self.id, name.into_string()))
    }

    /// Turns a decoded reference back into its live collection.
    pub fn resolve_reference(&self, reference: &CollectionRef) -> Result<Option<LiveObject>> {
        if reference.owner() != self.id {
            return Err(CatalogError::serialization(format!(
                "reference to '{}' belongs to another database",
                reference.name()
            )));
        }
        self.get(reference.name())
    }

    // --- lifecycle ----------------------------------------------------------

    /// Flushes pending type descriptors and commits the store.
    pub fn commit(&self) -> Result<()> {
        let _guard = self.write_lock();
        self.ensure_open()?;
        self.types.flush(self.store.as_ref())?;
        self.store.commit()?;
        Ok(())
    }

    /// Discards uncommitted changes, pending type descriptors and cached instances.
    pub fn rollback(&self) -> Result<()> {
        let _guard = self.write_lock();
        self.ensure_open()?;
        if !self.store.supports_rollback() {
            return Err(CatalogError::UnsupportedOperation(
                "the record store does not support rollback".to_string(),
            ));
        }
        let dropped = self.types.discard_pending();
        self.store.rollback()?;
        self.cache.clear();
        log::debug!(
            "Rolled back database {} ({} pending type descriptors dropped)",
            self.id.as_u64(),
            dropped
        );
        Ok(())
    }

    /// Closes the database. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        let _guard = self.write_lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some((registry, id)) = self.exit_hook.lock().take() {
            registry.deregister(id);
        }

        let flushed = if self.store.is_read_only() {
            Ok(0)
        } else {
            self.types.flush(self.store.as_ref())
        };

        let executors = std::mem::take(&mut *self.executors.lock());
        for executor in executors {
            if let Err(e) = executor.shutdown() {
                log::warn!("Executor '{}' failed to shut down: {}", executor.name(), e);
                continue;
            }
            match executor.await_termination(self.executor_await_timeout) {
                Ok(true) => {}
                Ok(false) => log::warn!(
                    "Executor '{}' did not terminate within {:?}",
                    executor.name(),
                    self.executor_await_timeout
                ),
                Err(e) => log::warn!("Executor '{}' failed to terminate: {}", executor.name(), e),
            }
        }

        self.cache.clear();
        let closed = self.store.close();
        flushed?;
        closed?;
        log::info!("Closed database {}", self.id.as_u64());
        Ok(())
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("thread_safe", &self.lock.is_some())
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessdb_store::test_utils::{direct_memory_store, memory_store};

    #[test]
    fn test_memory_db_starts_empty() {
        let db = Db::memory().unwrap();
        assert!(db.all_names().unwrap().is_empty());
        assert!(db.get("missing").unwrap().is_none());
        assert!(db.verify_catalog().unwrap().is_empty());
    }

    #[test]
    fn test_operations_after_close_fail() {
        let db = Db::memory().unwrap();
        db.close().unwrap();
        db.close().unwrap();

        assert!(matches!(db.commit(), Err(CatalogError::IllegalState(_))));
        assert!(matches!(db.all_names(), Err(CatalogError::IllegalState(_))));
        assert!(matches!(
            db.atomic_long("a").create(),
            Err(CatalogError::IllegalState(_))
        ));
    }

    #[test]
    fn test_rollback_requires_support() {
        let db = Db::open(direct_memory_store(), &EngineConfig::default()).unwrap();
        assert!(matches!(
            db.rollback(),
            Err(CatalogError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_rollback_clears_cache_and_catalog() {
        let db = Db::open(memory_store(), &EngineConfig::default()).unwrap();
        db.atomic_long("kept").create().unwrap();
        db.commit().unwrap();

        db.atomic_long("dropped").create().unwrap();
        assert_eq!(db.instance_cache().len(), 2);
        db.rollback().unwrap();

        assert!(db.instance_cache().is_empty());
        assert_eq!(db.all_names().unwrap(), vec!["kept".to_string()]);
    }

    #[test]
    fn test_single_threaded_mode() {
        let mut config = EngineConfig::default();
        config.catalog.thread_safe = false;
        let db = Db::open(memory_store(), &config).unwrap();
        let counter = db.atomic_long("n").create().unwrap();
        counter.increment_and_get().unwrap();
        db.commit().unwrap();
        assert!(format!("{:?}", db).contains("thread_safe: false"));
    }
}
