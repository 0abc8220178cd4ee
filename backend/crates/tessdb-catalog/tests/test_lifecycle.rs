//! Commit, rollback, close and the process exit registry.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{open_db, test_db};
use tessdb_catalog::{
    BackgroundExecutor, CatalogError, Db, GenericRecord, LiveObject, PeriodicExecutor,
    ShutdownRegistry, Value,
};
use tessdb_configs::EngineConfig;
use tessdb_store::test_utils::direct_memory_store;

#[test]
fn test_rollback_discards_pending_types_and_names() {
    let db = test_db();
    let var = db.atomic_var("v").create().unwrap();
    db.commit().unwrap();

    var.set(Value::Record(GenericRecord::new("Pending"))).unwrap();
    db.atomic_long("later").create().unwrap();
    assert_eq!(db.type_catalog().pending_len(), 1);

    db.rollback().unwrap();
    assert_eq!(db.type_catalog().len(), 0);
    assert_eq!(db.all_names().unwrap(), vec!["v".to_string()]);
    assert!(db.instance_cache().is_empty());
    assert_eq!(db.atomic_var("v").open().unwrap().get().unwrap(), Value::Null);
}

#[test]
fn test_rollback_unsupported_on_direct_store() {
    let db = open_db(direct_memory_store());
    db.atomic_long("n").create().unwrap();
    assert!(matches!(
        db.rollback(),
        Err(CatalogError::UnsupportedOperation(_))
    ));
    assert!(db.exists("n").unwrap());
}

#[test]
fn test_close_is_idempotent_and_final() {
    let db = test_db();
    let counter = db.atomic_long("n").create().unwrap();
    db.close().unwrap();
    db.close().unwrap();

    assert!(db.is_closed());
    assert!(db.store().is_closed());
    assert!(db.instance_cache().is_empty());
    assert!(matches!(
        db.atomic_long("n").open(),
        Err(CatalogError::IllegalState(_))
    ));
    assert!(matches!(db.get("n"), Err(CatalogError::IllegalState(_))));
    assert!(counter.get().is_err());
}

#[test]
fn test_close_stops_expiration_executor() {
    let db = test_db();
    let executor = PeriodicExecutor::start("expire-cache", Duration::from_millis(5), || {}).unwrap();
    let as_dyn: Arc<dyn BackgroundExecutor> = executor.clone();

    db.hash_map("cache")
        .expire_after_create(Duration::from_secs(1))
        .expire_executor(Arc::clone(&as_dyn))
        .create()
        .unwrap();
    // Reopening with the same executor does not register it twice.
    db.evict("cache");
    db.hash_map("cache")
        .expire_after_create(Duration::from_secs(1))
        .expire_executor(as_dyn)
        .open()
        .unwrap();
    assert_eq!(db.executor_count(), 1);

    db.close().unwrap();
    assert!(executor.is_terminated());
    assert_eq!(db.executor_count(), 0);
}

#[test]
fn test_executor_without_expiration_is_rejected() {
    let db = test_db();
    let executor = PeriodicExecutor::start("idle", Duration::from_millis(5), || {}).unwrap();
    let result = db.hash_set("s").expire_executor(executor.clone()).create();
    assert!(matches!(result, Err(CatalogError::WrongConfiguration(_))));
    assert_eq!(db.executor_count(), 0);

    executor.shutdown().unwrap();
    assert!(executor.await_termination(Duration::from_secs(5)).unwrap());
}

#[test]
fn test_expire_overflow_requires_expiration() {
    let db = test_db();
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = {
        let seen = Arc::clone(&seen);
        Arc::new(move |_: &Value, _: Option<&Value>, _: Option<&Value>, _: bool| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    };

    assert!(matches!(
        db.hash_map("plain").expire_overflow(sink.clone()).create(),
        Err(CatalogError::WrongConfiguration(_))
    ));

    let map = db
        .hash_map("overflowing")
        .expire_store_size(1 << 20)
        .expire_overflow(sink)
        .create()
        .unwrap();
    assert_eq!(map.modification_listeners().len(), 1);
    map.notify(&Value::from(1i64), Some(&Value::from("old")), None, true);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_exit_registry_closes_strong_entries() {
    let registry = Arc::new(ShutdownRegistry::new());
    let db = test_db();
    db.register_exit_hook(&registry, false);
    assert_eq!(registry.len(), 1);

    assert_eq!(registry.run_now(), 1);
    assert!(db.is_closed());
    assert!(registry.is_empty());
}

#[test]
fn test_exit_registry_skips_dropped_weak_entries() {
    let registry = Arc::new(ShutdownRegistry::new());
    let kept = test_db();
    kept.register_exit_hook(&registry, true);
    {
        let dropped = test_db();
        dropped.register_exit_hook(&registry, true);
    }
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.run_now(), 1);
    assert!(kept.is_closed());
}

#[test]
fn test_close_deregisters_from_exit_registry() {
    let registry = Arc::new(ShutdownRegistry::new());
    let db = test_db();
    db.register_exit_hook(&registry, false);
    db.register_exit_hook(&registry, false);
    assert_eq!(registry.len(), 1);

    db.close().unwrap();
    assert!(registry.is_empty());
    assert_eq!(registry.run_now(), 0);
}

#[test]
fn test_close_on_exit_uses_global_registry() {
    let mut config = EngineConfig::default();
    config.shutdown.close_on_exit = true;
    let db = Db::open(tessdb_store::test_utils::memory_store(), &config).unwrap();
    let global = ShutdownRegistry::global();
    assert!(!global.is_empty());

    db.close().unwrap();
    assert!(db.is_closed());
}

#[test]
fn test_references_resolve_within_their_database() {
    let db = test_db();
    let map = db.hash_map("targets").create().unwrap();
    let live = LiveObject::HashMap(Arc::clone(&map));

    let reference = db.reference_to(&live).unwrap();
    assert_eq!(reference.name(), "targets");
    assert_eq!(reference.owner(), db.id());

    let generic = db.default_serializer();
    let bytes = generic.encode(&Value::Reference(reference.clone())).unwrap();
    let decoded = match generic.decode(&bytes).unwrap() {
        Value::Reference(r) => r,
        other => panic!("decoded {:?}", other),
    };
    let resolved = db.resolve_reference(&decoded).unwrap().unwrap();
    assert!(resolved.ptr_eq(&live));

    let other = test_db();
    assert!(matches!(
        other.resolve_reference(&reference),
        Err(CatalogError::Serialization(_))
    ));
    assert!(matches!(
        other.default_serializer().encode(&Value::Reference(reference)),
        Err(CatalogError::Serialization(_))
    ));
}

#[test]
fn test_reference_to_uncached_object_fails() {
    let db = test_db();
    let counter = db.atomic_long("n").create().unwrap();
    db.evict("n");
    assert!(matches!(
        db.reference_to(&LiveObject::AtomicLong(counter)),
        Err(CatalogError::Serialization(_))
    ));
}
