//! End-to-end runs of the `tessdb` subcommands against a snapshot file.

use tempfile::TempDir;
use tessdb_catalog::{Bootstrap, Db, NameCatalog};
use tessdb_configs::{EngineConfig, StorageBackendKind};
use tessdb_server::commands::{self, ShowFormat};
use tessdb_server::lifecycle::{open_database, open_store};

fn file_config(dir: &TempDir) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.storage.backend = StorageBackendKind::File;
    config.storage.path = dir.path().join("catalog.db").display().to_string();
    config
}

fn read_only(config: &EngineConfig) -> EngineConfig {
    let mut config = config.clone();
    config.storage.read_only = true;
    config
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

/// Initializes the store and creates a couple of collections.
fn populate(config: &EngineConfig) {
    let db = open_database(config).unwrap();
    db.hash_map("orders").concurrency(2).counter_enable().create().unwrap();
    db.atomic_long("order_seq").init(100i64).create().unwrap();
    db.commit().unwrap();
    db.close().unwrap();
}

#[test]
fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);

    let mut out = Vec::new();
    assert_eq!(commands::init(&config, &mut out).unwrap(), Bootstrap::Initialized);
    assert!(output(out).starts_with("initialized"));

    let mut out = Vec::new();
    assert_eq!(commands::init(&config, &mut out).unwrap(), Bootstrap::Existing);
    assert!(output(out).contains("already initialized"));

    let store = open_store(&read_only(&config).storage).unwrap();
    let catalog = NameCatalog::load(store.as_ref()).unwrap();
    assert_eq!(catalog.get("formatVersion"), Some("1"));
}

#[test]
fn test_names_and_show() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);
    populate(&config);

    let db = open_database(&read_only(&config)).unwrap();
    let mut out = Vec::new();
    assert_eq!(commands::names(&db, &mut out).unwrap(), 2);
    assert_eq!(output(out), "order_seq\tAtomicLong\norders\tHashMap\n");

    let mut out = Vec::new();
    commands::show(&db, "orders", ShowFormat::Text, &mut out).unwrap();
    let text = output(out);
    assert!(text.contains("orders#concShift = 1"));
    assert!(text.contains("orders#type = HashMap"));

    let mut out = Vec::new();
    commands::show(&db, "order_seq", ShowFormat::Json, &mut out).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(doc["name"], "order_seq");
    assert_eq!(doc["params"]["type"], "AtomicLong");

    assert!(commands::show(&db, "missing", ShowFormat::Text, &mut Vec::new()).is_err());
    db.close().unwrap();
}

#[test]
fn test_verify_reports_problems() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);
    populate(&config);

    {
        let db = open_database(&read_only(&config)).unwrap();
        let mut out = Vec::new();
        assert!(commands::verify(&db, &mut out).unwrap().is_empty());
        assert_eq!(output(out), "catalog ok (2 names)\n");
        db.close().unwrap();
    }

    {
        let store = open_store(&config.storage).unwrap();
        let mut catalog = NameCatalog::load(store.as_ref()).unwrap();
        catalog.insert("orders#bogus", "1");
        catalog.save(store.as_ref()).unwrap();
        store.commit().unwrap();
        store.close().unwrap();
    }

    let mut lenient = read_only(&config);
    lenient.catalog.verify_on_open = false;
    let db: std::sync::Arc<Db> = open_database(&lenient).unwrap();
    let mut out = Vec::new();
    let problems = commands::verify(&db, &mut out).unwrap();
    assert_eq!(problems.len(), 1);
    assert!(output(out).contains("orders#bogus"));

    assert!(open_database(&read_only(&config)).is_err());
}

#[test]
fn test_memory_backend() {
    let mut config = EngineConfig::default();
    config.storage.backend = StorageBackendKind::Memory;
    let db = open_database(&config).unwrap();
    assert!(db.all_names().unwrap().is_empty());
    assert!(db.store().supports_rollback());
}
