//! Shared helpers for tessdb-catalog integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tessdb_catalog::{CatalogError, Db, NameCatalog, Serializer, Value};
use tessdb_configs::EngineConfig;
use tessdb_store::test_utils::memory_store;
use tessdb_store::RecordStore;

/// Fresh database over a transactional heap store.
pub fn test_db() -> Arc<Db> {
    Db::open(memory_store(), &EngineConfig::default()).expect("open test db")
}

pub fn open_db(store: Arc<dyn RecordStore>) -> Arc<Db> {
    Db::open(store, &EngineConfig::default()).expect("open db")
}

/// Applies `edit` to the name catalog stored in `store`.
pub fn edit_catalog(store: &dyn RecordStore, edit: impl FnOnce(&mut NameCatalog)) {
    let mut catalog = NameCatalog::load(store).expect("load catalog");
    edit(&mut catalog);
    catalog.save(store).expect("save catalog");
}

pub fn is_wrong_configuration<T: std::fmt::Debug>(result: Result<T, CatalogError>) -> bool {
    matches!(result, Err(CatalogError::WrongConfiguration(_)))
}

/// Serializer the registry does not know; stores strings upper-cased.
#[derive(Debug)]
pub struct UpperCaseSerializer;

impl Serializer for UpperCaseSerializer {
    fn encode(&self, value: &Value) -> tessdb_catalog::Result<Vec<u8>> {
        match value {
            Value::String(s) => Ok(s.to_uppercase().into_bytes()),
            other => Err(CatalogError::Serialization(format!(
                "cannot encode {}",
                other.kind()
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> tessdb_catalog::Result<Value> {
        String::from_utf8(bytes.to_vec())
            .map(Value::String)
            .map_err(|e| CatalogError::Serialization(e.to_string()))
    }
}
