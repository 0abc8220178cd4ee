//! Append-only table of generic-object type descriptors, persisted at record 1.
//!
//! A descriptor's position in the table is its wire identifier. Types seen for
//! the first time are kept in a pending list and only reach the store on
//! [`TypeCatalog::flush`], which the lifecycle manager calls on commit and close.

use bincode::{Decode, Encode};
use parking_lot::Mutex;
use tessdb_commons::RECID_CLASS_INFOS;
use tessdb_store::RecordStore;

use crate::error::{CatalogError, Result};

/// Type name plus ordered field names of one generic record type.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: Vec<String>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

#[derive(Debug, Default)]
struct TypeTableState {
    persisted: Vec<TypeDescriptor>,
    pending: Vec<TypeDescriptor>,
}

impl TypeTableState {
    fn position(&self, name: &str) -> Option<usize> {
        self.persisted
            .iter()
            .chain(self.pending.iter())
            .position(|descriptor| descriptor.name == name)
    }

    fn at(&self, index: usize) -> Option<&TypeDescriptor> {
        if index < self.persisted.len() {
            self.persisted.get(index)
        } else {
            self.pending.get(index - self.persisted.len())
        }
    }
}

#[derive(Debug, Default)]
pub struct TypeCatalog {
    state: Mutex<TypeTableState>,
}

pub(crate) fn encode_table(descriptors: &[TypeDescriptor]) -> Result<Vec<u8>> {
    bincode::encode_to_vec(descriptors, bincode::config::standard())
        .map_err(|e| CatalogError::serialization(format!("type table: {}", e)))
}

pub(crate) fn decode_table(bytes: &[u8]) -> Result<Vec<TypeDescriptor>> {
    let (descriptors, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| CatalogError::serialization(format!("type table: {}", e)))?;
    Ok(descriptors)
}

impl TypeCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads the persisted table from record 1.
    pub fn load(store: &dyn RecordStore) -> Result<Self> {
        let persisted = match store.get(RECID_CLASS_INFOS)? {
            Some(bytes) => decode_table(&bytes)?,
            None => Vec::new(),
        };
        Ok(Self {
            state: Mutex::new(TypeTableState {
                persisted,
                pending: Vec::new(),
            }),
        })
    }

    pub fn persisted_len(&self) -> usize {
        self.state.lock().persisted.len()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.persisted.len() + state.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index and descriptor of a known type, persisted or pending.
    pub fn lookup(&self, name: &str) -> Option<(usize, TypeDescriptor)> {
        let state = self.state.lock();
        let index = state.position(name)?;
        state.at(index).map(|descriptor| (index, descriptor.clone()))
    }

    pub fn descriptor_at(&self, index: usize) -> Option<TypeDescriptor> {
        self.state.lock().at(index).cloned()
    }

    /// Returns the wire index for `descriptor`, appending it to the pending list
    /// when the type has not been seen before.
    pub fn register(&self, descriptor: TypeDescriptor) -> Result<usize> {
        let mut state = self.state.lock();
        if let Some(index) = state.position(&descriptor.name) {
            let known = state.at(index).map(|d| &d.fields);
            if known != Some(&descriptor.fields) {
                return Err(CatalogError::serialization(format!(
                    "type '{}' was registered with fields {:?}, found {:?}",
                    descriptor.name,
                    known.cloned().unwrap_or_default(),
                    descriptor.fields
                )));
            }
            return Ok(index);
        }

        let index = state.persisted.len() + state.pending.len();
        log::debug!(
            "Registering type descriptor '{}' at index {}",
            descriptor.name,
            index
        );
        state.pending.push(descriptor);
        Ok(index)
    }

    /// Full table in wire order.
    pub fn descriptors(&self) -> Vec<TypeDescriptor> {
        let state = self.state.lock();
        state
            .persisted
            .iter()
            .chain(state.pending.iter())
            .cloned()
            .collect()
    }

    /// Appends pending descriptors to record 1. Returns how many were written.
    pub fn flush(&self, store: &dyn RecordStore) -> Result<usize> {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            return Ok(0);
        }

        let mut table = state.persisted.clone();
        table.extend(state.pending.iter().cloned());
        store.update(RECID_CLASS_INFOS, Some(&encode_table(&table)?))?;

        let written = state.pending.len();
        state.persisted = table;
        state.pending.clear();
        log::debug!("Flushed {} type descriptor(s)", written);
        Ok(written)
    }

    /// Drops descriptors that were never flushed.
    pub fn discard_pending(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessdb_store::test_utils::memory_store;

    fn point() -> TypeDescriptor {
        TypeDescriptor::new("Point", vec!["x".to_string(), "y".to_string()])
    }

    #[test]
    fn test_register_is_idempotent() {
        let types = TypeCatalog::empty();
        assert_eq!(types.register(point()).unwrap(), 0);
        assert_eq!(types.register(point()).unwrap(), 0);
        assert_eq!(types.pending_len(), 1);
    }

    #[test]
    fn test_register_rejects_changed_fields() {
        let types = TypeCatalog::empty();
        types.register(point()).unwrap();
        let err = types
            .register(TypeDescriptor::new("Point", vec!["x".to_string()]))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Serialization(_)));
    }

    #[test]
    fn test_flush_appends_to_record() {
        let store = memory_store();
        store.put(None).unwrap();
        store.put(Some(&encode_table(&[]).unwrap())).unwrap();

        let types = TypeCatalog::load(store.as_ref()).unwrap();
        types.register(point()).unwrap();
        assert_eq!(types.flush(store.as_ref()).unwrap(), 1);
        assert_eq!(types.flush(store.as_ref()).unwrap(), 0);

        let reloaded = TypeCatalog::load(store.as_ref()).unwrap();
        assert_eq!(reloaded.persisted_len(), 1);
        assert_eq!(reloaded.lookup("Point"), Some((0, point())));
    }

    #[test]
    fn test_discard_pending() {
        let types = TypeCatalog::empty();
        types.register(point()).unwrap();
        assert_eq!(types.discard_pending(), 1);
        assert!(types.is_empty());
        assert!(types.descriptor_at(0).is_none());
    }
}
