//! Default serializer for arbitrary [`Value`]s.
//!
//! Values are converted to a [`Wire`] tree and encoded with bincode. Records are
//! written as the index of their type descriptor followed by the field values in
//! descriptor order, so field names never reach the wire.

use std::sync::Arc;

use bincode::{Decode, Encode};
use tessdb_commons::RecordId;

use crate::error::{CatalogError, Result};
use crate::serializers::{Serializer, SerializerId};
use crate::type_catalog::{TypeCatalog, TypeDescriptor};
use crate::value::{CollectionRef, DbId, GenericRecord, Value};

/// On-disk shape of a generic value.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
enum Wire {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    LongArray(Vec<i64>),
    Recid(u64),
    List(Vec<Wire>),
    Record { type_index: u64, fields: Vec<Wire> },
    Reference(String),
}

#[derive(Debug)]
pub struct GenericSerializer {
    owner: DbId,
    types: Arc<TypeCatalog>,
}

impl GenericSerializer {
    pub fn new(owner: DbId, types: Arc<TypeCatalog>) -> Self {
        Self { owner, types }
    }

    pub fn owner(&self) -> DbId {
        self.owner
    }

    pub fn type_catalog(&self) -> &Arc<TypeCatalog> {
        &self.types
    }

    /// Converts `value` for the wire, registering record types as they appear.
    fn wire_from_value(&self, value: &Value) -> Result<Wire> {
        let wire = match value {
            Value::Null => Wire::Null,
            Value::Bool(v) => Wire::Bool(*v),
            Value::Int(v) => Wire::Int(*v),
            Value::Long(v) => Wire::Long(*v),
            Value::Double(v) => Wire::Double(*v),
            Value::String(v) => Wire::String(v.clone()),
            Value::Bytes(v) => Wire::Bytes(v.clone()),
            Value::LongArray(v) => Wire::LongArray(v.clone()),
            Value::Recid(v) => Wire::Recid(v.as_u64()),
            Value::List(items) => Wire::List(
                items
                    .iter()
                    .map(|item| self.wire_from_value(item))
                    .collect::<Result<_>>()?,
            ),
            Value::Record(record) => {
                let index = self.types.register(TypeDescriptor::new(
                    record.type_name.clone(),
                    record.field_names(),
                ))?;
                Wire::Record {
                    type_index: index as u64,
                    fields: record
                        .fields
                        .iter()
                        .map(|(_, field)| self.wire_from_value(field))
                        .collect::<Result<_>>()?,
                }
            }
            Value::Reference(reference) => {
                if reference.owner() != self.owner {
                    return Err(CatalogError::serialization(format!(
                        "collection '{}' belongs to another database",
                        reference.name()
                    )));
                }
                Wire::Reference(reference.name().to_string())
            }
        };
        Ok(wire)
    }

    fn value_from_wire(&self, wire: Wire) -> Result<Value> {
        let value = match wire {
            Wire::Null => Value::Null,
            Wire::Bool(v) => Value::Bool(v),
            Wire::Int(v) => Value::Int(v),
            Wire::Long(v) => Value::Long(v),
            Wire::Double(v) => Value::Double(v),
            Wire::String(v) => Value::String(v),
            Wire::Bytes(v) => Value::Bytes(v),
            Wire::LongArray(v) => Value::LongArray(v),
            Wire::Recid(v) => Value::Recid(RecordId::new(v)),
            Wire::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.value_from_wire(item))
                    .collect::<Result<_>>()?,
            ),
            Wire::Record { type_index, fields } => {
                let descriptor = usize::try_from(type_index)
                    .ok()
                    .and_then(|index| self.types.descriptor_at(index))
                    .ok_or_else(|| {
                        CatalogError::serialization(format!("unknown type index {}", type_index))
                    })?;
                if descriptor.fields.len() != fields.len() {
                    return Err(CatalogError::serialization(format!(
                        "type '{}' has {} field(s), record carries {}",
                        descriptor.name,
                        descriptor.fields.len(),
                        fields.len()
                    )));
                }
                let mut record = GenericRecord::new(descriptor.name);
                for (name, field) in descriptor.fields.into_iter().zip(fields) {
                    record.fields.push((name, self.value_from_wire(field)?));
                }
                Value::Record(record)
            }
            Wire::Reference(name) => Value::Reference(CollectionRef::new(self.owner, name)),
        };
        Ok(value)
    }
}

impl Serializer for GenericSerializer {
    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let wire = self.wire_from_value(value)?;
        bincode::encode_to_vec(&wire, bincode::config::standard())
            .map_err(|e| CatalogError::serialization(format!("encode generic value: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let (wire, read): (Wire, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard()).map_err(|e| {
                CatalogError::serialization(format!("decode generic value: {}", e))
            })?;
        if read != bytes.len() {
            return Err(CatalogError::serialization(format!(
                "{} trailing byte(s) after value",
                bytes.len() - read
            )));
        }
        self.value_from_wire(wire)
    }

    fn singleton_id(&self) -> Option<SerializerId> {
        Some(SerializerId::Generic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serializer() -> GenericSerializer {
        GenericSerializer::new(DbId::next(), Arc::new(TypeCatalog::empty()))
    }

    fn point(x: i32, y: i32) -> Value {
        Value::Record(
            GenericRecord::new("Point")
                .with_field("x", Value::Int(x))
                .with_field("y", Value::Int(y)),
        )
    }

    #[test]
    fn test_nested_value() {
        let generic = serializer();
        let value = Value::List(vec![
            Value::Null,
            Value::from("hello"),
            Value::Long(i64::MIN),
            Value::LongArray(vec![7, -7]),
            Value::Recid(RecordId::new(300)),
            point(1, 2),
        ]);
        let bytes = generic.encode(&value).unwrap();
        assert_eq!(generic.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_records_register_types_once() {
        let generic = serializer();
        generic.encode(&point(1, 2)).unwrap();
        generic.encode(&point(3, 4)).unwrap();
        assert_eq!(generic.type_catalog().pending_len(), 1);
    }

    fn wire_bytes(wire: &Wire) -> Vec<u8> {
        bincode::encode_to_vec(wire, bincode::config::standard()).unwrap()
    }

    #[test]
    fn test_unknown_type_index_fails() {
        let generic = serializer();
        let bytes = wire_bytes(&Wire::Record {
            type_index: 5,
            fields: Vec::new(),
        });
        let err = generic.decode(&bytes).unwrap_err();
        assert!(matches!(err, CatalogError::Serialization(_)));
    }

    #[test]
    fn test_field_count_must_match_descriptor() {
        let generic = serializer();
        generic.encode(&point(1, 2)).unwrap();
        let bytes = wire_bytes(&Wire::Record {
            type_index: 0,
            fields: vec![Wire::Int(1)],
        });
        let err = generic.decode(&bytes).unwrap_err();
        assert!(matches!(err, CatalogError::Serialization(_)));
    }

    #[test]
    fn test_foreign_reference_fails() {
        let generic = serializer();
        let foreign = CollectionRef::new(DbId::next(), "orders");
        let err = generic.encode(&Value::Reference(foreign)).unwrap_err();
        assert!(matches!(err, CatalogError::Serialization(_)));

        let own = Value::Reference(CollectionRef::new(generic.owner(), "orders"));
        let bytes = generic.encode(&own).unwrap();
        assert_eq!(generic.decode(&bytes).unwrap(), own);
    }

    #[test]
    fn test_trailing_and_truncated_bytes_rejected() {
        let generic = serializer();
        let mut bytes = generic.encode(&Value::Null).unwrap();
        bytes.push(0);
        assert!(generic.decode(&bytes).is_err());

        let bytes = generic.encode(&Value::from("hello")).unwrap();
        assert!(generic.decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(generic.decode(&[]).is_err());
    }

    #[test]
    fn test_large_record_ids() {
        let generic = serializer();
        for n in [0u64, 250, 251, u64::MAX] {
            let value = Value::Recid(RecordId::new(n));
            let bytes = generic.encode(&value).unwrap();
            assert_eq!(generic.decode(&bytes).unwrap(), value);
        }
    }
}
