//! Built-in serializers and the singleton registry.
//!
//! Serializers are stateless codecs between [`Value`] and bytes. The built-in ones
//! carry a [`SerializerId`] so the catalog can refer to them by a stable name; custom
//! serializers carry none and are recorded as [`CUSTOM_SERIALIZER`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tessdb_commons::RecordId;

use crate::error::{CatalogError, Result};
use crate::generic::GenericSerializer;
use crate::value::Value;

/// Catalog marker for a serializer that is not a registered singleton.
pub const CUSTOM_SERIALIZER: &str = "custom";

/// Stable identifiers of the singleton serializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializerId {
    Boolean,
    Integer,
    Long,
    Double,
    String,
    ByteArray,
    LongArray,
    RecordId,
    Nothing,
    Generic,
}

impl SerializerId {
    pub const ALL: [SerializerId; 10] = [
        SerializerId::Boolean,
        SerializerId::Integer,
        SerializerId::Long,
        SerializerId::Double,
        SerializerId::String,
        SerializerId::ByteArray,
        SerializerId::LongArray,
        SerializerId::RecordId,
        SerializerId::Nothing,
        SerializerId::Generic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SerializerId::Boolean => "Boolean",
            SerializerId::Integer => "Integer",
            SerializerId::Long => "Long",
            SerializerId::Double => "Double",
            SerializerId::String => "String",
            SerializerId::ByteArray => "ByteArray",
            SerializerId::LongArray => "LongArray",
            SerializerId::RecordId => "RecordId",
            SerializerId::Nothing => "Nothing",
            SerializerId::Generic => "Generic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.name() == name)
    }
}

impl fmt::Display for SerializerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Codec between values and record bytes.
pub trait Serializer: Send + Sync + fmt::Debug {
    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Value>;

    /// Singleton identity, `None` for custom serializers.
    fn singleton_id(&self) -> Option<SerializerId> {
        None
    }
}

/// Fixed-width and raw codecs for the scalar built-ins.
#[derive(Debug)]
pub struct BuiltinSerializer {
    id: SerializerId,
}

impl BuiltinSerializer {
    fn new(id: SerializerId) -> Self {
        Self { id }
    }

    pub fn boolean() -> Self {
        Self::new(SerializerId::Boolean)
    }

    pub fn integer() -> Self {
        Self::new(SerializerId::Integer)
    }

    pub fn long() -> Self {
        Self::new(SerializerId::Long)
    }

    pub fn double() -> Self {
        Self::new(SerializerId::Double)
    }

    pub fn string() -> Self {
        Self::new(SerializerId::String)
    }

    pub fn byte_array() -> Self {
        Self::new(SerializerId::ByteArray)
    }

    pub fn long_array() -> Self {
        Self::new(SerializerId::LongArray)
    }

    pub fn record_id() -> Self {
        Self::new(SerializerId::RecordId)
    }

    pub fn nothing() -> Self {
        Self::new(SerializerId::Nothing)
    }

    fn mismatch(&self, value: &Value) -> CatalogError {
        CatalogError::serialization(format!(
            "{} serializer cannot encode a {} value",
            self.id,
            value.kind()
        ))
    }

    fn fixed<const N: usize>(&self, bytes: &[u8]) -> Result<[u8; N]> {
        bytes.try_into().map_err(|_| {
            CatalogError::serialization(format!(
                "{} serializer expected {} bytes, found {}",
                self.id,
                N,
                bytes.len()
            ))
        })
    }
}

impl Serializer for BuiltinSerializer {
    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match (self.id, value) {
            (SerializerId::Boolean, Value::Bool(v)) => Ok(vec![u8::from(*v)]),
            (SerializerId::Integer, Value::Int(v)) => Ok(v.to_be_bytes().to_vec()),
            (SerializerId::Long, Value::Long(v)) => Ok(v.to_be_bytes().to_vec()),
            (SerializerId::Double, Value::Double(v)) => Ok(v.to_bits().to_be_bytes().to_vec()),
            (SerializerId::String, Value::String(v)) => Ok(v.as_bytes().to_vec()),
            (SerializerId::ByteArray, Value::Bytes(v)) => Ok(v.clone()),
            (SerializerId::LongArray, Value::LongArray(v)) => {
                Ok(v.iter().flat_map(|n| n.to_be_bytes()).collect())
            }
            (SerializerId::RecordId, Value::Recid(v)) => Ok(v.as_u64().to_be_bytes().to_vec()),
            (SerializerId::Nothing, Value::Null) => Ok(Vec::new()),
            _ => Err(self.mismatch(value)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        match self.id {
            SerializerId::Boolean => match self.fixed::<1>(bytes)?[0] {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(CatalogError::serialization(format!(
                    "invalid boolean byte {}",
                    other
                ))),
            },
            SerializerId::Integer => Ok(Value::Int(i32::from_be_bytes(self.fixed(bytes)?))),
            SerializerId::Long => Ok(Value::Long(i64::from_be_bytes(self.fixed(bytes)?))),
            SerializerId::Double => Ok(Value::Double(f64::from_bits(u64::from_be_bytes(
                self.fixed(bytes)?,
            )))),
            SerializerId::String => String::from_utf8(bytes.to_vec())
                .map(Value::String)
                .map_err(|e| CatalogError::serialization(format!("invalid UTF-8: {}", e))),
            SerializerId::ByteArray => Ok(Value::Bytes(bytes.to_vec())),
            SerializerId::LongArray => {
                if bytes.len() % 8 != 0 {
                    return Err(CatalogError::serialization(format!(
                        "long array length {} is not a multiple of 8",
                        bytes.len()
                    )));
                }
                let longs = bytes
                    .chunks_exact(8)
                    .map(|chunk| {
                        let mut buf = [0u8; 8];
                        buf.copy_from_slice(chunk);
                        i64::from_be_bytes(buf)
                    })
                    .collect();
                Ok(Value::LongArray(longs))
            }
            SerializerId::RecordId => Ok(Value::Recid(RecordId::new(u64::from_be_bytes(
                self.fixed(bytes)?,
            )))),
            SerializerId::Nothing => {
                if bytes.is_empty() {
                    Ok(Value::Null)
                } else {
                    Err(CatalogError::serialization(
                        "Nothing serializer found a non-empty record",
                    ))
                }
            }
            SerializerId::Generic => Err(CatalogError::serialization(
                "generic values are decoded by the generic serializer",
            )),
        }
    }

    fn singleton_id(&self) -> Option<SerializerId> {
        Some(self.id)
    }
}

/// Closed table of singleton serializers for one database.
pub struct SerializerRegistry {
    builtins: HashMap<SerializerId, Arc<dyn Serializer>>,
    generic: Arc<GenericSerializer>,
}

impl SerializerRegistry {
    pub fn new(generic: Arc<GenericSerializer>) -> Self {
        let builtins: HashMap<SerializerId, Arc<dyn Serializer>> = SerializerId::ALL
            .iter()
            .filter(|id| **id != SerializerId::Generic)
            .map(|id| {
                let serializer: Arc<dyn Serializer> = Arc::new(BuiltinSerializer::new(*id));
                (*id, serializer)
            })
            .collect();
        Self { builtins, generic }
    }

    /// Returns the singleton for `id`.
    pub fn get(&self, id: SerializerId) -> Arc<dyn Serializer> {
        match self.builtins.get(&id) {
            Some(serializer) => Arc::clone(serializer),
            None => {
                let generic: Arc<dyn Serializer> = self.generic.clone();
                generic
            }
        }
    }

    pub fn generic(&self) -> Arc<GenericSerializer> {
        Arc::clone(&self.generic)
    }

    /// True when `serializer` is this database's own generic serializer.
    fn is_own_generic(&self, serializer: &dyn Serializer) -> bool {
        let supplied = serializer as *const dyn Serializer as *const ();
        supplied == Arc::as_ptr(&self.generic) as *const ()
    }

    /// Stable name of a singleton serializer, `None` for custom ones.
    ///
    /// The generic serializer is bound to one database's type table, so only
    /// this registry's instance counts as the `Generic` singleton.
    pub fn register_singleton(&self, serializer: &dyn Serializer) -> Option<&'static str> {
        match serializer.singleton_id() {
            Some(SerializerId::Generic) if !self.is_own_generic(serializer) => None,
            id => id.map(|id| id.name()),
        }
    }

    pub fn resolve_singleton(&self, name: &str) -> Result<Arc<dyn Serializer>> {
        SerializerId::from_name(name)
            .map(|id| self.get(id))
            .ok_or_else(|| {
                CatalogError::wrong_configuration(format!("unknown serializer '{}'", name))
            })
    }

    /// Name to record in the catalog for `serializer`.
    pub fn catalog_name(&self, serializer: &dyn Serializer) -> &'static str {
        self.register_singleton(serializer)
            .unwrap_or(CUSTOM_SERIALIZER)
    }

    /// Picks the serializer for an existing catalog entry.
    ///
    /// A caller-supplied serializer wins, but it may not contradict a singleton
    /// recorded in the catalog. Custom entries must be re-supplied.
    pub(crate) fn resolve_for_open(
        &self,
        key: &str,
        stored: &str,
        supplied: Option<&Arc<dyn Serializer>>,
    ) -> Result<Arc<dyn Serializer>> {
        match (stored, supplied) {
            (CUSTOM_SERIALIZER, Some(serializer)) => Ok(Arc::clone(serializer)),
            (CUSTOM_SERIALIZER, None) => Err(CatalogError::wrong_configuration(format!(
                "'{}' uses a custom serializer which must be supplied on open",
                key
            ))),
            (name, Some(serializer)) => match serializer.singleton_id() {
                Some(SerializerId::Generic) if !self.is_own_generic(serializer.as_ref()) => {
                    Err(CatalogError::wrong_configuration(format!(
                        "'{}' was supplied the generic serializer of another database",
                        key
                    )))
                }
                Some(id) if id.name() != name => Err(CatalogError::wrong_configuration(format!(
                    "'{}' was created with serializer {} but {} was supplied",
                    key, name, id
                ))),
                _ => Ok(Arc::clone(serializer)),
            },
            (name, None) => self.resolve_singleton(name),
        }
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("builtins", &self.builtins.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generic::GenericSerializer;
    use crate::type_catalog::TypeCatalog;
    use crate::value::DbId;

    #[derive(Debug)]
    struct UpperCase;

    impl Serializer for UpperCase {
        fn encode(&self, value: &Value) -> Result<Vec<u8>> {
            match value {
                Value::String(s) => Ok(s.to_uppercase().into_bytes()),
                other => Err(CatalogError::serialization(other.kind())),
            }
        }

        fn decode(&self, bytes: &[u8]) -> Result<Value> {
            Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
        }
    }

    fn registry() -> SerializerRegistry {
        let types = Arc::new(TypeCatalog::empty());
        SerializerRegistry::new(Arc::new(GenericSerializer::new(DbId::next(), types)))
    }

    #[test]
    fn test_every_singleton_resolves_by_name() {
        let registry = registry();
        for id in SerializerId::ALL {
            let serializer = registry.resolve_singleton(id.name()).unwrap();
            assert_eq!(serializer.singleton_id(), Some(id));
            assert_eq!(registry.register_singleton(serializer.as_ref()), Some(id.name()));
        }
    }

    #[test]
    fn test_unknown_name_is_wrong_configuration() {
        let err = registry().resolve_singleton("Zebra").unwrap_err();
        assert!(matches!(err, CatalogError::WrongConfiguration(_)));
    }

    #[test]
    fn test_custom_serializer_has_no_identity() {
        let registry = registry();
        assert_eq!(registry.register_singleton(&UpperCase), None);
        assert_eq!(registry.catalog_name(&UpperCase), CUSTOM_SERIALIZER);
    }

    #[test]
    fn test_resolve_for_open() {
        let registry = registry();
        let custom: Arc<dyn Serializer> = Arc::new(UpperCase);
        let long: Arc<dyn Serializer> = Arc::new(BuiltinSerializer::long());

        assert!(registry
            .resolve_for_open("m#keySerializer", CUSTOM_SERIALIZER, Some(&custom))
            .is_ok());
        assert!(registry
            .resolve_for_open("m#keySerializer", CUSTOM_SERIALIZER, None)
            .is_err());
        assert!(registry
            .resolve_for_open("m#keySerializer", "String", Some(&long))
            .is_err());
        let resolved = registry
            .resolve_for_open("m#keySerializer", "Long", None)
            .unwrap();
        assert_eq!(resolved.singleton_id(), Some(SerializerId::Long));
    }

    #[test]
    fn test_generic_identity_is_per_database() {
        let registry = registry();
        let foreign = registry_generic_of_other_db();

        assert_eq!(
            registry.register_singleton(registry.generic().as_ref()),
            Some("Generic")
        );
        assert_eq!(registry.register_singleton(foreign.as_ref()), None);
        assert_eq!(registry.catalog_name(foreign.as_ref()), CUSTOM_SERIALIZER);

        let err = registry
            .resolve_for_open("m#valueSerializer", "Generic", Some(&foreign))
            .unwrap_err();
        assert!(matches!(err, CatalogError::WrongConfiguration(_)));

        let own: Arc<dyn Serializer> = registry.generic();
        assert!(registry
            .resolve_for_open("m#valueSerializer", "Generic", Some(&own))
            .is_ok());
    }

    fn registry_generic_of_other_db() -> Arc<dyn Serializer> {
        registry().generic()
    }

    #[test]
    fn test_builtin_codecs() {
        let long = BuiltinSerializer::long();
        let bytes = long.encode(&Value::Long(-2)).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(long.decode(&bytes).unwrap(), Value::Long(-2));

        let arr = BuiltinSerializer::long_array();
        let bytes = arr.encode(&Value::LongArray(vec![1, 2, 3])).unwrap();
        assert_eq!(arr.decode(&bytes).unwrap(), Value::LongArray(vec![1, 2, 3]));
        assert!(arr.decode(&bytes[..5]).is_err());

        let nothing = BuiltinSerializer::nothing();
        assert!(nothing.encode(&Value::Null).unwrap().is_empty());
        assert!(nothing.encode(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_kind_mismatch() {
        let err = BuiltinSerializer::integer()
            .encode(&Value::from("x"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Serialization(_)));
    }
}
