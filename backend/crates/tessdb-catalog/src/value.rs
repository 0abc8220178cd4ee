//! Dynamically typed values handled by serializers and collections.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tessdb_commons::RecordId;

/// Identity of one open database, used to scope named-object references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DbId(u64);

static NEXT_DB_ID: AtomicU64 = AtomicU64::new(1);

impl DbId {
    pub(crate) fn next() -> Self {
        Self(NEXT_DB_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A structured value of a named type, encoded through the type descriptor table.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericRecord {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl GenericRecord {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field; field order is part of the type's descriptor.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Reference to a live collection, encoded by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    owner: DbId,
    name: String,
}

impl CollectionRef {
    pub(crate) fn new(owner: DbId, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }

    pub fn owner(&self) -> DbId {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    LongArray(Vec<i64>),
    Recid(RecordId),
    List(Vec<Value>),
    Record(GenericRecord),
    Reference(CollectionRef),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::LongArray(_) => "long[]",
            Value::Recid(_) => "recid",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Natural ordering between two values of the same scalar kind.
    ///
    /// Returns `None` for values of different kinds and for kinds without an
    /// ordering (records, references, lists, NaN doubles).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::LongArray(a), Value::LongArray(b)) => Some(a.cmp(b)),
            (Value::Recid(a), Value::Recid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<RecordId> for Value {
    fn from(v: RecordId) -> Self {
        Value::Recid(v)
    }
}

impl From<GenericRecord> for Value {
    fn from(v: GenericRecord) -> Self {
        Value::Record(v)
    }
}
