//! Single-record atomic scalars.
//!
//! Each atomic owns one record. Read-modify-write operations are serialized by an
//! in-process mutex on the instance, which is why the instance cache hands out
//! exactly one object per name.

use std::sync::Arc;

use parking_lot::Mutex;
use tessdb_commons::{ObjectName, RecordId};
use tessdb_store::RecordStore;

use crate::error::{CatalogError, Result};
use crate::serializers::Serializer;
use crate::value::Value;

struct AtomicRecord {
    name: ObjectName,
    store: Arc<dyn RecordStore>,
    recid: RecordId,
    serializer: Arc<dyn Serializer>,
    lock: Mutex<()>,
}

impl AtomicRecord {
    fn new(
        name: ObjectName,
        store: Arc<dyn RecordStore>,
        recid: RecordId,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            name,
            store,
            recid,
            serializer,
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<Value> {
        match self.store.get(self.recid)? {
            Some(bytes) => self.serializer.decode(&bytes),
            None => Ok(Value::Null),
        }
    }

    fn write(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            self.store.update(self.recid, None)?;
        } else {
            let bytes = self.serializer.encode(value)?;
            self.store.update(self.recid, Some(&bytes))?;
        }
        Ok(())
    }

    fn set(&self, value: &Value) -> Result<()> {
        let _guard = self.lock.lock();
        self.write(value)
    }

    fn compare_and_set(&self, expected: &Value, new: &Value) -> Result<bool> {
        let _guard = self.lock.lock();
        if self.read()? != *expected {
            return Ok(false);
        }
        self.write(new)?;
        Ok(true)
    }

    /// Applies `f` to the current value and stores the result. Returns `(old, new)`.
    fn update<F>(&self, f: F) -> Result<(Value, Value)>
    where
        F: FnOnce(&Value) -> Result<Value>,
    {
        let _guard = self.lock.lock();
        let old = self.read()?;
        let new = f(&old)?;
        self.write(&new)?;
        Ok((old, new))
    }

    fn unexpected(&self, value: &Value, expected: &str) -> CatalogError {
        CatalogError::serialization(format!(
            "atomic '{}' holds a {} value, expected {}",
            self.name,
            value.kind(),
            expected
        ))
    }
}

macro_rules! numeric_atomic {
    ($name:ident, $ty:ty, $variant:ident) => {
        pub struct $name {
            cell: AtomicRecord,
        }

        impl $name {
            pub(crate) fn new(
                name: ObjectName,
                store: Arc<dyn RecordStore>,
                recid: RecordId,
                serializer: Arc<dyn Serializer>,
            ) -> Self {
                Self {
                    cell: AtomicRecord::new(name, store, recid, serializer),
                }
            }

            pub fn name(&self) -> &ObjectName {
                &self.cell.name
            }

            pub fn recid(&self) -> RecordId {
                self.cell.recid
            }

            fn unwrap_value(&self, value: &Value) -> Result<$ty> {
                match value {
                    Value::$variant(v) => Ok(*v),
                    other => Err(self.cell.unexpected(other, stringify!($ty))),
                }
            }

            pub fn get(&self) -> Result<$ty> {
                self.unwrap_value(&self.cell.read()?)
            }

            pub fn set(&self, value: $ty) -> Result<()> {
                self.cell.set(&Value::$variant(value))
            }

            pub fn get_and_set(&self, value: $ty) -> Result<$ty> {
                let (old, _) = self.cell.update(|_| Ok(Value::$variant(value)))?;
                self.unwrap_value(&old)
            }

            pub fn compare_and_set(&self, expected: $ty, new: $ty) -> Result<bool> {
                self.cell
                    .compare_and_set(&Value::$variant(expected), &Value::$variant(new))
            }

            /// Adds `delta` (wrapping) and returns the new value.
            pub fn add_and_get(&self, delta: $ty) -> Result<$ty> {
                let (_, new) = self.cell.update(|old| {
                    let current = self.unwrap_value(old)?;
                    Ok(Value::$variant(current.wrapping_add(delta)))
                })?;
                self.unwrap_value(&new)
            }

            pub fn increment_and_get(&self) -> Result<$ty> {
                self.add_and_get(1)
            }

            pub fn decrement_and_get(&self) -> Result<$ty> {
                self.add_and_get(-1)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("name", &self.cell.name)
                    .field("recid", &self.cell.recid)
                    .finish()
            }
        }
    };
}

numeric_atomic!(AtomicLong, i64, Long);
numeric_atomic!(AtomicInteger, i32, Int);

#[derive(Debug)]
pub struct AtomicBoolean {
    cell: AtomicRecord,
}

impl AtomicBoolean {
    pub(crate) fn new(
        name: ObjectName,
        store: Arc<dyn RecordStore>,
        recid: RecordId,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            cell: AtomicRecord::new(name, store, recid, serializer),
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.cell.name
    }

    pub fn recid(&self) -> RecordId {
        self.cell.recid
    }

    pub fn get(&self) -> Result<bool> {
        match self.cell.read()? {
            Value::Bool(v) => Ok(v),
            other => Err(self.cell.unexpected(&other, "bool")),
        }
    }

    pub fn set(&self, value: bool) -> Result<()> {
        self.cell.set(&Value::Bool(value))
    }

    pub fn compare_and_set(&self, expected: bool, new: bool) -> Result<bool> {
        self.cell
            .compare_and_set(&Value::Bool(expected), &Value::Bool(new))
    }

    pub fn get_and_set(&self, value: bool) -> Result<bool> {
        match self.cell.update(|_| Ok(Value::Bool(value)))?.0 {
            Value::Bool(v) => Ok(v),
            other => Err(self.cell.unexpected(&other, "bool")),
        }
    }
}

#[derive(Debug)]
pub struct AtomicString {
    cell: AtomicRecord,
}

impl AtomicString {
    pub(crate) fn new(
        name: ObjectName,
        store: Arc<dyn RecordStore>,
        recid: RecordId,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            cell: AtomicRecord::new(name, store, recid, serializer),
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.cell.name
    }

    pub fn recid(&self) -> RecordId {
        self.cell.recid
    }

    pub fn get(&self) -> Result<String> {
        match self.cell.read()? {
            Value::String(v) => Ok(v),
            other => Err(self.cell.unexpected(&other, "string")),
        }
    }

    pub fn set(&self, value: impl Into<String>) -> Result<()> {
        self.cell.set(&Value::String(value.into()))
    }

    pub fn compare_and_set(&self, expected: &str, new: &str) -> Result<bool> {
        self.cell
            .compare_and_set(&Value::from(expected), &Value::from(new))
    }

    pub fn get_and_set(&self, value: impl Into<String>) -> Result<String> {
        let value = Value::String(value.into());
        match self.cell.update(|_| Ok(value))?.0 {
            Value::String(v) => Ok(v),
            other => Err(self.cell.unexpected(&other, "string")),
        }
    }
}

/// Atomic reference to any value; `Null` is stored as an empty record.
#[derive(Debug)]
pub struct AtomicVar {
    cell: AtomicRecord,
}

impl AtomicVar {
    pub(crate) fn new(
        name: ObjectName,
        store: Arc<dyn RecordStore>,
        recid: RecordId,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            cell: AtomicRecord::new(name, store, recid, serializer),
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.cell.name
    }

    pub fn recid(&self) -> RecordId {
        self.cell.recid
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.cell.serializer
    }

    pub fn get(&self) -> Result<Value> {
        self.cell.read()
    }

    pub fn set(&self, value: Value) -> Result<()> {
        self.cell.set(&value)
    }

    pub fn compare_and_set(&self, expected: &Value, new: Value) -> Result<bool> {
        self.cell.compare_and_set(expected, &new)
    }

    pub fn get_and_set(&self, value: Value) -> Result<Value> {
        Ok(self.cell.update(|_| Ok(value))?.0)
    }
}

impl std::fmt::Debug for AtomicRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicRecord")
            .field("name", &self.name)
            .field("recid", &self.recid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializers::BuiltinSerializer;
    use tessdb_store::test_utils::memory_store;

    fn name(s: &str) -> ObjectName {
        ObjectName::try_new(s).unwrap()
    }

    #[test]
    fn test_atomic_long_operations() {
        let store = memory_store();
        let recid = store.put(Some(&0i64.to_be_bytes())).unwrap();
        let counter = AtomicLong::new(
            name("counter"),
            store,
            recid,
            Arc::new(BuiltinSerializer::long()),
        );

        assert_eq!(counter.increment_and_get().unwrap(), 1);
        assert_eq!(counter.add_and_get(10).unwrap(), 11);
        assert!(!counter.compare_and_set(5, 6).unwrap());
        assert!(counter.compare_and_set(11, 6).unwrap());
        assert_eq!(counter.get_and_set(100).unwrap(), 6);
        assert_eq!(counter.decrement_and_get().unwrap(), 99);
    }

    #[test]
    fn test_atomic_integer_wraps() {
        let store = memory_store();
        let recid = store.put(Some(&i32::MAX.to_be_bytes())).unwrap();
        let atomic = AtomicInteger::new(
            name("i"),
            store,
            recid,
            Arc::new(BuiltinSerializer::integer()),
        );
        assert_eq!(atomic.increment_and_get().unwrap(), i32::MIN);
    }

    #[test]
    fn test_atomic_string_and_boolean() {
        let store = memory_store();
        let s_recid = store.put(Some(b"")).unwrap();
        let b_recid = store.put(Some(&[0])).unwrap();
        let s = AtomicString::new(
            name("s"),
            store.clone(),
            s_recid,
            Arc::new(BuiltinSerializer::string()),
        );
        let b = AtomicBoolean::new(
            name("b"),
            store,
            b_recid,
            Arc::new(BuiltinSerializer::boolean()),
        );

        assert_eq!(s.get().unwrap(), "");
        assert!(s.compare_and_set("", "ready").unwrap());
        assert_eq!(s.get_and_set("done").unwrap(), "ready");

        assert!(!b.get().unwrap());
        assert!(!b.get_and_set(true).unwrap());
        assert!(b.compare_and_set(true, false).unwrap());
    }

    #[test]
    fn test_atomic_var_null() {
        let store = memory_store();
        let recid = store.put(None).unwrap();
        let var = AtomicVar::new(
            name("v"),
            store,
            recid,
            Arc::new(BuiltinSerializer::string()),
        );
        assert_eq!(var.get().unwrap(), Value::Null);
        var.set(Value::from("x")).unwrap();
        assert_eq!(var.get_and_set(Value::Null).unwrap(), Value::from("x"));
        assert!(var.get().unwrap().is_null());
    }
}
