//! Index-tree backed list and long-to-long map handles.

use std::fmt;
use std::sync::Arc;

use tessdb_commons::{ObjectName, RecordId};
use tessdb_store::RecordStore;

use super::read_u64;
use crate::descriptor::IndexTreeDescriptor;
use crate::error::Result;
use crate::serializers::Serializer;

pub const DEFAULT_INDEX_DIR_SHIFT: u32 = 4;
pub const DEFAULT_INDEX_LEVELS: u32 = 4;

pub struct IndexTreeList {
    name: ObjectName,
    descriptor: IndexTreeDescriptor,
    store: Arc<dyn RecordStore>,
    serializer: Arc<dyn Serializer>,
}

impl IndexTreeList {
    pub(crate) fn new(
        name: ObjectName,
        descriptor: IndexTreeDescriptor,
        store: Arc<dyn RecordStore>,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            name,
            descriptor,
            store,
            serializer,
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn descriptor(&self) -> &IndexTreeDescriptor {
        &self.descriptor
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    pub fn root_recid(&self) -> RecordId {
        self.descriptor.root_recid
    }

    /// Element count from the size record.
    pub fn len(&self) -> Result<u64> {
        match self.descriptor.size_recid {
            Some(recid) => read_u64(self.store.as_ref(), recid),
            None => Ok(0),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl fmt::Debug for IndexTreeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexTreeList")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

pub struct IndexTreeLongLongMap {
    name: ObjectName,
    descriptor: IndexTreeDescriptor,
    store: Arc<dyn RecordStore>,
}

impl IndexTreeLongLongMap {
    pub(crate) fn new(
        name: ObjectName,
        descriptor: IndexTreeDescriptor,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            name,
            descriptor,
            store,
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn descriptor(&self) -> &IndexTreeDescriptor {
        &self.descriptor
    }

    pub fn root_recid(&self) -> RecordId {
        self.descriptor.root_recid
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }
}

impl fmt::Debug for IndexTreeLongLongMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexTreeLongLongMap")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
