//! Process-wide registry of databases to close at exit.
//!
//! The binary calls [`ShutdownRegistry::run_now`] on the global registry before
//! returning from `main`. Databases hold a strong or a weak entry; a weak entry
//! does not keep an otherwise dropped database alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::db::Db;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

enum HookRef {
    Strong(Arc<Db>),
    Weak(Weak<Db>),
}

impl HookRef {
    fn upgrade(&self) -> Option<Arc<Db>> {
        match self {
            HookRef::Strong(db) => Some(Arc::clone(db)),
            HookRef::Weak(db) => db.upgrade(),
        }
    }
}

static GLOBAL: Lazy<Arc<ShutdownRegistry>> = Lazy::new(|| Arc::new(ShutdownRegistry::new()));

#[derive(Default)]
pub struct ShutdownRegistry {
    next_id: AtomicU64,
    hooks: Mutex<Vec<(HookId, HookRef)>>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<ShutdownRegistry> {
        Arc::clone(&GLOBAL)
    }

    pub fn register(&self, db: &Arc<Db>, weak: bool) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let hook = if weak {
            HookRef::Weak(Arc::downgrade(db))
        } else {
            HookRef::Strong(Arc::clone(db))
        };
        self.hooks.lock().push((id, hook));
        id
    }

    pub fn deregister(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.lock();
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every registered database that is still open.
    ///
    /// Failures are logged and skipped. Returns how many databases were closed.
    pub fn run_now(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        let mut closed = 0;
        for (_, hook) in hooks {
            let Some(db) = hook.upgrade() else {
                continue;
            };
            if db.is_closed() {
                continue;
            }
            match db.close() {
                Ok(()) => closed += 1,
                Err(e) => log::warn!("Failed to close database {} at exit: {}", db.id().as_u64(), e),
            }
        }
        closed
    }
}

impl std::fmt::Debug for ShutdownRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownRegistry")
            .field("hooks", &self.len())
            .finish()
    }
}
