use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub shutdown: ShutdownSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Record store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Heap-only store, lost on close
    Memory,
    /// Snapshot file rewritten atomically on every commit
    #[default]
    File,
    /// RocksDB database directory (requires the `rocksdb` feature of tessdb-store)
    Rocksdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Store location: snapshot file for `file`, directory for `rocksdb`
    #[serde(default = "default_data_path")]
    pub path: String,
    #[serde(default)]
    pub read_only: bool,
    /// Buffer writes until commit (enables rollback)
    #[serde(default = "default_true")]
    pub transactional: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            path: default_data_path(),
            read_only: false,
            transactional: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Guard catalog and store mutation with a readers-writer lock.
    /// Disable only when a single thread ever touches the database.
    #[serde(default = "default_true")]
    pub thread_safe: bool,
    /// Run the catalog validator when opening an existing store and refuse
    /// to open it if any problem is reported
    #[serde(default = "default_true")]
    pub verify_on_open: bool,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            thread_safe: true,
            verify_on_open: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownSettings {
    /// Register the database with the process exit registry
    #[serde(default)]
    pub close_on_exit: bool,
    /// Let the exit registry hold a weak reference, so a dropped database is
    /// simply skipped instead of being kept alive until exit
    #[serde(default = "default_true")]
    pub weak_reference: bool,
    /// How long `close()` waits for each owned executor to terminate
    #[serde(default = "default_executor_await_timeout_ms")]
    pub executor_await_timeout_ms: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            close_on_exit: false,
            weak_reference: true,
            executor_await_timeout_ms: default_executor_await_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub log_to_console: bool,
    /// Optional log file (appended to)
    #[serde(default)]
    pub file_path: Option<String>,
    /// Optional per-target log level overrides
    /// Configure via a TOML table:
    /// [logging.targets]
    /// tessdb_catalog = "debug"
    #[serde(default)]
    pub targets: HashMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_to_console: true,
            file_path: None,
            targets: HashMap::new(),
        }
    }
}
