//! Store and database opening for the command-line tool.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tessdb_catalog::Db;
use tessdb_configs::{EngineConfig, StorageBackendKind, StorageSettings};
use tessdb_store::{FileRecordStore, MemoryRecordStore, MemoryStoreOptions, RecordStore};

/// Opens the record store described by `settings`.
pub fn open_store(settings: &StorageSettings) -> Result<Arc<dyn RecordStore>> {
    let phase_start = std::time::Instant::now();
    let store: Arc<dyn RecordStore> = match settings.backend {
        StorageBackendKind::Memory => Arc::new(MemoryRecordStore::with_options(
            MemoryStoreOptions {
                transactional: settings.transactional,
                first_recid: 0,
            },
        )),
        StorageBackendKind::File => Arc::new(
            FileRecordStore::open(
                Path::new(&settings.path),
                settings.read_only,
                settings.transactional,
            )
            .with_context(|| format!("Failed to open snapshot store {}", settings.path))?,
        ),
        StorageBackendKind::Rocksdb => open_rocksdb(settings)?,
    };
    info!(
        "{:?} store opened at {} (read_only={}, {:.2}ms)",
        settings.backend,
        settings.path,
        settings.read_only,
        phase_start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(store)
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(settings: &StorageSettings) -> Result<Arc<dyn RecordStore>> {
    std::fs::create_dir_all(&settings.path)?;
    let store = tessdb_store::RocksRecordStore::open(&settings.path, settings.read_only)
        .with_context(|| format!("Failed to open RocksDB store {}", settings.path))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(_settings: &StorageSettings) -> Result<Arc<dyn RecordStore>> {
    anyhow::bail!("storage.backend = \"rocksdb\" requires building with the `rocksdb` feature")
}

/// Opens the store and the database on top of it.
pub fn open_database(config: &EngineConfig) -> Result<Arc<Db>> {
    let store = open_store(&config.storage)?;
    Db::open(store, config).context("Failed to open database")
}
