pub mod defaults;
mod loader;
mod types;

pub use types::{
    CatalogSettings, EngineConfig, LoggingSettings, ShutdownSettings, StorageBackendKind,
    StorageSettings,
};
