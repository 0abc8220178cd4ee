//! Initializes a store so later opens find the reserved records.

use std::io::Write;

use anyhow::{Context, Result};
use log::info;
use tessdb_catalog::{initialize_store, Bootstrap};
use tessdb_configs::EngineConfig;

use crate::lifecycle::open_store;

/// Creates the reserved records of an empty store. An already initialized
/// store is left untouched.
pub fn init(config: &EngineConfig, out: &mut impl Write) -> Result<Bootstrap> {
    let store = open_store(&config.storage)?;
    let outcome = initialize_store(store.as_ref()).context("Failed to initialize store")?;
    store.close()?;

    match outcome {
        Bootstrap::Initialized => {
            info!("Initialized store at {}", config.storage.path);
            writeln!(out, "initialized {}", config.storage.path)?;
        }
        Bootstrap::Existing => {
            writeln!(out, "{} is already initialized", config.storage.path)?;
        }
    }
    Ok(outcome)
}
