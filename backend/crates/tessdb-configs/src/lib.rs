//! tessdb-configs
//!
//! Engine configuration types and loader for tessdb.

pub mod config;

pub use config::*;
pub use config::defaults;
