//! Reserved record identifiers and format constants.
//!
//! The first record identifiers of every store belong to the catalog itself.
//! They are allocated once, in order, when a store is first opened.

use crate::ids::RecordId;

/// Record holding the name catalog (ordered `String -> String` map).
pub const RECID_NAME_CATALOG: RecordId = RecordId::new(0);

/// Record holding the append-only type descriptor table.
pub const RECID_CLASS_INFOS: RecordId = RecordId::new(1);

/// Last reserved record identifier (inclusive).
///
/// Identifiers `2..=RECID_MAX_RESERVED` are pre-allocated as empty records.
pub const RECID_MAX_RESERVED: RecordId = RecordId::new(8);

/// Catalog format version written at bootstrap.
pub const CATALOG_FORMAT_VERSION: u32 = 1;
