//! # tessdb-commons
//!
//! Shared types and constants used across all tessdb crates.
//!
//! ## Type-Safe Wrappers
//!
//! - `RecordId`: stable 64-bit handle addressing one record in a record store
//! - `ObjectName`: validated name of a cataloged collection
//!
//! ## Example Usage
//!
//! ```rust
//! use tessdb_commons::{ObjectName, RecordId};
//! use tessdb_commons::ids::{format_recid_list, parse_recid_list};
//!
//! let name = ObjectName::try_new("orders").unwrap();
//! assert_eq!(name.as_str(), "orders");
//!
//! let recids = vec![RecordId::new(10), RecordId::new(11)];
//! let joined = format_recid_list(&recids);
//! assert_eq!(joined, "10,11");
//! assert_eq!(parse_recid_list(&joined).unwrap(), recids);
//! ```

pub mod constants;
pub mod ids;
pub mod object_name;

pub use constants::{
    CATALOG_FORMAT_VERSION, RECID_CLASS_INFOS, RECID_MAX_RESERVED, RECID_NAME_CATALOG,
};
pub use ids::RecordId;
pub use object_name::{ObjectName, ObjectNameValidationError, NAME_PARAM_SEPARATOR};
