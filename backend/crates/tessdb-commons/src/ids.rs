//! Record identifiers and their catalog text form.
//!
//! Record identifier lists are stored in the name catalog as comma-joined
//! decimal values with no trailing separator, e.g. `"12,13,14"`.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable handle addressing one binary record in a record store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
pub struct RecordId(u64);

impl RecordId {
    /// Create a RecordId from its raw value
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The identifier allocated right after this one
    #[inline]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for RecordId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(RecordId)
            .map_err(|e| format!("invalid record id '{}': {}", s, e))
    }
}

/// Join record identifiers into their catalog form.
pub fn format_recid_list(recids: &[RecordId]) -> String {
    recids
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a comma-joined list of record identifiers.
///
/// An empty string is an empty list. Empty elements (`"1,,2"`, `"1,"`) are rejected.
pub fn parse_recid_list(s: &str) -> Result<Vec<RecordId>, String> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|part| {
            if part.is_empty() {
                Err(format!("empty element in record id list '{}'", s))
            } else {
                part.parse::<RecordId>()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recid_list_format() {
        let ids = vec![RecordId::new(3), RecordId::new(40), RecordId::new(500)];
        assert_eq!(format_recid_list(&ids), "3,40,500");
        assert_eq!(format_recid_list(&[]), "");
    }

    #[test]
    fn test_recid_list_parse() {
        assert_eq!(
            parse_recid_list("7,8").unwrap(),
            vec![RecordId::new(7), RecordId::new(8)]
        );
        assert!(parse_recid_list("").unwrap().is_empty());
        assert!(parse_recid_list("1,").is_err());
        assert!(parse_recid_list("1,,2").is_err());
        assert!(parse_recid_list("1,x").is_err());
        assert!(parse_recid_list("-1").is_err());
    }

    #[test]
    fn test_recid_serde_is_transparent_number() {
        let json = serde_json::to_string(&RecordId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}
