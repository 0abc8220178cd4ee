//! Type-safe wrapper for cataloged object names.

use std::fmt;

/// Separates an object name from its parameter in catalog keys (`"orders#type"`).
pub const NAME_PARAM_SEPARATOR: char = '#';

/// Error returned when an object name fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectNameValidationError {
    pub name: String,
    pub reason: String,
}

impl fmt::Display for ObjectNameValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid object name '{}': {}", self.name, self.reason)
    }
}

impl std::error::Error for ObjectNameValidationError {}

/// Name of a collection registered in the name catalog.
///
/// Names are restricted to ASCII alphanumerics, `.`, `_` and `-`. In particular
/// they can never contain the parameter separator `#`, so `"<name>#<param>"`
/// keys always split unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName(String);

impl ObjectName {
    fn validate(name: &str) -> Result<(), ObjectNameValidationError> {
        if name.is_empty() {
            return Err(ObjectNameValidationError {
                name: name.to_string(),
                reason: "Name cannot be empty".to_string(),
            });
        }

        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(ObjectNameValidationError {
                name: name.to_string(),
                reason: format!(
                    "Character '{}' is not allowed; use alphanumerics, '.', '_' or '-'",
                    c
                ),
            });
        }

        Ok(())
    }

    /// Creates a new ObjectName, with validation.
    pub fn try_new(name: impl Into<String>) -> Result<Self, ObjectNameValidationError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Catalog key for one parameter of this object (`"<name>#<param>"`).
    pub fn param_key(&self, param: &str) -> String {
        format!("{}{}{}", self.0, NAME_PARAM_SEPARATOR, param)
    }

    /// Consumes the wrapper and returns the inner String.
    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
