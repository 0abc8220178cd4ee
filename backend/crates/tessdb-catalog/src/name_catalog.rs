//! The persisted directory of named collections, stored as one record at id 0.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::str::FromStr;

use tessdb_commons::ids::{format_recid_list, parse_recid_list};
use tessdb_commons::{ObjectName, RecordId, NAME_PARAM_SEPARATOR, RECID_NAME_CATALOG};
use tessdb_store::{RecordStore, StorageError};

use crate::error::{CatalogError, Result};
use crate::schema::keys;

/// Ordered `"<name>#<param>" -> value` map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameCatalog {
    entries: BTreeMap<String, String>,
}

impl NameCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads record 0. Caller holds the read lock.
    pub fn load(store: &dyn RecordStore) -> Result<Self> {
        let bytes = match store.get(RECID_NAME_CATALOG) {
            Ok(Some(bytes)) => bytes,
            Ok(None) | Err(StorageError::RecordNotFound(_)) => {
                return Err(CatalogError::wrong_configuration(
                    "name catalog record is missing; the store was not initialized by tessdb",
                ))
            }
            Err(e) => return Err(e.into()),
        };
        Self::decode(&bytes)
    }

    /// Overwrites record 0. Caller holds the write lock.
    pub fn save(&self, store: &dyn RecordStore) -> Result<()> {
        store.update(RECID_NAME_CATALOG, Some(&self.encode()?))?;
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::encode_to_vec(&self.entries, bincode::config::standard())
            .map_err(|e| CatalogError::serialization(format!("name catalog: {}", e)))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (entries, _): (BTreeMap<String, String>, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard()).map_err(|e| {
                CatalogError::wrong_configuration(format!("name catalog is unreadable: {}", e))
            })?;
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every name with a `#type` entry.
    pub fn all_names(&self) -> BTreeSet<String> {
        let suffix = format!("{}{}", NAME_PARAM_SEPARATOR, keys::TYPE);
        self.entries
            .keys()
            .filter_map(|key| key.strip_suffix(&suffix))
            .map(str::to_string)
            .collect()
    }

    pub fn get_type(&self, name: &str) -> Option<&str> {
        self.get(&format!("{}{}{}", name, NAME_PARAM_SEPARATOR, keys::TYPE))
    }

    /// All parameters of `name`, keyed by parameter.
    pub fn params_for(&self, name: &str) -> BTreeMap<String, String> {
        let prefix = format!("{}{}", name, NAME_PARAM_SEPARATOR);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| (key[prefix.len()..].to_string(), value.clone()))
            .collect()
    }

    pub fn param(&self, name: &ObjectName, param: &str) -> Option<&str> {
        self.get(&name.param_key(param))
    }

    pub fn set_param(&mut self, name: &ObjectName, param: &str, value: impl Display) {
        self.entries.insert(name.param_key(param), value.to_string());
    }

    pub fn require_param(&self, name: &ObjectName, param: &str) -> Result<&str> {
        self.param(name, param).ok_or_else(|| {
            CatalogError::wrong_configuration(format!(
                "missing catalog parameter '{}'",
                name.param_key(param)
            ))
        })
    }

    /// Parses a required parameter.
    pub fn parse_param<T>(&self, name: &ObjectName, param: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.require_param(name, param)?;
        raw.parse::<T>().map_err(|e| {
            CatalogError::wrong_configuration(format!(
                "catalog parameter '{}' has malformed value '{}': {}",
                name.param_key(param),
                raw,
                e
            ))
        })
    }

    pub fn recid_param(&self, name: &ObjectName, param: &str) -> Result<RecordId> {
        self.parse_param(name, param)
    }

    pub fn recid_list_param(&self, name: &ObjectName, param: &str) -> Result<Vec<RecordId>> {
        let raw = self.require_param(name, param)?;
        parse_recid_list(raw).map_err(|e| {
            CatalogError::wrong_configuration(format!(
                "catalog parameter '{}' has malformed value '{}': {}",
                name.param_key(param),
                raw,
                e
            ))
        })
    }

    pub fn optional_recid_list_param(
        &self,
        name: &ObjectName,
        param: &str,
    ) -> Result<Option<Vec<RecordId>>> {
        if self.param(name, param).is_none() {
            return Ok(None);
        }
        self.recid_list_param(name, param).map(Some)
    }

    pub fn set_recid_list(&mut self, name: &ObjectName, param: &str, recids: &[RecordId]) {
        self.set_param(name, param, format_recid_list(recids));
    }
}
