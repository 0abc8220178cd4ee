//! Consistency check of a loaded name catalog.
//!
//! [`validate`] never fails; it collects every problem it finds as a
//! human-readable string that names the offending catalog key.

use std::collections::BTreeSet;

use tessdb_commons::ids::parse_recid_list;
use tessdb_commons::{ObjectName, CATALOG_FORMAT_VERSION, NAME_PARAM_SEPARATOR};

use crate::name_catalog::NameCatalog;
use crate::schema::{keys, CollectionType};

/// Entries per segment in an expiration queue list: head, tail, head predecessor.
pub const QUEUE_RECIDS_PER_SEGMENT: usize = 3;

/// Largest concurrency shift a hash collection may record.
pub const MAX_CONC_SHIFT: u32 = 16;

pub fn validate(catalog: &NameCatalog) -> Vec<String> {
    let mut problems = Vec::new();
    let names = catalog.all_names();

    check_reserved_keys(catalog, &mut problems);

    for name in &names {
        if let Err(e) = ObjectName::try_new(name.as_str()) {
            problems.push(e.to_string());
        }
        let tag = catalog.get_type(name).unwrap_or_default();
        let Some(ty) = CollectionType::from_tag(tag) else {
            problems.push(format!("'{}#type': unknown type '{}'", name, tag));
            continue;
        };
        check_params(catalog, name, ty, &mut problems);
        if ty.is_hash() {
            check_segment_lists(catalog, name, ty, &mut problems);
        }
    }

    check_stray_keys(catalog, &names, &mut problems);
    problems
}

fn check_reserved_keys(catalog: &NameCatalog, problems: &mut Vec<String>) {
    for (key, value) in catalog.iter() {
        if key.contains(NAME_PARAM_SEPARATOR) {
            continue;
        }
        if key != keys::FORMAT_VERSION {
            problems.push(format!("'{}': unknown reserved key", key));
            continue;
        }
        match value.parse::<u32>() {
            Ok(version) if version > CATALOG_FORMAT_VERSION => problems.push(format!(
                "'{}': catalog format {} was written by a newer release (supported: {})",
                key, version, CATALOG_FORMAT_VERSION
            )),
            Ok(_) => {}
            Err(_) => problems.push(format!("'{}': malformed value '{}'", key, value)),
        }
    }
}

fn check_params(
    catalog: &NameCatalog,
    name: &str,
    ty: CollectionType,
    problems: &mut Vec<String>,
) {
    for spec in ty.params() {
        let key = format!("{}{}{}", name, NAME_PARAM_SEPARATOR, spec.key);
        match catalog.get(&key) {
            None if spec.required => problems.push(format!(
                "'{}': missing required parameter for {}",
                key, ty
            )),
            None => {}
            Some(value) if !spec.format.accepts(value) => problems.push(format!(
                "'{}': malformed value '{}', expected {}",
                key,
                value,
                spec.format.describe()
            )),
            Some(_) => {}
        }
    }
}

fn check_segment_lists(
    catalog: &NameCatalog,
    name: &str,
    ty: CollectionType,
    problems: &mut Vec<String>,
) {
    let key = |param: &str| format!("{}{}{}", name, NAME_PARAM_SEPARATOR, param);
    let Some(conc_shift) = catalog
        .get(&key(keys::CONC_SHIFT))
        .and_then(|v| v.parse::<u32>().ok())
    else {
        return;
    };
    if conc_shift > MAX_CONC_SHIFT {
        problems.push(format!(
            "'{}': concurrency shift {} exceeds {}",
            key(keys::CONC_SHIFT),
            conc_shift,
            MAX_CONC_SHIFT
        ));
        return;
    }
    let segments = 1usize << conc_shift;

    let list_len = |param: &str| {
        catalog
            .get(&key(param))
            .and_then(|v| parse_recid_list(v).ok())
            .map(|list| list.len())
    };

    for (param, expected) in [
        (keys::SEGMENT_RECIDS, segments),
        (keys::COUNTER_RECIDS, segments),
    ] {
        if let Some(len) = list_len(param) {
            if len != expected {
                problems.push(format!(
                    "'{}': {} record ids, expected {}",
                    key(param),
                    len,
                    expected
                ));
            }
        }
    }

    let mut axes = vec![(keys::EXPIRE_CREATE_TTL, keys::EXPIRE_CREATE_QUEUE)];
    if ty == CollectionType::HashMap {
        axes.push((keys::EXPIRE_UPDATE_TTL, keys::EXPIRE_UPDATE_QUEUE));
    }
    axes.push((keys::EXPIRE_GET_TTL, keys::EXPIRE_GET_QUEUE));

    for (ttl_param, queue_param) in axes {
        let ttl = catalog
            .get(&key(ttl_param))
            .and_then(|v| v.parse::<u64>().ok());
        match (ttl, list_len(queue_param)) {
            (Some(0), Some(_)) => problems.push(format!(
                "'{}': queue present but '{}' is 0",
                key(queue_param),
                key(ttl_param)
            )),
            (Some(ttl), None) if ttl > 0 => problems.push(format!(
                "'{}': missing expiration queue for non-zero '{}'",
                key(queue_param),
                key(ttl_param)
            )),
            (_, Some(len)) if len != segments * QUEUE_RECIDS_PER_SEGMENT => {
                problems.push(format!(
                    "'{}': {} record ids, expected {}",
                    key(queue_param),
                    len,
                    segments * QUEUE_RECIDS_PER_SEGMENT
                ))
            }
            _ => {}
        }
    }
}

fn check_stray_keys(catalog: &NameCatalog, names: &BTreeSet<String>, problems: &mut Vec<String>) {
    for (key, _) in catalog.iter() {
        let Some((name, param)) = key.split_once(NAME_PARAM_SEPARATOR) else {
            continue;
        };
        if param == keys::TYPE {
            continue;
        }
        if !names.contains(name) {
            problems.push(format!("'{}': belongs to no known name", key));
            continue;
        }
        let ty = catalog.get_type(name).and_then(CollectionType::from_tag);
        if let Some(ty) = ty {
            if ty.param(param).is_none() {
                problems.push(format!("'{}': not a parameter of {}", key, ty));
            }
        }
    }
}
