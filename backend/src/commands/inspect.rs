//! Read-only views of the name catalog.

use std::io::Write;

use anyhow::{bail, Result};
use serde_json::{json, Map};
use tessdb_catalog::Db;

/// Output format of `show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ShowFormat {
    #[default]
    Text,
    Json,
}

/// Lists every cataloged name with its type tag.
pub fn names(db: &Db, out: &mut impl Write) -> Result<usize> {
    let names = db.all_names()?;
    for name in &names {
        let tag = db.get_type(name)?.unwrap_or_default();
        writeln!(out, "{}\t{}", name, tag)?;
    }
    Ok(names.len())
}

/// Prints every parameter of `name`.
pub fn show(db: &Db, name: &str, format: ShowFormat, out: &mut impl Write) -> Result<()> {
    let params = db.params_for(name)?;
    if params.is_empty() {
        bail!("'{}' is not in the catalog", name);
    }

    match format {
        ShowFormat::Text => {
            for (param, value) in &params {
                writeln!(out, "{}#{} = {}", name, param, value)?;
            }
        }
        ShowFormat::Json => {
            let params: Map<String, serde_json::Value> = params
                .into_iter()
                .map(|(param, value)| (param, json!(value)))
                .collect();
            let doc = json!({ "name": name, "params": params });
            writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        }
    }
    Ok(())
}

/// Runs the catalog validator and prints one line per problem.
///
/// Returns the problems found; the caller decides the exit status.
pub fn verify(db: &Db, out: &mut impl Write) -> Result<Vec<String>> {
    let problems = db.verify_catalog()?;
    if problems.is_empty() {
        writeln!(out, "catalog ok ({} names)", db.all_names()?.len())?;
    }
    for problem in &problems {
        writeln!(out, "{}", problem)?;
    }
    Ok(problems)
}
