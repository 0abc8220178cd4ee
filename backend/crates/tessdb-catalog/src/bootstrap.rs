//! First-open initialization of a record store.
//!
//! An empty store receives the name catalog at record 0, the type descriptor
//! table at record 1 and empty placeholders up to [`RECID_MAX_RESERVED`]. The
//! store must hand out exactly those identifiers, in order.

use tessdb_commons::{
    RecordId, CATALOG_FORMAT_VERSION, RECID_CLASS_INFOS, RECID_MAX_RESERVED, RECID_NAME_CATALOG,
};
use tessdb_store::RecordStore;

use crate::error::{CatalogError, Result};
use crate::name_catalog::NameCatalog;
use crate::schema::keys;
use crate::type_catalog::encode_table;

/// Outcome of [`initialize_store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// The store was empty and the reserved records were written.
    Initialized,
    /// The store already carried a catalog.
    Existing,
}

fn expect_recid(actual: RecordId, expected: RecordId, what: &str) -> Result<()> {
    if actual != expected {
        return Err(CatalogError::wrong_configuration(format!(
            "store allocated record {} for the {}, expected {}",
            actual, what, expected
        )));
    }
    Ok(())
}

/// Writes the reserved records into an empty store, or checks that a non-empty
/// store carries a readable name catalog.
pub fn initialize_store(store: &dyn RecordStore) -> Result<Bootstrap> {
    if !store.is_empty()? {
        NameCatalog::load(store)?;
        return Ok(Bootstrap::Existing);
    }

    if store.is_read_only() {
        return Err(CatalogError::wrong_configuration(
            "cannot initialize an empty read-only store",
        ));
    }

    let mut catalog = NameCatalog::new();
    catalog.insert(keys::FORMAT_VERSION, CATALOG_FORMAT_VERSION.to_string());

    let recid = store.put(Some(&catalog.encode()?))?;
    expect_recid(recid, RECID_NAME_CATALOG, "name catalog")?;

    let recid = store.put(Some(&encode_table(&[])?))?;
    expect_recid(recid, RECID_CLASS_INFOS, "type descriptor table")?;

    let mut expected = RECID_CLASS_INFOS.next();
    while expected <= RECID_MAX_RESERVED {
        let recid = store.put(None)?;
        expect_recid(recid, expected, "reserved slot")?;
        expected = expected.next();
    }

    store.commit()?;
    log::info!(
        "Initialized store: catalog format {}, records 0..={} reserved",
        CATALOG_FORMAT_VERSION,
        RECID_MAX_RESERVED
    );
    Ok(Bootstrap::Initialized)
}
