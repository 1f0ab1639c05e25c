//! Catalog parsing.
//!
//! A catalog blob is a SQLite database. Only two relations matter here:
//!
//! ```text
//! catalog(md5path_1 INTEGER, md5path_2 INTEGER, parent_1 INTEGER,
//!         parent_2 INTEGER, hash BLOB, name TEXT, ...)
//! nested_catalogs(path TEXT, sha1 TEXT, ...)
//! ```
//!
//! Other columns and tables are ignored.

use crate::error::{Error, Result};
use crate::hash::{ContentHash, Hash128};
use crate::record::{CatalogRecord, NestedCatalogRef};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashSet;
use std::io::Write;
use tracing::debug;

/// Leading bytes of every SQLite database file.
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Columns the `catalog` relation must provide.
const CATALOG_COLUMNS: [&str; 6] = [
    "md5path_1",
    "md5path_2",
    "parent_1",
    "parent_2",
    "hash",
    "name",
];

/// Columns the `nested_catalogs` relation must provide.
const NESTED_COLUMNS: [&str; 2] = ["path", "sha1"];

/// The parsed contents of one catalog blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Content hash the blob was fetched under.
    pub hash: ContentHash,
    /// Every directory entry in the catalog.
    pub records: Vec<CatalogRecord>,
    /// Delegations to nested catalogs.
    pub nested: Vec<NestedCatalogRef>,
}

/// Parse the decompressed bytes of one catalog.
///
/// `hash` only labels errors and the returned [`Catalog`]; the bytes are not
/// checked against it.
pub fn load_catalog(hash: ContentHash, bytes: &[u8]) -> Result<Catalog> {
    let label = hash.to_hex();

    if bytes.len() < SQLITE_MAGIC.len() || &bytes[..SQLITE_MAGIC.len()] != SQLITE_MAGIC {
        return Err(Error::malformed_catalog(label, "not a SQLite database"));
    }

    // SQLite needs a file; it is removed when `scratch` drops.
    let mut scratch = tempfile::NamedTempFile::new()?;
    scratch.write_all(bytes)?;
    scratch.flush()?;

    let sql_err = |e: rusqlite::Error| Error::malformed_catalog(label.clone(), e.to_string());

    let conn = Connection::open_with_flags(
        scratch.path(),
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(sql_err)?;

    require_columns(&conn, &label, "catalog", &CATALOG_COLUMNS)?;
    require_columns(&conn, &label, "nested_catalogs", &NESTED_COLUMNS)?;

    let records = read_records(&conn, &label)?;
    let nested = read_nested(&conn, &label)?;

    debug!(
        catalog = %label,
        records = records.len(),
        nested = nested.len(),
        "catalog loaded"
    );

    Ok(Catalog {
        hash,
        records,
        nested,
    })
}

/// Fail unless `table` exists with every column in `required`.
fn require_columns(conn: &Connection, label: &str, table: &str, required: &[&str]) -> Result<()> {
    let sql_err = |e: rusqlite::Error| Error::malformed_catalog(label, e.to_string());

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .map_err(sql_err)?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(sql_err)?
        .collect::<rusqlite::Result<HashSet<_>>>()
        .map_err(sql_err)?;

    if present.is_empty() {
        return Err(Error::malformed_catalog(
            label,
            format!("missing table: {}", table),
        ));
    }

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|column| !present.contains(*column))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::malformed_catalog(
            label,
            format!("table {} missing columns: {}", table, missing.join(", ")),
        ))
    }
}

fn read_records(conn: &Connection, label: &str) -> Result<Vec<CatalogRecord>> {
    let sql_err = |e: rusqlite::Error| Error::malformed_catalog(label, e.to_string());

    let mut stmt = conn
        .prepare("SELECT md5path_1, md5path_2, parent_1, parent_2, hash, name FROM catalog")
        .map_err(sql_err)?;
    let mut rows = stmt.query([]).map_err(sql_err)?;

    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(sql_err)? {
        let path_hash = Hash128::new(row.get(0).map_err(sql_err)?, row.get(1).map_err(sql_err)?);
        let parent_hash = Hash128::new(row.get(2).map_err(sql_err)?, row.get(3).map_err(sql_err)?);
        let blob: Option<Vec<u8>> = row.get(4).map_err(sql_err)?;
        let name = match row.get_ref(5).map_err(sql_err)? {
            ValueRef::Null => String::new(),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => decode_name(bytes),
            ValueRef::Integer(i) => i.to_string(),
            ValueRef::Real(f) => f.to_string(),
        };

        let content_hash = match blob.as_deref() {
            None | Some([]) => ContentHash::NONE,
            Some(bytes) => ContentHash::from_slice(bytes).map_err(|e| {
                Error::malformed_catalog(label, format!("entry {}: {}", path_hash, e))
            })?,
        };

        records.push(CatalogRecord::new(
            path_hash,
            parent_hash,
            content_hash,
            name,
        ));
    }

    Ok(records)
}

/// File names are raw bytes; invalid UTF-8 is replaced rather than rejected.
fn decode_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn read_nested(conn: &Connection, label: &str) -> Result<Vec<NestedCatalogRef>> {
    let sql_err = |e: rusqlite::Error| Error::malformed_catalog(label, e.to_string());

    let mut stmt = conn
        .prepare("SELECT path, sha1 FROM nested_catalogs")
        .map_err(sql_err)?;
    let mut rows = stmt.query([]).map_err(sql_err)?;

    let mut nested = Vec::new();
    while let Some(row) = rows.next().map_err(sql_err)? {
        let mount_path: String = row.get(0).map_err(sql_err)?;
        let sha1: String = row.get(1).map_err(sql_err)?;
        let catalog_hash = ContentHash::from_hex(sha1.trim()).map_err(|e| {
            Error::malformed_catalog(label, format!("nested catalog at {}: {}", mount_path, e))
        })?;
        nested.push(NestedCatalogRef::new(mount_path, catalog_hash));
    }

    Ok(nested)
}
