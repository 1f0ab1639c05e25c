//! Test helpers for building catalog databases and repository mirrors.

use crate::hash::{ContentHash, Hash128};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use rusqlite::{Connection, params};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Schema shaped like a real catalog, including columns the loader ignores.
const CATALOG_SCHEMA: &str = "
    CREATE TABLE catalog (
        md5path_1 INTEGER, md5path_2 INTEGER, parent_1 INTEGER, parent_2 INTEGER,
        hardlinks INTEGER, hash BLOB, size INTEGER, mode INTEGER, mtime INTEGER,
        flags INTEGER, name TEXT, symlink TEXT, uid INTEGER, gid INTEGER
    );
    CREATE TABLE nested_catalogs (path TEXT, sha1 TEXT, size INTEGER);
    CREATE TABLE properties (key TEXT, value TEXT);
";

type RawEntry = (Hash128, Hash128, Option<Vec<u8>>, Option<String>);

/// Builds the bytes of one catalog database.
#[derive(Default)]
pub(crate) struct CatalogBuilder {
    entries: Vec<RawEntry>,
    nested: Vec<(String, String)>,
}

impl CatalogBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a directory entry (NULL content hash).
    pub(crate) fn dir(self, path: Hash128, parent: Hash128, name: &str) -> Self {
        self.raw_entry(path, parent, None, Some(name))
    }

    /// Add a file entry.
    pub(crate) fn file(self, path: Hash128, parent: Hash128, content: ContentHash, name: &str) -> Self {
        self.raw_entry(path, parent, Some(content.as_bytes().to_vec()), Some(name))
    }

    pub(crate) fn raw_entry(
        mut self,
        path: Hash128,
        parent: Hash128,
        hash: Option<Vec<u8>>,
        name: Option<&str>,
    ) -> Self {
        self.entries
            .push((path, parent, hash, name.map(str::to_string)));
        self
    }

    /// Add a nested catalog delegation.
    pub(crate) fn nested(self, mount: &str, catalog: ContentHash) -> Self {
        self.raw_nested(mount, &catalog.to_hex())
    }

    pub(crate) fn raw_nested(mut self, mount: &str, sha1: &str) -> Self {
        self.nested.push((mount.to_string(), sha1.to_string()));
        self
    }

    /// Produce the database file bytes.
    pub(crate) fn build(self) -> Vec<u8> {
        with_database(CATALOG_SCHEMA, |conn| {
            for (path, parent, hash, name) in &self.entries {
                conn.execute(
                    "INSERT INTO catalog (md5path_1, md5path_2, parent_1, parent_2, hardlinks,
                                          hash, size, mode, mtime, flags, name, symlink, uid, gid)
                     VALUES (?1, ?2, ?3, ?4, 0, ?5, 0, 420, 0, 0, ?6, '', 0, 0)",
                    params![
                        path.part_a,
                        path.part_b,
                        parent.part_a,
                        parent.part_b,
                        hash,
                        name
                    ],
                )
                .unwrap();
            }
            for (mount, sha1) in &self.nested {
                conn.execute(
                    "INSERT INTO nested_catalogs (path, sha1, size) VALUES (?1, ?2, 0)",
                    params![mount, sha1],
                )
                .unwrap();
            }
        })
    }

    /// Bytes of a database created by arbitrary SQL.
    pub(crate) fn sqlite_bytes(sql: &str) -> Vec<u8> {
        with_database(sql, |_| {})
    }
}

fn with_database(schema: &str, fill: impl FnOnce(&Connection)) -> Vec<u8> {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(schema).unwrap();
        fill(&conn);
    }
    fs::read(&db_path).unwrap()
}

/// zlib-compress bytes the way repository objects are stored.
pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Store a catalog in a mirror directory; returns its content hash.
pub(crate) fn mirror_catalog(mirror: &Path, catalog: &[u8]) -> ContentHash {
    let compressed = zlib(catalog);
    let hash = ContentHash::sha1_bytes(&compressed);
    let shard = mirror.join("data").join(hash.prefix());
    fs::create_dir_all(&shard).unwrap();
    fs::write(shard.join(format!("{}C", hash.suffix())), compressed).unwrap();
    hash
}

/// Write a minimal manifest naming `root` as the root catalog.
pub(crate) fn mirror_manifest(mirror: &Path, root: ContentHash) {
    let manifest = format!(
        "C{}\nB4096\nRd41d8cd98f00b204e9800998ecf8427e\nD240\nS7\nNtest.example.org\nT1700000000\n--\n0123456789abcdef\n\u{1}\u{2}binary",
        root.to_hex()
    );
    fs::write(mirror.join(".cvmfspublished"), manifest).unwrap();
}
