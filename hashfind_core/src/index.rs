//! The merged index of every catalog reachable from a root.
//!
//! Published artifacts are JSON lines (zstd-compressed by the store):
//!
//! ```text
//! {"format":1,"root":"<40 hex>","records":N}
//! {"path":"<32 hex>","parent":"<32 hex>","content":"<40 hex>","name":"..."}
//! ...
//! ```
//!
//! Records follow in ascending path hash order, so the same index always
//! serializes to the same bytes.

use crate::error::{Error, Result};
use crate::hash::{ContentHash, Hash128};
use crate::loader::Catalog;
use crate::record::CatalogRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::collections::btree_map::Entry;
use std::io::{BufRead, Write};
use std::path::Path;

/// Artifact format version.
pub const ARTIFACT_FORMAT: u32 = 1;

/// First line of an artifact.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactHeader {
    format: u32,
    root: String,
    records: usize,
}

/// One record line of an artifact.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactRecord {
    path: String,
    parent: String,
    content: String,
    name: String,
}

/// Every record reachable from one root catalog, keyed by path hash.
///
/// A second map from content hash to path hashes serves content lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalIndex {
    root: ContentHash,
    records: BTreeMap<Hash128, CatalogRecord>,
    by_content: HashMap<ContentHash, BTreeSet<Hash128>>,
}

impl GlobalIndex {
    /// Create an empty index for `root`.
    pub fn new(root: ContentHash) -> Self {
        Self {
            root,
            records: BTreeMap::new(),
            by_content: HashMap::new(),
        }
    }

    /// Hash of the root catalog this index was built from.
    pub fn root(&self) -> ContentHash {
        self.root
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by path hash.
    pub fn get(&self, path_hash: &Hash128) -> Option<&CatalogRecord> {
        self.records.get(path_hash)
    }

    /// Iterate over records in path hash order.
    pub fn records(&self) -> impl Iterator<Item = &CatalogRecord> {
        self.records.values()
    }

    /// Records whose content hash is `content`, in path hash order.
    pub fn with_content(&self, content: &ContentHash) -> impl Iterator<Item = &CatalogRecord> {
        self.by_content
            .get(content)
            .into_iter()
            .flatten()
            .filter_map(|path_hash| self.records.get(path_hash))
    }

    /// Insert one record.
    ///
    /// A nested catalog's root entry repeats the parent catalog's mount point
    /// entry, so an identical duplicate is accepted once. A duplicate path hash
    /// with different fields is `IndexCorruption`.
    pub fn insert(&mut self, record: CatalogRecord) -> Result<bool> {
        match self.records.entry(record.path_hash) {
            Entry::Vacant(slot) => {
                self.by_content
                    .entry(record.content_hash)
                    .or_default()
                    .insert(record.path_hash);
                slot.insert(record);
                Ok(true)
            }
            Entry::Occupied(existing) if *existing.get() == record => Ok(false),
            Entry::Occupied(existing) => Err(Error::index_corruption(format!(
                "path hash {} is claimed by both {:?} and {:?}",
                record.path_hash,
                existing.get().name,
                record.name
            ))),
        }
    }

    /// Merge every record of a loaded catalog; returns how many were new.
    pub fn merge_catalog(&mut self, catalog: Catalog) -> Result<usize> {
        let label = catalog.hash;
        let mut added = 0;
        for record in catalog.records {
            let inserted = self.insert(record).map_err(|e| match e {
                Error::IndexCorruption { reason } => {
                    Error::index_corruption(format!("catalog {}: {}", label, reason))
                }
                other => other,
            })?;
            if inserted {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Check that every non-root record's parent is present.
    pub fn check_parents(&self) -> Result<()> {
        let mut dangling = self
            .records
            .values()
            .filter(|r| !r.parent_hash.is_root() && !self.records.contains_key(&r.parent_hash));

        match dangling.next() {
            None => Ok(()),
            Some(first) => {
                let more = dangling.count();
                Err(Error::index_corruption(format!(
                    "entry {:?} ({}) has missing parent {}{}",
                    first.name,
                    first.path_hash,
                    first.parent_hash,
                    if more > 0 {
                        format!(" (and {} more dangling entries)", more)
                    } else {
                        String::new()
                    }
                )))
            }
        }
    }

    /// Write the artifact text (uncompressed).
    pub fn write_artifact<W: Write>(&self, mut writer: W) -> Result<()> {
        let header = ArtifactHeader {
            format: ARTIFACT_FORMAT,
            root: self.root.to_hex(),
            records: self.records.len(),
        };
        write_line(&mut writer, &header)?;

        for record in self.records.values() {
            let line = ArtifactRecord {
                path: record.path_hash.to_hex(),
                parent: record.parent_hash.to_hex(),
                content: record.content_hash.to_hex(),
                name: record.name.clone(),
            };
            write_line(&mut writer, &line)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Read artifact text; `origin` labels errors.
    pub fn read_artifact<R: BufRead>(reader: R, origin: &Path) -> Result<Self> {
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| Error::corrupted_index(origin, "empty artifact"))??;
        let header: ArtifactHeader = serde_json::from_str(&header_line)
            .map_err(|e| Error::corrupted_index(origin, format!("bad header: {}", e)))?;

        if header.format != ARTIFACT_FORMAT {
            return Err(Error::corrupted_index(
                origin,
                format!("unsupported artifact format: {}", header.format),
            ));
        }

        let root = ContentHash::from_hex(&header.root)
            .map_err(|e| Error::corrupted_index(origin, format!("bad root: {}", e)))?;

        let mut index = GlobalIndex::new(root);
        for line in lines {
            let record = parse_record_line(&line?, origin)?;
            let inserted = index
                .insert(record)
                .map_err(|e| match e {
                    Error::IndexCorruption { reason } => Error::corrupted_index(origin, reason),
                    other => other,
                })?;
            if !inserted {
                return Err(Error::corrupted_index(origin, "duplicate record line"));
            }
        }

        if index.len() != header.records {
            return Err(Error::corrupted_index(
                origin,
                format!(
                    "record count mismatch: header says {}, found {}",
                    header.records,
                    index.len()
                ),
            ));
        }

        Ok(index)
    }
}

fn write_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, value)
        .map_err(|e| Error::Io { source: e.into() })?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Parse one record line of an artifact.
pub(crate) fn parse_record_line(line: &str, origin: &Path) -> Result<CatalogRecord> {
    let bad = |reason: String| Error::corrupted_index(origin, reason);

    let raw: ArtifactRecord =
        serde_json::from_str(line).map_err(|e| bad(format!("bad record line: {}", e)))?;

    Ok(CatalogRecord::new(
        Hash128::from_hex(&raw.path).map_err(|e| bad(e.to_string()))?,
        Hash128::from_hex(&raw.parent).map_err(|e| bad(e.to_string()))?,
        ContentHash::from_hex(&raw.content).map_err(|e| bad(e.to_string()))?,
        raw.name,
    ))
}
