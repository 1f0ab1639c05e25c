//! Catalog entries and nested catalog delegations.

use crate::hash::{ContentHash, Hash128};

/// One directory entry from a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Key of this entry, unique across the merged tree.
    pub path_hash: Hash128,
    /// Key of the parent directory's entry (root sentinel for the tree root).
    pub parent_hash: Hash128,
    /// Content of a file, or the "no content" sentinel for directories.
    pub content_hash: ContentHash,
    /// Path segment contributed by this entry (empty for the root).
    pub name: String,
}

impl CatalogRecord {
    /// Create a new record.
    pub fn new(
        path_hash: Hash128,
        parent_hash: Hash128,
        content_hash: ContentHash,
        name: impl Into<String>,
    ) -> Self {
        Self {
            path_hash,
            parent_hash,
            content_hash,
            name: name.into(),
        }
    }

    /// Whether this record is a directory (carries no content).
    pub fn is_directory(&self) -> bool {
        self.content_hash.is_none()
    }
}

/// A delegation from a parent catalog to the nested catalog owning `mount_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedCatalogRef {
    /// Absolute path of the mount point inside the repository.
    pub mount_path: String,
    /// Content hash of the nested catalog blob.
    pub catalog_hash: ContentHash,
}

impl NestedCatalogRef {
    /// Create a new nested catalog reference.
    pub fn new(mount_path: impl Into<String>, catalog_hash: ContentHash) -> Self {
        Self {
            mount_path: mount_path.into(),
            catalog_hash,
        }
    }
}
