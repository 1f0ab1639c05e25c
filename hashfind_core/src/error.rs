//! Error types for hashfind_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using hashfind_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while indexing catalogs or resolving paths.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The blob source could not deliver an object.
    #[error("Failed to fetch {hash}: {reason}")]
    Fetch { hash: String, reason: String },

    /// A catalog blob could not be decompressed or does not have the catalog schema.
    #[error("Malformed catalog {hash}: {reason}")]
    MalformedCatalog { hash: String, reason: String },

    /// A nested catalog delegation or a parent chain loops back on itself.
    #[error("Cycle detected: {reason}")]
    CycleDetected { reason: String },

    /// The merged index violates path hash uniqueness or parent completeness.
    #[error("Index corruption: {reason}")]
    IndexCorruption { reason: String },

    /// A parent hash is missing from a completed index.
    #[error("Broken parent chain at {path_hash}: parent {parent_hash} not in index")]
    BrokenChain {
        path_hash: String,
        parent_hash: String,
    },

    /// Invalid hash format or encoding.
    #[error("Invalid hash: {reason}")]
    InvalidHash { reason: String },

    /// Store is invalid or not initialized.
    #[error("Invalid store at {path}: {reason}")]
    InvalidStore { path: PathBuf, reason: String },

    /// A published index artifact failed to parse.
    #[error("Corrupted index at {path}: {reason}")]
    CorruptedIndex { path: PathBuf, reason: String },

    /// No published index exists for a root hash.
    #[error("No published index for root {root}")]
    IndexNotFound { root: String },

    /// Repository manifest is missing required fields.
    #[error("Invalid manifest: {reason}")]
    InvalidManifest { reason: String },

    /// Compression or decompression of local data failed.
    #[error("Compression error: {reason}")]
    Compression { reason: String },
}

impl Error {
    /// Create a Fetch error.
    pub fn fetch(hash: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Fetch {
            hash: hash.into(),
            reason: reason.into(),
        }
    }

    /// Create a MalformedCatalog error.
    pub fn malformed_catalog(hash: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedCatalog {
            hash: hash.into(),
            reason: reason.into(),
        }
    }

    /// Create a CycleDetected error.
    pub fn cycle_detected(reason: impl Into<String>) -> Self {
        Error::CycleDetected {
            reason: reason.into(),
        }
    }

    /// Create an IndexCorruption error.
    pub fn index_corruption(reason: impl Into<String>) -> Self {
        Error::IndexCorruption {
            reason: reason.into(),
        }
    }

    /// Create a BrokenChain error.
    pub fn broken_chain(path_hash: impl Into<String>, parent_hash: impl Into<String>) -> Self {
        Error::BrokenChain {
            path_hash: path_hash.into(),
            parent_hash: parent_hash.into(),
        }
    }

    /// Create an InvalidHash error.
    pub fn invalid_hash(reason: impl Into<String>) -> Self {
        Error::InvalidHash {
            reason: reason.into(),
        }
    }

    /// Create an InvalidStore error.
    pub fn invalid_store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a CorruptedIndex error.
    pub fn corrupted_index(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptedIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an IndexNotFound error.
    pub fn index_not_found(root: impl Into<String>) -> Self {
        Error::IndexNotFound { root: root.into() }
    }

    /// Create an InvalidManifest error.
    pub fn invalid_manifest(reason: impl Into<String>) -> Self {
        Error::InvalidManifest {
            reason: reason.into(),
        }
    }

    /// Create a Compression error.
    pub fn compression_error(reason: impl Into<String>) -> Self {
        Error::Compression {
            reason: reason.into(),
        }
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}
