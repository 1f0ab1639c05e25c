//! Blob sources: where catalog bytes come from.
//!
//! Repository objects are stored zlib-compressed under
//! `data/<first 2 hex>/<remaining 38 hex>C`, and their content hash is the
//! SHA-1 of the compressed bytes. Every source hands out verified, inflated
//! catalog bytes.

use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::manifest::Manifest;
use flate2::read::ZlibDecoder;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Name of the repository manifest file.
pub const MANIFEST_NAME: &str = ".cvmfspublished";

/// The fetch capability the indexer depends on.
pub trait CatalogSource: Send + Sync {
    /// Return the decompressed bytes of the catalog stored under `hash`.
    fn fetch(&self, hash: &ContentHash) -> Result<Vec<u8>>;
}

impl<S: CatalogSource + ?Sized> CatalogSource for &S {
    fn fetch(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        (**self).fetch(hash)
    }
}

impl<S: CatalogSource + ?Sized> CatalogSource for Box<S> {
    fn fetch(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        (**self).fetch(hash)
    }
}

/// Relative location of a catalog object inside a repository.
pub fn catalog_object_path(hash: &ContentHash) -> String {
    format!("data/{}/{}C", hash.prefix(), hash.suffix())
}

/// Verify a stored object against its hash and inflate it.
pub fn decode_object(hash: &ContentHash, compressed: &[u8]) -> Result<Vec<u8>> {
    let actual = ContentHash::sha1_bytes(compressed);
    if actual != *hash {
        return Err(Error::fetch(
            hash.to_hex(),
            format!("content hash mismatch: got {}", actual.to_hex()),
        ));
    }

    let mut decoder = ZlibDecoder::new(compressed);
    let mut data = Vec::new();
    decoder
        .read_to_end(&mut data)
        .map_err(|e| Error::malformed_catalog(hash.to_hex(), format!("zlib: {}", e)))?;
    Ok(data)
}

/// An in-memory source holding already-decompressed catalogs.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    catalogs: HashMap<ContentHash, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert catalog bytes under their SHA-1 and return it.
    pub fn add(&mut self, bytes: Vec<u8>) -> ContentHash {
        let hash = ContentHash::sha1_bytes(&bytes);
        self.catalogs.insert(hash, bytes);
        hash
    }

    /// Insert catalog bytes under an arbitrary hash.
    pub fn insert(&mut self, hash: ContentHash, bytes: Vec<u8>) {
        self.catalogs.insert(hash, bytes);
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}

impl CatalogSource for MemorySource {
    fn fetch(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        self.catalogs
            .get(hash)
            .cloned()
            .ok_or_else(|| Error::fetch(hash.to_hex(), "not in memory source"))
    }
}

/// A repository mirrored to a local directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Open a mirror rooted at `root` (the directory containing `data/`).
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.join("data").is_dir() {
            return Err(Error::invalid_store(&root, "no data directory in mirror"));
        }
        Ok(Self { root })
    }

    /// Get the root directory of the mirror.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the mirror's manifest.
    pub fn manifest(&self) -> Result<Manifest> {
        let bytes = fs::read(self.root.join(MANIFEST_NAME))?;
        Manifest::parse(&bytes)
    }
}

impl CatalogSource for DirSource {
    fn fetch(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let path = self.root.join(catalog_object_path(hash));
        let compressed = fs::read(&path)
            .map_err(|e| Error::fetch(hash.to_hex(), format!("{}: {}", path.display(), e)))?;
        decode_object(hash, &compressed)
    }
}
