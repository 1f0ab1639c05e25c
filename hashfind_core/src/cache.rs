//! On-disk cache in front of a blob source.

use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::source::CatalogSource;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Hit and miss counts of a [`CachedSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Keeps decompressed catalogs from `inner` under `objects/<prefix>/<suffix>`.
///
/// Objects are content-addressed, so entries never need invalidation.
/// The cache is owned by whoever builds the index; nothing is shared globally.
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    root: PathBuf,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<S: CatalogSource> CachedSource<S> {
    /// Wrap `inner`, caching into `root` (created if needed).
    pub fn new<P: AsRef<Path>>(inner: S, root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            inner,
            root,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        })
    }

    /// Get the path to a cached object given its hash.
    pub fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.prefix()).join(hash.suffix())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn read_cached(&self, path: &Path) -> Result<Vec<u8>> {
        let compressed = fs::read(path)?;
        decompress_zstd(&compressed)
    }

    /// Write an object atomically using tempfile.
    fn write_cached(&self, path: &Path, data: &[u8]) -> Result<()> {
        let Some(parent) = path.parent() else {
            return Err(Error::invalid_store(path, "cache object has no parent directory"));
        };
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(&compress_zstd(data)?)?;
        temp_file.flush()?;
        temp_file.persist(path)?;

        Ok(())
    }
}

impl<S: CatalogSource> CatalogSource for CachedSource<S> {
    fn fetch(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let path = self.object_path(hash);

        if path.exists() {
            match self.read_cached(&path) {
                Ok(data) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(object = %hash, "cache hit");
                    return Ok(data);
                }
                Err(e) => {
                    warn!(object = %hash, error = %e, "dropping unreadable cache entry");
                    let _ = fs::remove_file(&path);
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let data = self.inner.fetch(hash)?;

        // Cache write failures are not fatal.
        if let Err(e) = self.write_cached(&path, &data) {
            warn!(object = %hash, error = %e, "failed to cache object");
        }

        Ok(data)
    }
}

/// Compress data using zstd.
pub(crate) fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, 3) // Level 3 = fast compression
        .map_err(|e| Error::compression_error(format!("zstd compression failed: {}", e)))
}

/// Decompress data using zstd.
pub(crate) fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data)
        .map_err(|e| Error::compression_error(format!("zstd decompression failed: {}", e)))
}
