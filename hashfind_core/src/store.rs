//! Index store management and artifact I/O.

use crate::cache::{CachedSource, compress_zstd, decompress_zstd};
use crate::error::{Error, Result};
use crate::handle::IndexHandle;
use crate::hash::ContentHash;
use crate::index::GlobalIndex;
use crate::indexer::CatalogTreeIndexer;
use crate::record::CatalogRecord;
use crate::search::prefilter_artifact;
use crate::source::CatalogSource;
use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// File extension of published index artifacts.
pub const INDEX_EXTENSION: &str = "idx";

/// Settings read from the store's `config` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Indexing worker count (0 = one per CPU).
    pub jobs: usize,
    /// Timeout for HTTP blob sources.
    pub timeout: Duration,
    /// Whether fetched catalogs are kept under `objects/`.
    pub cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: 0,
            timeout: Duration::from_secs(30),
            cache: true,
        }
    }
}

impl Config {
    /// Parse `key=value` config text. `root` labels errors.
    pub fn parse(content: &str, root: &Path) -> Result<Self> {
        let mut version = None;
        let mut config = Config::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::invalid_store(
                    root,
                    format!("malformed config line: {:?}", line),
                ));
            };
            let value = value.trim();

            match key.trim() {
                "version" => version = Some(value.to_string()),
                "jobs" => {
                    config.jobs = value.parse().map_err(|_| {
                        Error::invalid_store(root, format!("invalid jobs value: {:?}", value))
                    })?;
                }
                "timeout_secs" => {
                    let secs: u64 = value.parse().map_err(|_| {
                        Error::invalid_store(root, format!("invalid timeout_secs value: {:?}", value))
                    })?;
                    config.timeout = Duration::from_secs(secs);
                }
                "cache" => {
                    config.cache = match value {
                        "on" => true,
                        "off" => false,
                        other => {
                            return Err(Error::invalid_store(
                                root,
                                format!("cache must be on or off, got {:?}", other),
                            ));
                        }
                    };
                }
                _ => {}
            }
        }

        if version.as_deref() != Some("1") {
            return Err(Error::invalid_store(
                root,
                format!("unsupported config version: {:?}", version),
            ));
        }

        Ok(config)
    }

    /// Render as config file text.
    pub fn to_file_string(&self) -> String {
        format!(
            "version=1\njobs={}\ntimeout_secs={}\ncache={}\n",
            self.jobs,
            self.timeout.as_secs(),
            if self.cache { "on" } else { "off" }
        )
    }
}

/// A published index found in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedIndex {
    pub root: ContentHash,
    pub path: PathBuf,
    /// Compressed artifact size in bytes.
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// A directory holding configuration, published indexes and the catalog cache.
#[derive(Debug)]
pub struct IndexStore {
    root: PathBuf,
    config: Config,
}

impl IndexStore {
    /// Initialize a new store at the given path.
    ///
    /// Creates the directory structure:
    /// - `indexes/` for published index artifacts
    /// - `objects/` for cached catalogs
    /// - `config` file with version and defaults
    pub fn init<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::init_with(root, Config::default())
    }

    /// Initialize a new store with explicit settings.
    pub fn init_with<P: AsRef<Path>>(root: P, config: Config) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("indexes"))?;
        fs::create_dir_all(root.join("objects"))?;
        fs::write(root.join("config"), config.to_file_string())?;

        debug!(store = %root.display(), "initialized store");
        Ok(Self { root, config })
    }

    /// Open an existing store at the given path.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(Error::invalid_store(&root, "directory does not exist"));
        }

        let config_path = root.join("config");
        if !config_path.exists() {
            return Err(Error::invalid_store(&root, "config file not found"));
        }
        let config = Config::parse(&fs::read_to_string(&config_path)?, &root)?;

        if !root.join("indexes").is_dir() {
            return Err(Error::invalid_store(&root, "indexes directory missing"));
        }

        Ok(Self { root, config })
    }

    /// Get the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the published artifact for `root`.
    ///
    /// Returns: `indexes/{root hex}.idx`
    pub fn index_path(&self, root: &ContentHash) -> PathBuf {
        self.root
            .join("indexes")
            .join(format!("{}.{}", root.to_hex(), INDEX_EXTENSION))
    }

    pub fn has_index(&self, root: &ContentHash) -> bool {
        self.index_path(root).is_file()
    }

    /// Directory backing the catalog cache.
    pub fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    /// Put the store's catalog cache in front of `inner`.
    pub fn cached_source<S: CatalogSource>(&self, inner: S) -> Result<CachedSource<S>> {
        CachedSource::new(inner, self.objects_dir())
    }

    /// Write `index` as the artifact for its root, replacing any previous one.
    ///
    /// The artifact is written to a temporary file in `indexes/` and renamed
    /// into place, so readers see the old artifact or the new one, never a mix.
    pub fn publish(&self, index: &GlobalIndex) -> Result<PathBuf> {
        let path = self.index_path(&index.root());
        let Some(dir) = path.parent() else {
            return Err(Error::invalid_store(&self.root, "index path has no parent"));
        };
        fs::create_dir_all(dir)?;

        let mut text = Vec::new();
        index.write_artifact(&mut text)?;
        let compressed = compress_zstd(&text)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
        temp_file.write_all(&compressed)?;
        temp_file.flush()?;
        temp_file.persist(&path)?;

        info!(
            root = %index.root(),
            records = index.len(),
            bytes = compressed.len(),
            "published index"
        );
        Ok(path)
    }

    /// Load the published index for `root`.
    pub fn load(&self, root: &ContentHash) -> Result<GlobalIndex> {
        let path = self.index_path(root);
        if !path.is_file() {
            return Err(Error::index_not_found(root.to_hex()));
        }

        let compressed = fs::read(&path)?;
        let text = decompress_zstd(&compressed)
            .map_err(|e| Error::corrupted_index(&path, e.to_string()))?;
        let index = GlobalIndex::read_artifact(&text[..], &path)?;

        if index.root() != *root {
            return Err(Error::corrupted_index(
                &path,
                format!("artifact is for root {}", index.root()),
            ));
        }

        debug!(root = %root, records = index.len(), "loaded index");
        Ok(index)
    }

    /// List published indexes, ordered by root hash.
    ///
    /// Files in `indexes/` that are not named after a root hash are skipped.
    pub fn list(&self) -> Result<Vec<PublishedIndex>> {
        let mut published = Vec::new();

        for entry in fs::read_dir(self.root.join("indexes"))? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some(INDEX_EXTENSION) {
                continue;
            }
            let Some(root) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| ContentHash::from_hex(s).ok())
            else {
                continue;
            };

            let metadata = entry.metadata()?;
            published.push(PublishedIndex {
                root,
                path,
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }

        published.sort_by(|a, b| a.root.cmp(&b.root));
        Ok(published)
    }

    /// Remove the published index for `root`; returns whether one existed.
    pub fn remove(&self, root: &ContentHash) -> Result<bool> {
        let path = self.index_path(root);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    /// Get a queryable index for `root`.
    ///
    /// A published index is reused without touching `source`. Otherwise the
    /// catalog tree is indexed and published before the handle is returned.
    pub fn build_index<S: CatalogSource + ?Sized>(
        &self,
        source: &S,
        root: ContentHash,
    ) -> Result<IndexHandle> {
        if self.has_index(&root) {
            let index = self.load(&root)?;
            return Ok(IndexHandle::new(index, true));
        }
        self.rebuild_index(source, root)
    }

    /// Index `root` from `source` and publish it, ignoring any published index.
    pub fn rebuild_index<S: CatalogSource + ?Sized>(
        &self,
        source: &S,
        root: ContentHash,
    ) -> Result<IndexHandle> {
        let index = CatalogTreeIndexer::new(source)
            .jobs(self.config.jobs)
            .build(root)?;
        self.publish(&index)?;
        Ok(IndexHandle::new(index, false))
    }

    /// Scan the published artifact for `root` for records with content `target`
    /// without loading the whole index.
    pub fn prefilter(&self, root: &ContentHash, target: &ContentHash) -> Result<Vec<CatalogRecord>> {
        let path = self.index_path(root);
        if !path.is_file() {
            return Err(Error::index_not_found(root.to_hex()));
        }

        let decoder = zstd::stream::read::Decoder::new(fs::File::open(&path)?)
            .map_err(|e| Error::corrupted_index(&path, e.to_string()))?;
        prefilter_artifact(BufReader::new(decoder), target, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{CatalogBuilder, mirror_catalog};
    use crate::hash::Hash128;
    use crate::source::{DirSource, MemorySource};
    use tempfile::TempDir;

    fn sample_source() -> (MemorySource, ContentHash, ContentHash) {
        let lib = ContentHash::sha1_bytes(b"lib");
        let mut source = MemorySource::new();
        let nested = source.add(
            CatalogBuilder::new()
                .dir(Hash128::new(2, 2), Hash128::new(1, 1), "pkg")
                .file(Hash128::new(3, 3), Hash128::new(2, 2), lib, "lib.so")
                .build(),
        );
        let root = source.add(
            CatalogBuilder::new()
                .dir(Hash128::new(1, 1), Hash128::ROOT, "")
                .dir(Hash128::new(2, 2), Hash128::new(1, 1), "pkg")
                .file(Hash128::new(4, 4), Hash128::new(1, 1), lib, "lib-copy.so")
                .nested("/pkg", nested)
                .build(),
        );
        (source, root, lib)
    }

    #[test]
    fn test_store_init() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();

        assert!(temp_dir.path().join("indexes").is_dir());
        assert!(temp_dir.path().join("objects").is_dir());
        assert!(temp_dir.path().join("config").exists());
        assert_eq!(store.config(), &Config::default());

        let config = fs::read_to_string(temp_dir.path().join("config")).unwrap();
        assert!(config.contains("version=1"));
        assert!(config.contains("cache=on"));
    }

    #[test]
    fn test_store_open() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            jobs: 3,
            timeout: Duration::from_secs(5),
            cache: false,
        };
        IndexStore::init_with(temp_dir.path(), config.clone()).unwrap();

        let store = IndexStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.config(), &config);
    }

    #[test]
    fn test_store_open_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let result = IndexStore::open(temp_dir.path().join("nonexistent"));
        assert!(matches!(result, Err(Error::InvalidStore { .. })));
    }

    #[test]
    fn test_store_open_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("indexes")).unwrap();
        assert!(IndexStore::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_config_parse() {
        let root = Path::new("store");
        let config = Config::parse(
            "# settings\nversion=1\njobs = 8\ntimeout_secs=12\ncache=off\nunknown=ignored\n",
            root,
        )
        .unwrap();
        assert_eq!(config.jobs, 8);
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert!(!config.cache);

        assert!(Config::parse("jobs=1\n", root).is_err());
        assert!(Config::parse("version=2\n", root).is_err());
        assert!(Config::parse("version=1\njobs=many\n", root).is_err());
        assert!(Config::parse("version=1\ncache=maybe\n", root).is_err());
        assert!(Config::parse("version=1\njust text\n", root).is_err());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let config = Config {
            jobs: 2,
            timeout: Duration::from_secs(90),
            cache: false,
        };
        let parsed = Config::parse(&config.to_file_string(), Path::new("x")).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_build_index_and_find_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();
        let (source, root, lib) = sample_source();

        let handle = store.build_index(&source, root).unwrap();
        assert!(!handle.reused());
        assert_eq!(
            handle.find_paths(&lib),
            vec!["/lib-copy.so".to_string(), "/pkg/lib.so".to_string()]
        );
        assert!(store.has_index(&root));
    }

    #[test]
    fn test_build_index_reuses_published() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();
        let (source, root, lib) = sample_source();

        let first = store.build_index(&source, root).unwrap();

        // An empty source would fail any fetch, so success means nothing was fetched.
        let second = store.build_index(&MemorySource::new(), root).unwrap();
        assert!(second.reused());
        assert_eq!(second.index(), first.index());
        assert_eq!(second.find_paths(&lib), first.find_paths(&lib));
    }

    #[test]
    fn test_failed_build_publishes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();

        let mut source = MemorySource::new();
        let root = source.add(
            CatalogBuilder::new()
                .dir(Hash128::new(1, 1), Hash128::ROOT, "")
                .nested("/gone", ContentHash::sha1_bytes(b"missing"))
                .build(),
        );

        assert!(store.build_index(&source, root).is_err());
        assert!(!store.has_index(&root));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_republish_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();
        let (source, root, _) = sample_source();

        let path = store.index_path(&root);
        store.rebuild_index(&source, root).unwrap();
        let first = fs::read(&path).unwrap();

        store.rebuild_index(&source, root).unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_missing_index() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();
        let root = ContentHash::sha1_bytes(b"nothing");

        assert!(matches!(store.load(&root), Err(Error::IndexNotFound { .. })));
        assert!(matches!(
            store.prefilter(&root, &ContentHash::NONE),
            Err(Error::IndexNotFound { .. })
        ));
    }

    #[test]
    fn test_load_corrupted_index() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();
        let root = ContentHash::sha1_bytes(b"root");

        fs::write(store.index_path(&root), b"garbage").unwrap();
        assert!(matches!(store.load(&root), Err(Error::CorruptedIndex { .. })));
    }

    #[test]
    fn test_load_rejects_misnamed_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();
        let (source, root, _) = sample_source();
        store.rebuild_index(&source, root).unwrap();

        let other = ContentHash::sha1_bytes(b"other");
        fs::copy(store.index_path(&root), store.index_path(&other)).unwrap();
        assert!(matches!(store.load(&other), Err(Error::CorruptedIndex { .. })));
    }

    #[test]
    fn test_list_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();
        let (source, root, _) = sample_source();
        store.build_index(&source, root).unwrap();
        fs::write(temp_dir.path().join("indexes").join("notes.txt"), b"x").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].root, root);
        assert!(listed[0].size > 0);

        assert!(store.remove(&root).unwrap());
        assert!(!store.remove(&root).unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_prefilter_matches_search() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::init(temp_dir.path()).unwrap();
        let (source, root, lib) = sample_source();
        let handle = store.build_index(&source, root).unwrap();

        let scanned = store.prefilter(&root, &lib).unwrap();
        let searched: Vec<CatalogRecord> = handle.search(&lib).into_iter().cloned().collect();
        assert_eq!(scanned, searched);
        assert_eq!(scanned.len(), 2);
    }

    #[test]
    fn test_build_through_cache() {
        let temp_dir = TempDir::new().unwrap();
        let mirror = temp_dir.path().join("mirror");
        let readme = ContentHash::sha1_bytes(b"readme");
        let root = mirror_catalog(
            &mirror,
            &CatalogBuilder::new()
                .dir(Hash128::new(1, 1), Hash128::ROOT, "")
                .file(Hash128::new(2, 2), Hash128::new(1, 1), readme, "readme.txt")
                .build(),
        );

        let store = IndexStore::init(temp_dir.path().join("store")).unwrap();
        let source = store.cached_source(DirSource::open(&mirror).unwrap()).unwrap();
        let handle = store.rebuild_index(&source, root).unwrap();

        assert_eq!(handle.find_paths(&readme), vec!["/readme.txt".to_string()]);
        assert_eq!(source.stats().misses, 1);
        assert!(source.object_path(&root).exists());
    }
}
