//! # Hashfind Core
//!
//! Finds every path in a content-addressed filesystem snapshot that points at a
//! given content hash.
//!
//! A snapshot is a tree of catalogs. Each catalog is a SQLite table of
//! directory entries keyed by path hash and linked to their parent by hash; some
//! entries delegate a subtree to a nested catalog identified by its own content
//! hash. This library merges every catalog reachable from a root into one flat
//! index and reconstructs full paths by walking parent hashes back to the root.
//!
//! ## Features
//!
//! - Recursive, parallel discovery of nested catalogs with cycle detection
//! - One deterministic index per root catalog, published atomically and reused
//! - Exact content hash search with path reconstruction across catalog boundaries
//! - Catalog sources for local mirrors and HTTP repositories, with an on-disk cache
//!
//! ## Example
//!
//! ```no_run
//! use hashfind_core::{ContentHash, DirSource, IndexStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Initialize an index store
//! let store = IndexStore::init("./hashfind-store")?;
//!
//! // Index the current revision of a mirrored repository
//! let mirror = DirSource::open("./mirror")?;
//! let root = mirror.manifest()?.root_catalog;
//! let handle = store.build_index(&mirror, root)?;
//!
//! // Find every path holding a piece of content
//! let target = ContentHash::from_hex("2fd4e1c67a2d28fced849ee1bb76e7391b93eb12")?;
//! for path in handle.find_paths(&target) {
//!     println!("{}", path);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod error;
#[cfg(test)]
mod fixtures;
mod handle;
mod hash;
mod http;
mod index;
mod indexer;
mod loader;
mod manifest;
mod record;
mod resolve;
mod search;
mod source;
mod store;

pub use cache::{CacheStats, CachedSource};
pub use error::{Error, Result};
pub use handle::{IndexHandle, Resolution, ResolveFailure, VerifyReport};
pub use hash::{CONTENT_HASH_SIZE, ContentHash, Hash128};
pub use http::{HttpSource, split_object_url};
pub use index::{ARTIFACT_FORMAT, GlobalIndex};
pub use indexer::{CatalogTreeIndexer, MAX_NESTING_DEPTH};
pub use loader::{Catalog, load_catalog};
pub use manifest::Manifest;
pub use record::{CatalogRecord, NestedCatalogRef};
pub use resolve::{SEPARATOR, resolve};
pub use search::{prefilter_artifact, search};
pub use source::{CatalogSource, DirSource, MANIFEST_NAME, MemorySource, catalog_object_path, decode_object};
pub use store::{Config, INDEX_EXTENSION, IndexStore, PublishedIndex};
