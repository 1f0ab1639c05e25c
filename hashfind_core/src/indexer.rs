//! Recursive catalog discovery and merging.

use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::index::GlobalIndex;
use crate::loader::{Catalog, load_catalog};
use crate::source::CatalogSource;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

/// Deepest allowed chain of nested catalog delegations.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Builds a [`GlobalIndex`] from a root catalog and everything it delegates to.
///
/// Catalogs are loaded one delegation level at a time, with the catalogs of a
/// level fetched and parsed in parallel. Each distinct catalog is fetched once
/// per build, however many mount points delegate to it. Nothing is merged
/// until the whole tree has loaded and its delegations are known to be
/// acyclic, so a failure anywhere leaves no partial index behind.
pub struct CatalogTreeIndexer<'a, S: ?Sized> {
    source: &'a S,
    jobs: usize,
}

impl<'a, S: CatalogSource + ?Sized> CatalogTreeIndexer<'a, S> {
    /// Create an indexer reading catalogs from `source`.
    pub fn new(source: &'a S) -> Self {
        Self { source, jobs: 0 }
    }

    /// Set the worker count (0 = one per CPU).
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Index every catalog reachable from `root`.
    pub fn build(&self, root: ContentHash) -> Result<GlobalIndex> {
        let started = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("hashfind-index-{}", i))
            .build()
            .map_err(|e| Error::Io {
                source: std::io::Error::other(format!("indexing thread pool: {}", e)),
            })?;

        let mut catalogs = pool.install(|| self.load_tree(root))?;
        check_nesting(&catalogs, root)?;

        let order = preorder(&catalogs, root);
        let catalog_count = order.len();

        let mut index = GlobalIndex::new(root);
        for hash in order {
            if let Some(catalog) = catalogs.remove(&hash) {
                index.merge_catalog(catalog)?;
            }
        }
        index.check_parents()?;

        info!(
            root = %root,
            catalogs = catalog_count,
            records = index.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "index built"
        );

        Ok(index)
    }

    /// Fetch and parse every distinct catalog reachable from `root`.
    fn load_tree(&self, root: ContentHash) -> Result<HashMap<ContentHash, Catalog>> {
        let mut loaded = HashMap::new();
        let mut seen = HashSet::from([root]);
        let mut frontier = vec![root];
        let mut depth = 0usize;

        while !frontier.is_empty() {
            // Level `depth` is only reachable through `depth` delegations.
            if depth >= MAX_NESTING_DEPTH {
                return Err(Error::cycle_detected(format!(
                    "catalog nesting deeper than {} at {}",
                    MAX_NESTING_DEPTH, frontier[0]
                )));
            }

            let level = frontier
                .par_iter()
                .map(|hash| self.load(*hash, depth))
                .collect::<Result<Vec<_>>>()?;

            let mut next = Vec::new();
            for catalog in level {
                for nested in &catalog.nested {
                    if seen.insert(nested.catalog_hash) {
                        next.push(nested.catalog_hash);
                    }
                }
                loaded.insert(catalog.hash, catalog);
            }

            frontier = next;
            depth += 1;
        }

        Ok(loaded)
    }

    fn load(&self, hash: ContentHash, depth: usize) -> Result<Catalog> {
        let bytes = self.source.fetch(&hash)?;
        let catalog = load_catalog(hash, &bytes)?;

        debug!(
            catalog = %hash,
            depth,
            nested = catalog.nested.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }
}

/// Reject delegation cycles and chains longer than [`MAX_NESTING_DEPTH`].
fn check_nesting(catalogs: &HashMap<ContentHash, Catalog>, root: ContentHash) -> Result<()> {
    let mut heights = HashMap::new();
    let mut ancestors = Vec::new();
    chain_height(catalogs, root, &mut ancestors, &mut heights)?;
    Ok(())
}

/// Number of catalogs on the longest delegation chain starting at `hash`.
///
/// `ancestors` holds the catalogs on the chain from the root to `hash`.
fn chain_height(
    catalogs: &HashMap<ContentHash, Catalog>,
    hash: ContentHash,
    ancestors: &mut Vec<ContentHash>,
    heights: &mut HashMap<ContentHash, usize>,
) -> Result<usize> {
    if let Some(&height) = heights.get(&hash) {
        if ancestors.len() + height > MAX_NESTING_DEPTH {
            return Err(Error::cycle_detected(format!(
                "catalog nesting deeper than {} below {}",
                MAX_NESTING_DEPTH, hash
            )));
        }
        return Ok(height);
    }
    if ancestors.contains(&hash) {
        return Err(Error::cycle_detected(format!(
            "catalog {} delegates back to itself through {} ancestor(s)",
            hash,
            ancestors.len()
        )));
    }
    if ancestors.len() >= MAX_NESTING_DEPTH {
        return Err(Error::cycle_detected(format!(
            "catalog nesting deeper than {} at {}",
            MAX_NESTING_DEPTH, hash
        )));
    }

    ancestors.push(hash);
    let mut height = 1;
    if let Some(catalog) = catalogs.get(&hash) {
        for nested in &catalog.nested {
            let below = chain_height(catalogs, nested.catalog_hash, ancestors, heights)?;
            height = height.max(below + 1);
        }
    }
    ancestors.pop();

    heights.insert(hash, height);
    Ok(height)
}

/// Distinct catalogs in delegation preorder, parent before children.
fn preorder(catalogs: &HashMap<ContentHash, Catalog>, root: ContentHash) -> Vec<ContentHash> {
    let mut order = Vec::with_capacity(catalogs.len());
    let mut seen = HashSet::new();
    let mut stack = vec![root];

    while let Some(hash) = stack.pop() {
        if !seen.insert(hash) {
            continue;
        }
        order.push(hash);
        if let Some(catalog) = catalogs.get(&hash) {
            stack.extend(catalog.nested.iter().rev().map(|n| n.catalog_hash));
        }
    }

    order
}
