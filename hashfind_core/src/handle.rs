//! Queries against a built or loaded index.

use crate::error::Error;
use crate::hash::ContentHash;
use crate::index::GlobalIndex;
use crate::record::CatalogRecord;
use crate::resolve::resolve;
use crate::search::search;
use tracing::warn;

/// A candidate record whose path could not be resolved.
#[derive(Debug)]
pub struct ResolveFailure {
    pub record: CatalogRecord,
    pub error: Error,
}

/// Every candidate for one content hash, resolved independently.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Resolved paths, sorted; one per candidate, so a path may repeat.
    pub paths: Vec<String>,
    pub failures: Vec<ResolveFailure>,
}

/// Result of walking every record of an index.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub records: usize,
    pub directories: usize,
    pub files: usize,
    pub failures: Vec<ResolveFailure>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// An immutable index ready for lookups.
#[derive(Debug)]
pub struct IndexHandle {
    index: GlobalIndex,
    reused: bool,
}

impl IndexHandle {
    pub fn new(index: GlobalIndex, reused: bool) -> Self {
        Self { index, reused }
    }

    /// Hash of the root catalog the index covers.
    pub fn root(&self) -> ContentHash {
        self.index.root()
    }

    pub fn index(&self) -> &GlobalIndex {
        &self.index
    }

    /// Whether the index came from a published artifact rather than a fresh build.
    pub fn reused(&self) -> bool {
        self.reused
    }

    /// Records whose content hash is `target`.
    pub fn search(&self, target: &ContentHash) -> Vec<&CatalogRecord> {
        search(&self.index, target)
    }

    /// Every path pointing at `target`, sorted.
    ///
    /// Candidates that fail to resolve are logged and left out.
    pub fn find_paths(&self, target: &ContentHash) -> Vec<String> {
        self.resolve_all(target).paths
    }

    /// Resolve every candidate for `target`, keeping failures alongside paths.
    pub fn resolve_all(&self, target: &ContentHash) -> Resolution {
        let mut resolution = Resolution::default();

        for record in self.search(target) {
            match resolve(&self.index, record) {
                Ok(path) => resolution.paths.push(path),
                Err(error) => {
                    warn!(
                        target = %target,
                        path_hash = %record.path_hash,
                        error = %error,
                        "candidate could not be resolved"
                    );
                    resolution.failures.push(ResolveFailure {
                        record: record.clone(),
                        error,
                    });
                }
            }
        }

        resolution.paths.sort();
        resolution
    }

    /// Resolve every record in the index.
    pub fn verify(&self) -> VerifyReport {
        let mut report = VerifyReport::default();

        for record in self.index.records() {
            report.records += 1;
            if record.is_directory() {
                report.directories += 1;
            } else {
                report.files += 1;
            }

            if let Err(error) = resolve(&self.index, record) {
                report.failures.push(ResolveFailure {
                    record: record.clone(),
                    error,
                });
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash128;

    fn handle() -> (IndexHandle, ContentHash) {
        let shared = ContentHash::sha1_bytes(b"shared");
        let mut index = GlobalIndex::new(ContentHash::sha1_bytes(b"root"));
        index
            .insert(CatalogRecord::new(Hash128::new(1, 1), Hash128::ROOT, ContentHash::NONE, ""))
            .unwrap();
        index
            .insert(CatalogRecord::new(Hash128::new(2, 2), Hash128::new(1, 1), ContentHash::NONE, "b"))
            .unwrap();
        index
            .insert(CatalogRecord::new(Hash128::new(3, 3), Hash128::new(2, 2), shared, "z.txt"))
            .unwrap();
        index
            .insert(CatalogRecord::new(Hash128::new(4, 4), Hash128::new(1, 1), shared, "a.txt"))
            .unwrap();
        (IndexHandle::new(index, false), shared)
    }

    #[test]
    fn test_find_paths_sorted() {
        let (handle, shared) = handle();
        assert_eq!(handle.find_paths(&shared), vec!["/a.txt", "/b/z.txt"]);
        assert!(handle.find_paths(&ContentHash::sha1_bytes(b"absent")).is_empty());
    }

    #[test]
    fn test_broken_candidate_does_not_hide_others() {
        let (handle, shared) = handle();
        let mut index = handle.index().clone();
        index
            .insert(CatalogRecord::new(Hash128::new(9, 9), Hash128::new(8, 8), shared, "stray"))
            .unwrap();
        let handle = IndexHandle::new(index, false);

        let resolution = handle.resolve_all(&shared);
        assert_eq!(resolution.paths, vec!["/a.txt", "/b/z.txt"]);
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].record.name, "stray");
        assert!(matches!(resolution.failures[0].error, Error::BrokenChain { .. }));

        assert_eq!(handle.find_paths(&shared), vec!["/a.txt", "/b/z.txt"]);
    }

    #[test]
    fn test_same_path_from_two_records_is_kept() {
        let (handle, shared) = handle();
        let mut index = handle.index().clone();
        // A distinct entry with the same name under the same parent.
        index
            .insert(CatalogRecord::new(Hash128::new(6, 6), Hash128::new(1, 1), shared, "a.txt"))
            .unwrap();
        let handle = IndexHandle::new(index, false);

        assert_eq!(handle.search(&shared).len(), 3);
        assert_eq!(handle.find_paths(&shared), vec!["/a.txt", "/a.txt", "/b/z.txt"]);
    }

    #[test]
    fn test_verify() {
        let (handle, _) = handle();
        let report = handle.verify();
        assert!(report.is_ok());
        assert_eq!(report.records, 4);
        assert_eq!(report.directories, 2);
        assert_eq!(report.files, 2);

        let mut index = handle.index().clone();
        index
            .insert(CatalogRecord::new(Hash128::new(5, 5), Hash128::new(5, 5), ContentHash::NONE, "loop"))
            .unwrap();
        let report = IndexHandle::new(index, true).verify();
        assert!(!report.is_ok());
        assert!(matches!(report.failures[0].error, Error::CycleDetected { .. }));
    }
}
