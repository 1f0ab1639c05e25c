//! Path reconstruction by walking parent hashes.

use crate::error::{Error, Result};
use crate::index::GlobalIndex;
use crate::record::CatalogRecord;

/// Path separator used in resolved paths.
pub const SEPARATOR: char = '/';

/// Resolve the absolute path of `record` within `index`.
///
/// Walks parent hashes until the root sentinel. A walk longer than the
/// number of records in the index must revisit an entry and fails with
/// `CycleDetected`; a parent missing from the index fails with `BrokenChain`.
/// The root entry itself resolves to `/`.
pub fn resolve(index: &GlobalIndex, record: &CatalogRecord) -> Result<String> {
    let max_steps = index.len().saturating_add(1);
    let mut segments = vec![record.name.as_str()];
    let mut current = record;
    let mut steps = 0usize;

    while !current.parent_hash.is_root() {
        steps += 1;
        if steps > max_steps {
            return Err(Error::cycle_detected(format!(
                "parent chain of {} exceeds {} steps",
                record.path_hash, max_steps
            )));
        }

        current = index.get(&current.parent_hash).ok_or_else(|| {
            Error::broken_chain(current.path_hash.to_hex(), current.parent_hash.to_hex())
        })?;
        segments.push(current.name.as_str());
    }

    let mut path = String::new();
    for segment in segments.iter().rev().filter(|s| !s.is_empty()) {
        path.push(SEPARATOR);
        path.push_str(segment);
    }

    if path.is_empty() {
        path.push(SEPARATOR);
    }

    Ok(path)
}
