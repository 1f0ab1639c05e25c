//! Content hash lookups.

use crate::error::Result;
use crate::hash::ContentHash;
use crate::index::{GlobalIndex, parse_record_line};
use crate::record::CatalogRecord;
use std::io::BufRead;
use std::path::Path;

/// Every record in `index` whose content hash equals `target`, in path hash order.
///
/// No match is an empty result, not an error.
pub fn search<'a>(index: &'a GlobalIndex, target: &ContentHash) -> Vec<&'a CatalogRecord> {
    index.with_content(target).collect()
}

/// Scan artifact text for records with content hash `target`.
///
/// Lines are first filtered by a plain substring match on the hex digest, which
/// can also hit path or parent hashes and names. Every candidate is parsed and
/// its content hash compared exactly before it is returned.
pub fn prefilter_artifact<R: BufRead>(
    reader: R,
    target: &ContentHash,
    origin: &Path,
) -> Result<Vec<CatalogRecord>> {
    let needle = target.to_hex();
    let mut matches = Vec::new();

    // The header line carries the root hash, never a record.
    for line in reader.lines().skip(1) {
        let line = line?;
        if !line.contains(&needle) {
            continue;
        }

        let record = parse_record_line(&line, origin)?;
        if record.content_hash == *target {
            matches.push(record);
        }
    }

    Ok(matches)
}
