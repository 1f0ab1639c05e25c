//! Repository manifest parsing.
//!
//! The manifest is a line-oriented text header followed by a signature:
//!
//! ```text
//! C<root catalog hash>
//! N<repository name>
//! S<revision>
//! T<publish timestamp>
//! ...
//! --
//! <signature, possibly binary>
//! ```
//!
//! Each header line starts with a one-letter key. Everything after the `--`
//! line is ignored.

use crate::error::{Error, Result};
use crate::hash::ContentHash;

/// The fields of a manifest that matter for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Hash of the root catalog of the current revision.
    pub root_catalog: ContentHash,
    /// Repository name (`N`).
    pub name: Option<String>,
    /// Revision number (`S`).
    pub revision: Option<u64>,
    /// Publish time in seconds since the epoch (`T`).
    pub published_at: Option<i64>,
}

impl Manifest {
    /// Parse a manifest from raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut root_catalog = None;
        let mut name = None;
        let mut revision = None;
        let mut published_at = None;

        for raw in bytes.split(|b| *b == b'\n') {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw == b"--" {
                break;
            }

            let line = String::from_utf8_lossy(raw);
            let line = line.trim();
            let Some(key) = line.chars().next() else {
                continue;
            };
            let value = &line[key.len_utf8()..];

            match key {
                'C' => {
                    let hash = ContentHash::from_object_name(value).map_err(|e| {
                        Error::invalid_manifest(format!("bad root catalog hash: {}", e))
                    })?;
                    root_catalog = Some(hash);
                }
                'N' => name = Some(value.to_string()),
                'S' => {
                    revision = Some(value.parse::<u64>().map_err(|_| {
                        Error::invalid_manifest(format!("bad revision: {}", value))
                    })?)
                }
                'T' => {
                    published_at = Some(value.parse::<i64>().map_err(|_| {
                        Error::invalid_manifest(format!("bad timestamp: {}", value))
                    })?)
                }
                _ => {}
            }
        }

        let root_catalog =
            root_catalog.ok_or_else(|| Error::invalid_manifest("missing root catalog (C)"))?;

        Ok(Self {
            root_catalog,
            name,
            revision,
            published_at,
        })
    }
}
