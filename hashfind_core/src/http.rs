//! HTTP blob source for remote repositories.

use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::manifest::Manifest;
use crate::source::{CatalogSource, MANIFEST_NAME, catalog_object_path, decode_object};
use std::time::Duration;
use tracing::debug;

/// Marker separating the repository URL from an object name.
const DATA_MARKER: &str = "/data/";

/// A repository served over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    /// Create a source for the repository at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::fetch(base_url, format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Get the repository base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Download and parse the repository manifest.
    pub fn manifest(&self) -> Result<Manifest> {
        let url = format!("{}/{}", self.base_url, MANIFEST_NAME);
        let bytes = self.get(&url, MANIFEST_NAME)?;
        Manifest::parse(&bytes)
    }

    fn get(&self, url: &str, label: &str) -> Result<Vec<u8>> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::fetch(label, e.to_string()))?;

        let bytes = response
            .bytes()
            .map_err(|e| Error::fetch(label, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl CatalogSource for HttpSource {
    fn fetch(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, catalog_object_path(hash));
        let compressed = self.get(&url, &hash.to_hex())?;
        decode_object(hash, &compressed)
    }
}

/// Split an object URL into the repository URL and the object's content hash.
///
/// `http://host/repo/data/ab/cdef...` yields `("http://host/repo", abcdef...)`.
pub fn split_object_url(url: &str) -> Result<(String, ContentHash)> {
    let (repo, object) = url
        .rsplit_once(DATA_MARKER)
        .ok_or_else(|| Error::invalid_hash(format!("no {} in object URL: {}", DATA_MARKER, url)))?;

    let hash = ContentHash::from_object_name(object)?;
    Ok((repo.to_string(), hash))
}
