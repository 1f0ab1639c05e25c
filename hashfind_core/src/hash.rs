//! Path hashes and content hashes.

use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt;

/// Content hash digest size in bytes (SHA-1).
pub const CONTENT_HASH_SIZE: usize = 20;

/// A 128-bit path hash made of two signed 64-bit halves.
///
/// Catalogs store the hash of an entry's full path split into two integer
/// columns. The all-zero value is the root sentinel: a parent hash equal to it
/// means "no parent". The tree root carries it, and so does any top-level entry
/// whose parent is left unset; a parent walk stops at either. The root entry
/// itself may also be keyed by the sentinel.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash128 {
    pub part_a: i64,
    pub part_b: i64,
}

impl Hash128 {
    /// The root sentinel.
    pub const ROOT: Hash128 = Hash128 {
        part_a: 0,
        part_b: 0,
    };

    /// Create a path hash from its two halves.
    pub const fn new(part_a: i64, part_b: i64) -> Self {
        Self { part_a, part_b }
    }

    /// Whether this is the root sentinel.
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    /// Parse from 32 hex characters (`part_a` then `part_b`, big-endian).
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != 32 {
            return Err(Error::invalid_hash(format!(
                "Expected 32 hex characters for a path hash, got {}",
                hex_str.len()
            )));
        }

        let mut bytes = [0u8; 16];
        hex::decode_to_slice(hex_str, &mut bytes)
            .map_err(|e| Error::invalid_hash(format!("Invalid hex: {}", e)))?;

        let (a, b) = bytes.split_at(8);
        let mut part_a = [0u8; 8];
        let mut part_b = [0u8; 8];
        part_a.copy_from_slice(a);
        part_b.copy_from_slice(b);

        Ok(Self {
            part_a: i64::from_be_bytes(part_a),
            part_b: i64::from_be_bytes(part_b),
        })
    }

    /// Convert to hex string (32 characters).
    pub fn to_hex(&self) -> String {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.part_a.to_be_bytes());
        bytes[8..].copy_from_slice(&self.part_b.to_be_bytes());
        hex::encode(bytes)
    }
}

impl fmt::Display for Hash128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash128({}, {})", self.part_a, self.part_b)
    }
}

impl Serialize for Hash128 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A 20-byte content digest.
///
/// The all-zero value means "no content" and marks directory entries.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; CONTENT_HASH_SIZE]);

impl ContentHash {
    /// The "no content" sentinel.
    pub const NONE: ContentHash = ContentHash([0u8; CONTENT_HASH_SIZE]);

    /// Create a ContentHash from raw bytes.
    pub fn from_bytes(bytes: [u8; CONTENT_HASH_SIZE]) -> Self {
        ContentHash(bytes)
    }

    /// Create a ContentHash from a slice, which must be exactly 20 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; CONTENT_HASH_SIZE] = bytes.try_into().map_err(|_| {
            Error::invalid_hash(format!(
                "Expected {} bytes, got {}",
                CONTENT_HASH_SIZE,
                bytes.len()
            ))
        })?;
        Ok(ContentHash(array))
    }

    /// Create a ContentHash from a hex string (40 hex characters).
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != CONTENT_HASH_SIZE * 2 {
            return Err(Error::invalid_hash(format!(
                "Expected {} hex characters, got {}",
                CONTENT_HASH_SIZE * 2,
                hex_str.len()
            )));
        }

        let mut hash = [0u8; CONTENT_HASH_SIZE];
        hex::decode_to_slice(hex_str, &mut hash)
            .map_err(|e| Error::invalid_hash(format!("Invalid hex: {}", e)))?;
        Ok(ContentHash(hash))
    }

    /// Parse a repository object name.
    ///
    /// Accepts the sharded form used under `data/` (`ab/cdef...`), with or
    /// without the one-letter object suffix (`C` for catalogs).
    pub fn from_object_name(name: &str) -> Result<Self> {
        let mut joined: String = name.trim().chars().filter(|c| *c != '/').collect();

        if joined.len() == CONTENT_HASH_SIZE * 2 + 1
            && joined.ends_with(|c: char| c.is_ascii_uppercase())
        {
            joined.pop();
        }

        Self::from_hex(&joined.to_ascii_lowercase())
    }

    /// Convert to hex string (40 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the first 2 hex characters (for directory sharding).
    pub fn prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Get the remaining 38 hex characters (for filename).
    pub fn suffix(&self) -> String {
        hex::encode(&self.0[1..])
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; CONTENT_HASH_SIZE] {
        &self.0
    }

    /// Whether this is the "no content" sentinel.
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// SHA-1 digest of raw bytes.
    pub fn sha1_bytes(data: &[u8]) -> Self {
        let digest = Sha1::digest(data);
        let mut hash = [0u8; CONTENT_HASH_SIZE];
        hash.copy_from_slice(&digest);
        ContentHash(hash)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_sentinel() {
        assert!(Hash128::ROOT.is_root());
        assert!(Hash128::default().is_root());
        assert!(!Hash128::new(0, 1).is_root());
        assert_eq!(Hash128::ROOT.to_hex(), "0".repeat(32));
    }

    #[test]
    fn test_hash128_negative_halves() {
        let hash = Hash128::new(-1, i64::MIN);
        let hex = hash.to_hex();
        assert_eq!(hex, "ffffffffffffffff8000000000000000");
        assert_eq!(Hash128::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_hash128_ordering_follows_halves() {
        assert!(Hash128::new(1, 9) < Hash128::new(2, 0));
        assert!(Hash128::new(-5, 0) < Hash128::new(0, 0));
    }

    #[test]
    fn test_hash128_from_hex_invalid() {
        assert!(Hash128::from_hex("abcd").is_err());
        assert!(Hash128::from_hex(&"g".repeat(32)).is_err());
    }

    #[test]
    fn test_content_hash_sha1() {
        let hash = ContentHash::sha1_bytes(b"hello world");
        assert_eq!(hash.to_hex(), "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[test]
    fn test_content_hash_none() {
        assert!(ContentHash::NONE.is_none());
        assert!(ContentHash::from_slice(&[0u8; 20]).unwrap().is_none());
        assert!(!ContentHash::sha1_bytes(b"").is_none());
    }

    #[test]
    fn test_content_hash_from_slice_wrong_length() {
        assert!(ContentHash::from_slice(&[1u8; 19]).is_err());
        assert!(ContentHash::from_slice(&[1u8; 32]).is_err());
    }

    #[test]
    fn test_content_hash_from_hex_invalid() {
        assert!(ContentHash::from_hex("abcd").is_err());
        assert!(ContentHash::from_hex("").is_err());
        assert!(ContentHash::from_hex(&"z".repeat(40)).is_err());
    }

    #[test]
    fn test_from_object_name() {
        let hex = "aa00000000000000000000000000000000000bbb";
        let expected = ContentHash::from_hex(hex).unwrap();

        assert_eq!(ContentHash::from_object_name(hex).unwrap(), expected);
        assert_eq!(
            ContentHash::from_object_name("aa/00000000000000000000000000000000000bbb").unwrap(),
            expected
        );
        assert_eq!(
            ContentHash::from_object_name("aa/00000000000000000000000000000000000bbbC").unwrap(),
            expected
        );
        assert_eq!(
            ContentHash::from_object_name("AA00000000000000000000000000000000000BBB").unwrap(),
            expected
        );
        assert!(ContentHash::from_object_name("aa/bb").is_err());
    }

    #[test]
    fn test_prefix_suffix() {
        let hash = ContentHash::sha1_bytes(b"test");
        assert_eq!(hash.prefix().len(), 2);
        assert_eq!(hash.suffix().len(), 38);
        assert_eq!(format!("{}{}", hash.prefix(), hash.suffix()), hash.to_hex());
    }

    #[test]
    fn test_serialize_as_hex() {
        let hash = ContentHash::sha1_bytes(b"test");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));

        let path = Hash128::new(7, 9);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, format!("\"{}\"", path.to_hex()));
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// Hex text preserves both signed halves
        #[test]
        fn prop_hash128_hex_roundtrip(a in any::<i64>(), b in any::<i64>()) {
            let hash = Hash128::new(a, b);
            let parsed = Hash128::from_hex(&hash.to_hex())?;
            prop_assert_eq!(hash, parsed);
        }

        /// Hex ordering of path hashes with non-negative halves matches numeric ordering
        #[test]
        fn prop_hash128_hex_order(
            a1 in 0..i64::MAX, b1 in 0..i64::MAX,
            a2 in 0..i64::MAX, b2 in 0..i64::MAX,
        ) {
            let h1 = Hash128::new(a1, b1);
            let h2 = Hash128::new(a2, b2);
            prop_assert_eq!(h1.cmp(&h2), h1.to_hex().cmp(&h2.to_hex()));
        }
    }
}
