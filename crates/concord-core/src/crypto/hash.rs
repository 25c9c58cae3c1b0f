//! Pure synchronous hashing for content addressing
//!
//! Command identifiers, author identities and fact-database digests are all
//! derived through this module, so every replica agrees on them byte for byte.
//! Hashing is pure and deterministic and does not go through the envelope
//! capability.
//!
//! The hash algorithm is selected once via the `ALGORITHM` constant. All code
//! that uses `hash()`, `hasher()` or `tagged_hasher()` picks up a change there
//! without call-site edits.
//!
//! Current algorithm: **SHA-256** (256-bit / 32-byte output)
//!
//! # Usage
//!
//! ```
//! use concord_core::crypto::hash;
//!
//! let mut h = hash::tagged_hasher(b"concord/example/v1");
//! h.update(b"hello");
//! let digest = h.finalize();
//! assert_eq!(digest.len(), 32);
//! ```

use sha2::{Digest, Sha256};
use std::fmt;

/// Synchronous trait for content-addressing hash functions
pub trait HashAlgorithm: Send + Sync + fmt::Debug {
    /// Hash arbitrary bytes to a 32-byte digest
    fn hash(&self, data: &[u8]) -> [u8; 32];

    /// Create an incremental hasher for multi-part hashing
    fn hasher(&self) -> Box<dyn Hasher>;
}

/// Incremental hashing of multi-part data
pub trait Hasher: Send {
    /// Update the hasher with more data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hasher and return the 32-byte digest
    fn finalize(self: Box<Self>) -> [u8; 32];
}

/// SHA-256 hash implementation
#[derive(Debug, Clone, Copy)]
pub struct Sha256Algorithm;

impl HashAlgorithm for Sha256Algorithm {
    fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    fn hasher(&self) -> Box<dyn Hasher> {
        Box::new(Sha256Hasher(Sha256::new()))
    }
}

struct Sha256Hasher(Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> [u8; 32] {
        self.0.finalize().into()
    }
}

/// The hash algorithm used throughout Concord.
///
/// Changing this constant changes every command identifier, so replicas
/// running different algorithms will never share a graph.
pub const ALGORITHM: Sha256Algorithm = Sha256Algorithm;

/// Hash `data` with the global algorithm
#[inline]
pub fn hash(data: &[u8]) -> [u8; 32] {
    ALGORITHM.hash(data)
}

/// Create an incremental hasher using the global algorithm
#[inline]
pub fn hasher() -> Box<dyn Hasher> {
    ALGORITHM.hasher()
}

/// Create an incremental hasher pre-seeded with a length-prefixed domain tag
///
/// Every derived identifier uses its own tag so that, for example, a command
/// id can never collide with an author id computed over the same bytes.
pub fn tagged_hasher(tag: &[u8]) -> Box<dyn Hasher> {
    let mut h = hasher();
    h.update(&(tag.len() as u64).to_le_bytes());
    h.update(tag);
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_determinism() {
        assert_eq!(hash(b"hello world"), hash(b"hello world"));
    }

    #[test]
    fn test_incremental_hasher_equivalence() {
        let mut h = hasher();
        h.update(b"hello");
        h.update(b" ");
        h.update(b"world");
        assert_eq!(hash(b"hello world"), h.finalize());
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA256("") = e3b0c442...7852b855
        let expected = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        assert_eq!(hash(b""), expected);
    }

    #[test]
    fn test_tags_separate_domains() {
        let mut a = tagged_hasher(b"concord/a");
        a.update(b"payload");
        let mut b = tagged_hasher(b"concord/b");
        b.update(b"payload");
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_tag_is_length_prefixed() {
        // "ab" + "c" must not collide with "a" + "bc"
        let mut left = tagged_hasher(b"ab");
        left.update(b"c");
        let mut right = tagged_hasher(b"a");
        right.update(b"bc");
        assert_ne!(left.finalize(), right.finalize());
    }
}
