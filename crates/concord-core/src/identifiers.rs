//! Core identifier types
//!
//! Every identifier in Concord is content-derived: a command id is the hash of
//! its sealed envelope and parent list, an author id is the hash of the
//! author's public key. None of them are allocated by a central authority.

use crate::crypto::hash;
use crate::errors::ConcordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const COMMAND_ID_TAG: &[u8] = b"concord/command/v1";
const AUTHOR_ID_TAG: &[u8] = b"concord/author/v1";

/// 32-byte digest with a total byte-wise order
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    /// Wrap raw digest bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// All-zero digest
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Hash `data` with the global algorithm
    pub fn digest(data: &[u8]) -> Self {
        Self(hash::hash(data))
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self, ConcordError> {
        let bytes = hex::decode(s)
            .map_err(|e| ConcordError::invalid(format!("invalid hex digest: {e}")))?;
        let array: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ConcordError::invalid(format!("digest must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(array))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Hash32 {
    type Err = ConcordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Content-derived command identifier
///
/// Ordering is the byte order of the underlying digest; it is the tie-break
/// comparator used by the canonical order for causally unrelated commands.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(pub Hash32);

impl CommandId {
    /// Derive the id of a command from its sealed bytes and parent ids
    ///
    /// Parents are hashed in the order given; callers pass the canonical
    /// (sorted) parent list.
    pub fn derive(sealed: &[u8], parents: &[CommandId]) -> Self {
        let mut h = hash::tagged_hasher(COMMAND_ID_TAG);
        h.update(&(sealed.len() as u64).to_le_bytes());
        h.update(sealed);
        h.update(&(parents.len() as u64).to_le_bytes());
        for parent in parents {
            h.update(parent.0.as_bytes());
        }
        Self(Hash32(h.finalize()))
    }

    /// Wrap an existing digest
    pub const fn from_hash(hash: Hash32) -> Self {
        Self(hash)
    }

    /// Underlying digest
    pub fn as_hash(&self) -> &Hash32 {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> String {
        self.0.to_hex()[..12].to_string()
    }
}

impl fmt::Debug for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandId({})", self.short())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd-{}", self.0)
    }
}

/// Identity of a device that authors commands
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuthorId(pub Hash32);

impl AuthorId {
    /// Derive an author id from public key bytes
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let mut h = hash::tagged_hasher(AUTHOR_ID_TAG);
        h.update(public_key);
        Self(Hash32(h.finalize()))
    }

    /// Deterministic author id from entropy, for fixtures and simulations
    pub fn new_from_entropy(entropy: [u8; 32]) -> Self {
        Self::from_public_key(&entropy)
    }

    /// Underlying digest
    pub fn as_hash(&self) -> &Hash32 {
        &self.0
    }

    /// Hex form used as the author's user identifier inside policies
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Debug for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorId({})", &self.0.to_hex()[..12])
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "author-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_id_depends_on_parents() {
        let a = CommandId::derive(b"sealed", &[]);
        let b = CommandId::derive(b"sealed", &[a]);
        assert_ne!(a, b);
        assert_eq!(b, CommandId::derive(b"sealed", &[a]));
    }

    #[test]
    fn author_and_command_domains_differ() {
        let author = AuthorId::from_public_key(b"key");
        let command = CommandId::derive(b"key", &[]);
        assert_ne!(author.0, command.0);
    }

    #[test]
    fn hash32_hex_roundtrip() {
        let h = Hash32::digest(b"concord");
        assert_eq!(h, h.to_hex().parse::<Hash32>().unwrap());
        assert!(Hash32::from_hex("abcd").is_err());
    }

    #[test]
    fn command_ids_order_bytewise() {
        let low = CommandId(Hash32([0u8; 32]));
        let high = CommandId(Hash32([1u8; 32]));
        assert!(low < high);
    }
}
