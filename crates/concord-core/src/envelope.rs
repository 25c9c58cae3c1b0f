//! Envelope capability consumed from the crypto collaborator
//!
//! The core never signs or verifies anything itself. It hands an
//! [`UnsealedCommand`] to `seal` and trusts `open` to return only content
//! whose signature and author binding have been verified.

use crate::command::UnsealedCommand;
use crate::identifiers::AuthorId;
use thiserror::Error;

/// Failures reported by the envelope capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The command could not be encoded
    #[error("envelope encoding failed: {0}")]
    Encoding(String),

    /// The bytes are not a well-formed envelope
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Signature or author binding did not verify
    #[error("envelope verification failed: {0}")]
    Verification(String),

    /// This capability cannot seal for the requested author
    #[error("no signing key for {0}")]
    UnknownSigner(AuthorId),
}

/// Sign/verify/seal/open capability
///
/// Implementations must be deterministic for a given input so that re-sealing
/// the same command yields the same content id.
pub trait EnvelopeEffects: Send + Sync {
    /// Seal a command into its wire form
    fn seal(&self, command: &UnsealedCommand) -> Result<Vec<u8>, EnvelopeError>;

    /// Open and verify a sealed command
    fn open(&self, sealed: &[u8]) -> Result<UnsealedCommand, EnvelopeError>;

    /// Verified author of a sealed command
    fn author_id(&self, sealed: &[u8]) -> Result<AuthorId, EnvelopeError>;
}

impl<T: EnvelopeEffects + ?Sized> EnvelopeEffects for std::sync::Arc<T> {
    fn seal(&self, command: &UnsealedCommand) -> Result<Vec<u8>, EnvelopeError> {
        (**self).seal(command)
    }

    fn open(&self, sealed: &[u8]) -> Result<UnsealedCommand, EnvelopeError> {
        (**self).open(sealed)
    }

    fn author_id(&self, sealed: &[u8]) -> Result<AuthorId, EnvelopeError> {
        (**self).author_id(sealed)
    }
}
