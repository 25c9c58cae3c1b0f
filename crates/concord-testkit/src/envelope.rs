//! Ed25519 envelope for tests and simulations
//!
//! Seals a command as `bincode(SealedWire)` where the body is the bincode
//! encoding of the [`UnsealedCommand`] and the signature covers the body.
//! Envelopes are self-certifying: the author id must equal the hash of the
//! embedded public key, so opening needs no keyring.

use concord_core::{AuthorId, EnvelopeEffects, EnvelopeError, UnsealedCommand};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize)]
struct SealedWire {
    body: Vec<u8>,
    public_key: [u8; 32],
    signature: Vec<u8>,
}

/// Author id bound to an ed25519 verifying key
pub fn author_for_key(key: &VerifyingKey) -> AuthorId {
    AuthorId::from_public_key(key.as_bytes())
}

/// Envelope capability backed by ed25519 signing keys
///
/// Any number of local devices can be registered for sealing; opening works
/// for every author.
#[derive(Default)]
pub struct SigningEnvelope {
    signers: RwLock<BTreeMap<AuthorId, SigningKey>>,
}

impl SigningEnvelope {
    /// Envelope without local signers (open-only)
    pub fn new() -> Self {
        Self::default()
    }

    /// Envelope sealing for a single device
    pub fn for_key(key: SigningKey) -> Self {
        let envelope = Self::new();
        envelope.register(key);
        envelope
    }

    /// Register a local signing key; returns its author id
    pub fn register(&self, key: SigningKey) -> AuthorId {
        let author = author_for_key(&key.verifying_key());
        self.signers.write().insert(author, key);
        author
    }

    /// Whether this envelope can seal for `author`
    pub fn can_sign(&self, author: &AuthorId) -> bool {
        self.signers.read().contains_key(author)
    }

    fn decode(sealed: &[u8]) -> Result<(SealedWire, VerifyingKey), EnvelopeError> {
        let wire: SealedWire =
            bincode::deserialize(sealed).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let key = VerifyingKey::from_bytes(&wire.public_key)
            .map_err(|e| EnvelopeError::Malformed(format!("bad public key: {e}")))?;
        Ok((wire, key))
    }
}

impl EnvelopeEffects for SigningEnvelope {
    fn seal(&self, command: &UnsealedCommand) -> Result<Vec<u8>, EnvelopeError> {
        let signers = self.signers.read();
        let key = signers
            .get(&command.author)
            .ok_or(EnvelopeError::UnknownSigner(command.author))?;

        let body = bincode::serialize(command).map_err(|e| EnvelopeError::Encoding(e.to_string()))?;
        let signature = key.sign(&body);
        let wire = SealedWire {
            body,
            public_key: key.verifying_key().to_bytes(),
            signature: signature.to_bytes().to_vec(),
        };
        bincode::serialize(&wire).map_err(|e| EnvelopeError::Encoding(e.to_string()))
    }

    fn open(&self, sealed: &[u8]) -> Result<UnsealedCommand, EnvelopeError> {
        let (wire, key) = Self::decode(sealed)?;
        let signature = Signature::from_slice(&wire.signature)
            .map_err(|e| EnvelopeError::Malformed(format!("bad signature encoding: {e}")))?;
        key.verify(&wire.body, &signature)
            .map_err(|e| EnvelopeError::Verification(e.to_string()))?;

        let command: UnsealedCommand = bincode::deserialize(&wire.body)
            .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        if command.author != author_for_key(&key) {
            return Err(EnvelopeError::Verification(format!(
                "{} is not bound to the signing key",
                command.author
            )));
        }
        Ok(command)
    }

    fn author_id(&self, sealed: &[u8]) -> Result<AuthorId, EnvelopeError> {
        self.open(sealed).map(|command| command.author)
    }
}
