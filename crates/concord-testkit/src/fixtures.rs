//! Deterministic device fixtures

use crate::envelope::{author_for_key, SigningEnvelope};
use concord_core::{AuthorId, CommandId, CommandPayload, EnvelopeEffects, UnsealedCommand};
use ed25519_dalek::SigningKey;
use std::sync::Arc;

/// A test device with a signing key derived from a one-byte seed
#[derive(Clone)]
pub struct DeviceFixture {
    seed: u8,
    key: SigningKey,
}

impl DeviceFixture {
    /// Device whose secret key is `[seed; 32]`
    pub fn new(seed: u8) -> Self {
        Self {
            seed,
            key: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    /// Seed used to derive this device
    pub fn seed(&self) -> u8 {
        self.seed
    }

    /// Author id of this device
    pub fn author(&self) -> AuthorId {
        author_for_key(&self.key.verifying_key())
    }

    /// User identifier policies use for this device
    pub fn user_id(&self) -> String {
        self.author().to_hex()
    }

    /// Signing key
    pub fn signing_key(&self) -> SigningKey {
        self.key.clone()
    }

    /// Envelope that seals for this device only
    pub fn envelope(&self) -> Arc<SigningEnvelope> {
        Arc::new(SigningEnvelope::for_key(self.signing_key()))
    }

    /// Unsealed command authored by this device
    pub fn command(&self, parents: Vec<CommandId>, payload: CommandPayload) -> UnsealedCommand {
        UnsealedCommand::new(self.author(), parents, payload)
    }

    /// Seal a command authored by this device
    pub fn seal(&self, parents: Vec<CommandId>, payload: CommandPayload) -> Vec<u8> {
        let envelope = SigningEnvelope::for_key(self.signing_key());
        match envelope.seal(&self.command(parents, payload)) {
            Ok(bytes) => bytes,
            Err(e) => panic!("fixture device {} failed to seal: {e}", self.seed),
        }
    }
}

impl std::fmt::Debug for DeviceFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceFixture")
            .field("seed", &self.seed)
            .field("author", &self.author())
            .finish()
    }
}

/// Envelope able to seal for every given device
pub fn shared_envelope(devices: &[&DeviceFixture]) -> Arc<SigningEnvelope> {
    let envelope = SigningEnvelope::new();
    for device in devices {
        envelope.register(device.signing_key());
    }
    Arc::new(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_give_stable_distinct_authors() {
        assert_eq!(DeviceFixture::new(1).author(), DeviceFixture::new(1).author());
        assert_ne!(DeviceFixture::new(1).author(), DeviceFixture::new(2).author());
    }

    #[test]
    fn shared_envelope_signs_for_all() {
        let a = DeviceFixture::new(1);
        let b = DeviceFixture::new(2);
        let envelope = shared_envelope(&[&a, &b]);
        assert!(envelope.can_sign(&a.author()));
        assert!(envelope.can_sign(&b.author()));
    }
}
