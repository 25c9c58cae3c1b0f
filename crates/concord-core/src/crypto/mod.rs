//! Cryptographic helpers owned by the core
//!
//! Only hashing lives here. Signing, verification and sealing are consumed
//! through [`crate::envelope::EnvelopeEffects`].

pub mod hash;
