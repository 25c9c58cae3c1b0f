//! # Concord Core
//!
//! Shared vocabulary for the Concord command graph and policy engine:
//!
//! - **Identifiers**: content-derived [`CommandId`] and [`AuthorId`]
//! - **Hashing**: a single algorithm selection point in [`crypto::hash`]
//! - **Values**: the closed, serializable [`FieldValue`] set used by command
//!   payloads, facts and effects
//! - **Envelope**: the [`EnvelopeEffects`] capability consumed from the crypto
//!   collaborator
//! - **Configuration**: [`ConcordConfig`] layering and [`ReplicaConfig`]

pub mod command;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod errors;
pub mod identifiers;
pub mod value;

pub use command::{CommandPayload, UnsealedCommand};
pub use config::{ConcordConfig, ReplicaConfig};
pub use envelope::{EnvelopeEffects, EnvelopeError};
pub use errors::{ConcordError, Result};
pub use identifiers::{AuthorId, CommandId, Hash32};
pub use value::{FieldValue, Fields};
