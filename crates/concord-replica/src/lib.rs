//! # Concord Replica
//!
//! One participant in the shared command graph. A [`Replica`] ties the
//! graph store, the policy engine and the fact database together and exposes
//! the outer surfaces:
//!
//! - **Sync boundary**: [`Replica::heads`], [`Replica::missing`],
//!   [`Replica::ingest`] and [`Replica::sync_from`], with orphans buffered
//!   until their ancestors arrive
//! - **Actions**: named entry points that publish commands, see
//!   [`dispatcher`]
//! - **Effects**: an ordered stream of [`EffectRecord`]s per subscriber
//! - **Queries**: read-only access to facts and command outcomes
//!
//! Gossip transport is not part of this crate; anything that can move
//! sealed envelopes between replicas can drive the sync boundary.

pub mod dispatcher;
mod effects;
mod error;
pub mod logging;
mod replica;
mod sync;

pub use concord_policy::EffectRecord;
pub use dispatcher::{Action, ActionContext, ActionError, CancelToken};
pub use effects::EffectBus;
pub use error::{ReplicaError, Result};
pub use logging::init_tracing;
pub use replica::Replica;
pub use sync::{open_all, IngestReport, OrphanPool, SyncPeer};
