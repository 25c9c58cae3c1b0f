//! # Concord Policy
//!
//! The policy replay engine.
//!
//! A [`Policy`] decodes command payloads into a closed set of variants, each
//! implementing [`PolicyCommand`]:
//!
//! - **check**: read-only predicates over current facts, fail fast
//! - **finish**: one atomic batch of fact writes and effects
//! - **recall**: atomic compensation, run when finish signals failure
//!
//! The [`PolicyEngine`] folds commands through those blocks one at a time and
//! [`reconcile`] keeps the fold aligned with the graph's canonical order.

mod context;
mod effect;
mod engine;
mod error;
mod policy;
mod reconcile;
mod status;

pub use context::{CheckContext, CommandMeta, FinishContext};
pub use effect::{Effect, EffectRecord, EffectStatus};
pub use engine::{CommandOutcome, Outcome, PolicyEngine, RejectReason, RewoundCommand};
pub use error::{PolicyError, Result};
pub use policy::{CheckFailure, DecodeError, FinishError, Policy, PolicyCommand};
pub use reconcile::{reconcile, ReconcileReport, ReplayPlan};
pub use status::CommandStatus;
