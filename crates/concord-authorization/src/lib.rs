//! # Concord Authorization
//!
//! Decentralized access governance expressed as a Concord policy: users with
//! roles, teams with members, shared resources and an append-only audit log.
//!
//! Authority flows from `Init`, whose author becomes the owner. Owners and
//! administrators manage users; team owners and administrators manage teams.
//! Every rule is a check or finish block over facts, so replicas that saw the
//! same commands agree on who may do what.
//!
//! ```ignore
//! let replica = Replica::open(config, author, envelope, Arc::new(AuthorizationPolicy))?;
//! actions::register_all(&replica);
//! replica.invoke(actions::INIT, &Fields::new())?;
//! ```

pub mod actions;
pub mod commands;
pub mod effects;
pub mod facts;
mod policy;
mod roles;

pub use commands::{user_id, AuthCommand, CommandCodec};
pub use policy::AuthorizationPolicy;
pub use roles::Role;
