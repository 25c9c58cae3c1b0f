//! Fact types of the access-governance policy
//!
//! | Type | Key | Value | |
//! |---|---|---|---|
//! | `Genesis` | | `owner` | immutable |
//! | `UserRole` | `user` | `role` | |
//! | `Team` | `team` | `owner` | |
//! | `TeamStats` | `team` | `members` | |
//! | `TeamMember` | `team, user` | `role` | |
//! | `TeamRole` | `team, user` | `role` | |
//! | `Resource` | `resource` | `value, writer` | |
//! | `AuditLog` | `entry` | `actor, action` | immutable |

use crate::roles::Role;
use concord_core::{ConcordError, Fields};
use concord_facts::{FactDef, FactKey, FactSchema};

/// Singleton holding the genesis owner
pub const GENESIS: &str = "Genesis";
/// Global role per user
pub const USER_ROLE: &str = "UserRole";
/// Team and its owner
pub const TEAM: &str = "Team";
/// Member count per team
pub const TEAM_STATS: &str = "TeamStats";
/// Team membership
pub const TEAM_MEMBER: &str = "TeamMember";
/// Role held within a team
pub const TEAM_ROLE: &str = "TeamRole";
/// Resource value and last writer
pub const RESOURCE: &str = "Resource";
/// Immutable audit entries
pub const AUDIT_LOG: &str = "AuditLog";

/// Schema declared by [`AuthorizationPolicy`](crate::AuthorizationPolicy)
pub fn schema() -> FactSchema {
    FactSchema::new()
        .with(FactDef::immutable(GENESIS, Vec::<&str>::new(), ["owner"]))
        .with(FactDef::mutable(USER_ROLE, ["user"], ["role"]))
        .with(FactDef::mutable(TEAM, ["team"], ["owner"]))
        .with(FactDef::mutable(TEAM_STATS, ["team"], ["members"]))
        .with(FactDef::mutable(TEAM_MEMBER, ["team", "user"], ["role"]))
        .with(FactDef::mutable(TEAM_ROLE, ["team", "user"], ["role"]))
        .with(FactDef::mutable(RESOURCE, ["resource"], ["value", "writer"]))
        .with(FactDef::immutable(AUDIT_LOG, ["entry"], ["actor", "action"]))
}

/// Key of the genesis singleton
pub fn genesis_key() -> FactKey {
    FactKey::empty()
}

/// Key of a user role
pub fn user_key(user: &str) -> FactKey {
    FactKey::from(user)
}

/// Key of a team
pub fn team_key(team: &str) -> FactKey {
    FactKey::from(team)
}

/// Key of a `(team, user)` membership
pub fn member_key(team: &str, user: &str) -> FactKey {
    FactKey::new([team, user])
}

/// Key of a resource
pub fn resource_key(resource: &str) -> FactKey {
    FactKey::from(resource)
}

/// Key of an audit entry
pub fn audit_key(entry: &str) -> FactKey {
    FactKey::from(entry)
}

pub(crate) fn role_value(role: Role) -> Fields {
    Fields::new().with("role", role.as_str())
}

/// Role stored in a `UserRole`, `TeamMember` or `TeamRole` value
pub fn parse_role(fields: &Fields) -> Result<Role, ConcordError> {
    fields.str("role")?.parse()
}
