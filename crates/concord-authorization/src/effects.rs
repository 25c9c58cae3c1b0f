//! Effects emitted by the access-governance policy

use crate::roles::Role;
use concord_policy::Effect;

/// Genesis owner recorded
pub const INITIALIZED: &str = "Initialized";
/// User granted a role
pub const USER_ADDED: &str = "UserAdded";
/// User revoked
pub const USER_REMOVED: &str = "UserRemoved";
/// User role replaced
pub const ROLE_CHANGED: &str = "RoleChanged";
/// Team created
pub const TEAM_CREATED: &str = "TeamCreated";
/// Member joined a team
pub const TEAM_MEMBER_ADDED: &str = "TeamMemberAdded";
/// Member left a team
pub const TEAM_MEMBER_REMOVED: &str = "TeamMemberRemoved";
/// Team owner changed
pub const TEAM_OWNERSHIP_TRANSFERRED: &str = "TeamOwnershipTransferred";
/// Transfer withdrawn because the new owner was not a member
pub const TRANSFER_RECALLED: &str = "TeamOwnershipTransferRecalled";
/// Resource written
pub const RESOURCE_SET: &str = "ResourceSet";
/// Audit entry appended
pub const AUDIT_RECORDED: &str = "AuditRecorded";

pub(crate) fn initialized(owner: &str) -> Effect {
    Effect::new(INITIALIZED).with("owner", owner)
}

pub(crate) fn user_added(user: &str, role: Role) -> Effect {
    Effect::new(USER_ADDED)
        .with("user_id", user)
        .with("role", role.as_str())
}

pub(crate) fn user_removed(user: &str) -> Effect {
    Effect::new(USER_REMOVED).with("user_id", user)
}

pub(crate) fn role_changed(user: &str, role: Role) -> Effect {
    Effect::new(ROLE_CHANGED)
        .with("user_id", user)
        .with("role", role.as_str())
}

pub(crate) fn team_created(team: &str, owner: &str) -> Effect {
    Effect::new(TEAM_CREATED)
        .with("team_id", team)
        .with("owner", owner)
}

pub(crate) fn team_member_added(team: &str, user: &str, role: Role) -> Effect {
    Effect::new(TEAM_MEMBER_ADDED)
        .with("team_id", team)
        .with("user_id", user)
        .with("role", role.as_str())
}

pub(crate) fn team_member_removed(team: &str, user: &str) -> Effect {
    Effect::new(TEAM_MEMBER_REMOVED)
        .with("team_id", team)
        .with("user_id", user)
}

pub(crate) fn ownership_transferred(team: &str, from: &str, to: &str) -> Effect {
    Effect::new(TEAM_OWNERSHIP_TRANSFERRED)
        .with("team_id", team)
        .with("from", from)
        .with("to", to)
}

pub(crate) fn transfer_recalled(team: &str, reason: &str) -> Effect {
    Effect::new(TRANSFER_RECALLED)
        .with("team_id", team)
        .with("reason", reason)
}

pub(crate) fn resource_set(resource: &str, value: &str, writer: &str) -> Effect {
    Effect::new(RESOURCE_SET)
        .with("resource_id", resource)
        .with("value", value)
        .with("writer", writer)
}

pub(crate) fn audit_recorded(entry: &str, action: &str) -> Effect {
    Effect::new(AUDIT_RECORDED)
        .with("entry_id", entry)
        .with("action", action)
}
