//! Command variants of the access-governance policy
//!
//! Each variant is its own type implementing [`PolicyCommand`];
//! [`AuthCommand`] is the closed set the policy decodes payloads into and
//! dispatches with a plain `match`.

mod audit;
mod resources;
mod teams;
mod users;

pub use audit::RecordAudit;
pub use resources::SetResource;
pub use teams::{
    AddTeamMember, CreateTeam, CreateTeamMember, RemoveTeamMember, TransferTeamOwnership,
};
pub use users::{AddUser, ChangeRole, Init, RemoveUser};

use crate::facts::{parse_role, team_key, user_key, TEAM, USER_ROLE};
use crate::roles::Role;
use concord_core::{AuthorId, CommandPayload, ConcordError, Fields};
use concord_policy::{
    CheckContext, CheckFailure, DecodeError, FinishContext, FinishError, PolicyCommand,
};

/// Every command the policy understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCommand {
    /// Bootstrap the genesis owner
    Init(Init),
    /// Grant a role
    AddUser(AddUser),
    /// Revoke a user
    RemoveUser(RemoveUser),
    /// Change a role
    ChangeRole(ChangeRole),
    /// Create a team
    CreateTeam(CreateTeam),
    /// Add a team member
    AddTeamMember(AddTeamMember),
    /// Add the first member of a team created in the same action
    CreateTeamMember(CreateTeamMember),
    /// Remove a team member
    RemoveTeamMember(RemoveTeamMember),
    /// Transfer team ownership
    TransferTeamOwnership(TransferTeamOwnership),
    /// Write a resource
    SetResource(SetResource),
    /// Append an audit entry
    RecordAudit(RecordAudit),
}

/// Payload encoding shared by every variant
pub trait CommandCodec: Sized {
    /// Payload name selecting the variant
    const NAME: &'static str;

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError>;

    fn to_fields(&self) -> Fields;

    /// Payload ready to publish
    fn payload(&self) -> CommandPayload {
        CommandPayload {
            name: Self::NAME.to_string(),
            fields: self.to_fields(),
        }
    }
}

fn decode_as<C: CommandCodec>(payload: &CommandPayload) -> Result<C, DecodeError> {
    C::from_fields(&payload.fields).map_err(|e| DecodeError::field(payload, e))
}

impl AuthCommand {
    /// Decode a payload into its variant
    pub fn decode(payload: &CommandPayload) -> Result<Self, DecodeError> {
        Ok(match payload.name.as_str() {
            Init::NAME => Self::Init(decode_as(payload)?),
            AddUser::NAME => Self::AddUser(decode_as(payload)?),
            RemoveUser::NAME => Self::RemoveUser(decode_as(payload)?),
            ChangeRole::NAME => Self::ChangeRole(decode_as(payload)?),
            CreateTeam::NAME => Self::CreateTeam(decode_as(payload)?),
            AddTeamMember::NAME => Self::AddTeamMember(decode_as(payload)?),
            CreateTeamMember::NAME => Self::CreateTeamMember(decode_as(payload)?),
            RemoveTeamMember::NAME => Self::RemoveTeamMember(decode_as(payload)?),
            TransferTeamOwnership::NAME => Self::TransferTeamOwnership(decode_as(payload)?),
            SetResource::NAME => Self::SetResource(decode_as(payload)?),
            RecordAudit::NAME => Self::RecordAudit(decode_as(payload)?),
            _ => return Err(DecodeError::unknown(payload)),
        })
    }

    /// Encode back into a payload
    pub fn payload(&self) -> CommandPayload {
        match self {
            Self::Init(c) => c.payload(),
            Self::AddUser(c) => c.payload(),
            Self::RemoveUser(c) => c.payload(),
            Self::ChangeRole(c) => c.payload(),
            Self::CreateTeam(c) => c.payload(),
            Self::AddTeamMember(c) => c.payload(),
            Self::CreateTeamMember(c) => c.payload(),
            Self::RemoveTeamMember(c) => c.payload(),
            Self::TransferTeamOwnership(c) => c.payload(),
            Self::SetResource(c) => c.payload(),
            Self::RecordAudit(c) => c.payload(),
        }
    }

    fn inner(&self) -> &dyn PolicyCommand {
        match self {
            Self::Init(c) => c,
            Self::AddUser(c) => c,
            Self::RemoveUser(c) => c,
            Self::ChangeRole(c) => c,
            Self::CreateTeam(c) => c,
            Self::AddTeamMember(c) => c,
            Self::CreateTeamMember(c) => c,
            Self::RemoveTeamMember(c) => c,
            Self::TransferTeamOwnership(c) => c,
            Self::SetResource(c) => c,
            Self::RecordAudit(c) => c,
        }
    }
}

impl PolicyCommand for AuthCommand {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        self.inner().check(ctx)
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        self.inner().finish(ctx)
    }

    fn recall(&self, ctx: &mut FinishContext<'_>, reason: &str) -> Result<(), FinishError> {
        self.inner().recall(ctx, reason)
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// User id of a device
pub fn user_id(author: AuthorId) -> String {
    author.to_hex()
}

pub(crate) fn text(fields: &Fields, name: &str) -> Result<String, ConcordError> {
    Ok(fields.str(name)?.to_string())
}

pub(crate) fn role_field(fields: &Fields) -> Result<Role, ConcordError> {
    fields.str("role")?.parse()
}

pub(crate) fn role_of(ctx: &CheckContext<'_>, user: &str) -> Result<Option<Role>, CheckFailure> {
    Ok(ctx
        .query(USER_ROLE, &user_key(user))?
        .map(parse_role)
        .transpose()?)
}

/// The author's own role; fails for unregistered authors
pub(crate) fn require_user(ctx: &CheckContext<'_>) -> Result<Role, CheckFailure> {
    role_of(ctx, &user_id(ctx.author()))?
        .ok_or_else(|| CheckFailure::new("author is not a registered user"))
}

pub(crate) fn require_admin(ctx: &CheckContext<'_>) -> Result<Role, CheckFailure> {
    let role = require_user(ctx)?;
    ctx.ensure(role.can_administer(), "author is not an administrator")?;
    Ok(role)
}

pub(crate) fn team_owner(ctx: &CheckContext<'_>, team: &str) -> Result<String, CheckFailure> {
    let fields = ctx
        .query(TEAM, &team_key(team))?
        .ok_or_else(|| CheckFailure::new(format!("no such team `{team}`")))?;
    Ok(text(fields, "owner")?)
}

/// Team owners and global administrators manage a team; returns the owner
pub(crate) fn require_team_manager(
    ctx: &CheckContext<'_>,
    team: &str,
) -> Result<String, CheckFailure> {
    let owner = team_owner(ctx, team)?;
    let role = require_user(ctx)?;
    ctx.ensure(
        owner == user_id(ctx.author()) || role.can_administer(),
        format!("author cannot manage team `{team}`"),
    )?;
    Ok(owner)
}

pub(crate) fn grantable(ctx: &CheckContext<'_>, role: Role) -> Result<(), CheckFailure> {
    ctx.ensure(role != Role::Owner, "the owner role cannot be granted")
}
