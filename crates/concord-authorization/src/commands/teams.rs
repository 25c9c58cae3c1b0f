//! Teams and team membership

use super::audit::entry;
use super::{
    grantable, require_team_manager, require_user, role_field, role_of, text, user_id,
    CommandCodec,
};
use crate::effects;
use crate::facts::{
    audit_key, member_key, role_value, team_key, AUDIT_LOG, TEAM, TEAM_MEMBER, TEAM_ROLE,
    TEAM_STATS,
};
use crate::roles::Role;
use concord_core::{ConcordError, Fields};
use concord_policy::{CheckContext, CheckFailure, FinishContext, FinishError, PolicyCommand};

fn members(count: i64) -> Fields {
    Fields::new().with("members", count)
}

/// Adjust `TeamStats[team]`; faults when the team has no stats
fn bump_members(ctx: &mut FinishContext<'_>, team: &str, delta: i64) -> Result<(), FinishError> {
    let key = team_key(team);
    let current = ctx
        .query(TEAM_STATS, &key)?
        .map(|f| f.int("members"))
        .transpose()?
        .unwrap_or_default();
    ctx.update(TEAM_STATS, key, members(current + delta))?;
    Ok(())
}

/// Membership and team role, then the member count
fn add_member(
    ctx: &mut FinishContext<'_>,
    team: &str,
    user: &str,
    role: Role,
) -> Result<(), FinishError> {
    ctx.create(TEAM_MEMBER, member_key(team, user), role_value(role))?;
    ctx.create(TEAM_ROLE, member_key(team, user), role_value(role))?;
    bump_members(ctx, team, 1)?;
    ctx.emit(effects::team_member_added(team, user, role));
    Ok(())
}

fn team_member_fields(fields: &Fields) -> Result<(String, String, Role), ConcordError> {
    Ok((
        text(fields, "team_id")?,
        text(fields, "user_id")?,
        role_field(fields)?,
    ))
}

fn member_to_fields(team: &str, user: &str, role: Role) -> Fields {
    Fields::new()
        .with("team_id", team)
        .with("user_id", user)
        .with("role", role.as_str())
}

// ============================================================================
// CreateTeam
// ============================================================================

/// Create a team owned by the author
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTeam {
    /// New team id
    pub team_id: String,
}

impl CommandCodec for CreateTeam {
    const NAME: &'static str = "CreateTeam";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        Ok(Self {
            team_id: text(fields, "team_id")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new().with("team_id", self.team_id.as_str())
    }
}

impl PolicyCommand for CreateTeam {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        require_user(ctx)?;
        ctx.ensure(
            !ctx.exists(TEAM, &team_key(&self.team_id))?,
            format!("team `{}` already exists", self.team_id),
        )
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        let owner = user_id(ctx.author());
        let key = team_key(&self.team_id);
        ctx.create(TEAM, key.clone(), Fields::new().with("owner", owner.as_str()))?;
        ctx.create(TEAM_STATS, key, members(0))?;
        ctx.emit(effects::team_created(&self.team_id, &owner));
        Ok(())
    }
}

// ============================================================================
// AddTeamMember / CreateTeamMember
// ============================================================================

/// Add a registered user to an existing team
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTeamMember {
    /// Team to join
    pub team_id: String,
    /// User being added
    pub user_id: String,
    /// Role within the team
    pub role: Role,
}

impl CommandCodec for AddTeamMember {
    const NAME: &'static str = "AddTeamMember";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        let (team_id, user_id, role) = team_member_fields(fields)?;
        Ok(Self {
            team_id,
            user_id,
            role,
        })
    }

    fn to_fields(&self) -> Fields {
        member_to_fields(&self.team_id, &self.user_id, self.role)
    }
}

impl PolicyCommand for AddTeamMember {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        require_team_manager(ctx, &self.team_id)?;
        grantable(ctx, self.role)?;
        ctx.ensure(
            role_of(ctx, &self.user_id)?.is_some(),
            format!("no such user `{}`", self.user_id),
        )?;
        ctx.ensure(
            !ctx.exists(TEAM_MEMBER, &member_key(&self.team_id, &self.user_id))?,
            format!("`{}` is already a member of `{}`", self.user_id, self.team_id),
        )
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        add_member(ctx, &self.team_id, &self.user_id, self.role)
    }
}

/// Add a registered user to a team without checking that the team exists
///
/// The membership facts are written before the member count; when the team
/// does not exist the count update faults and the whole finish rolls back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTeamMember {
    /// Team to join
    pub team_id: String,
    /// User being added
    pub user_id: String,
    /// Role within the team
    pub role: Role,
}

impl CommandCodec for CreateTeamMember {
    const NAME: &'static str = "CreateTeamMember";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        let (team_id, user_id, role) = team_member_fields(fields)?;
        Ok(Self {
            team_id,
            user_id,
            role,
        })
    }

    fn to_fields(&self) -> Fields {
        member_to_fields(&self.team_id, &self.user_id, self.role)
    }
}

impl PolicyCommand for CreateTeamMember {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        require_user(ctx)?;
        grantable(ctx, self.role)?;
        ctx.ensure(
            role_of(ctx, &self.user_id)?.is_some(),
            format!("no such user `{}`", self.user_id),
        )
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        add_member(ctx, &self.team_id, &self.user_id, self.role)
    }
}

// ============================================================================
// RemoveTeamMember
// ============================================================================

/// Remove a member; members may also remove themselves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveTeamMember {
    /// Team to leave
    pub team_id: String,
    /// User being removed
    pub user_id: String,
}

impl CommandCodec for RemoveTeamMember {
    const NAME: &'static str = "RemoveTeamMember";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        Ok(Self {
            team_id: text(fields, "team_id")?,
            user_id: text(fields, "user_id")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("team_id", self.team_id.as_str())
            .with("user_id", self.user_id.as_str())
    }
}

impl PolicyCommand for RemoveTeamMember {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        ctx.ensure(
            ctx.exists(TEAM_MEMBER, &member_key(&self.team_id, &self.user_id))?,
            format!("`{}` is not a member of `{}`", self.user_id, self.team_id),
        )?;
        if self.user_id != user_id(ctx.author()) {
            require_team_manager(ctx, &self.team_id)?;
        }
        Ok(())
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        ctx.delete(TEAM_MEMBER, member_key(&self.team_id, &self.user_id))?;
        ctx.delete(TEAM_ROLE, member_key(&self.team_id, &self.user_id))?;
        bump_members(ctx, &self.team_id, -1)?;
        ctx.emit(effects::team_member_removed(&self.team_id, &self.user_id));
        Ok(())
    }
}

// ============================================================================
// TransferTeamOwnership
// ============================================================================

/// Hand a team to one of its members
///
/// Whether the new owner is a member is decided in finish against the fact
/// state at commit time. When they are not, the command recalls itself and
/// the recall block records the failed transfer in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTeamOwnership {
    /// Team being transferred
    pub team_id: String,
    /// User who becomes owner
    pub new_owner: String,
}

impl CommandCodec for TransferTeamOwnership {
    const NAME: &'static str = "TransferTeamOwnership";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        Ok(Self {
            team_id: text(fields, "team_id")?,
            new_owner: text(fields, "new_owner")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("team_id", self.team_id.as_str())
            .with("new_owner", self.new_owner.as_str())
    }
}

impl PolicyCommand for TransferTeamOwnership {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        let owner = require_team_manager(ctx, &self.team_id)?;
        ctx.ensure(
            owner != self.new_owner,
            format!("`{}` already owns `{}`", self.new_owner, self.team_id),
        )
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        if !ctx.exists(TEAM_MEMBER, &member_key(&self.team_id, &self.new_owner))? {
            return Err(FinishError::recall(format!(
                "`{}` is not a member of `{}`",
                self.new_owner, self.team_id
            )));
        }
        let key = team_key(&self.team_id);
        let previous = match ctx.query(TEAM, &key)? {
            Some(team) => text(team, "owner")?,
            None => String::new(),
        };
        ctx.update(TEAM, key, Fields::new().with("owner", self.new_owner.as_str()))?;
        ctx.emit(effects::ownership_transferred(
            &self.team_id,
            &previous,
            &self.new_owner,
        ));
        Ok(())
    }

    fn recall(&self, ctx: &mut FinishContext<'_>, reason: &str) -> Result<(), FinishError> {
        let actor = user_id(ctx.author());
        let entry_id = format!("transfer-rejected/{}", ctx.id().as_hash().to_hex());
        ctx.create(
            AUDIT_LOG,
            audit_key(&entry_id),
            entry(&actor, &format!("{}: {reason}", Self::NAME)),
        )?;
        ctx.emit(effects::transfer_recalled(&self.team_id, reason));
        Ok(())
    }
}
