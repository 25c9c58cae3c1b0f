//! Replica bootstrap and user management

use super::{grantable, require_admin, role_field, role_of, text, user_id, CommandCodec};
use crate::effects;
use crate::facts::{genesis_key, role_value, user_key, GENESIS, USER_ROLE};
use crate::roles::Role;
use concord_core::{ConcordError, Fields};
use concord_policy::{CheckContext, CheckFailure, FinishContext, FinishError, PolicyCommand};

/// Make the author the owner of an empty governance domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Init;

impl CommandCodec for Init {
    const NAME: &'static str = "Init";

    fn from_fields(_fields: &Fields) -> Result<Self, ConcordError> {
        Ok(Init)
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
    }
}

impl PolicyCommand for Init {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        ctx.ensure(!ctx.exists(GENESIS, &genesis_key())?, "already initialized")
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        let owner = user_id(ctx.author());
        ctx.create(GENESIS, genesis_key(), Fields::new().with("owner", owner.as_str()))?;
        ctx.create(USER_ROLE, user_key(&owner), role_value(Role::Owner))?;
        ctx.emit(effects::initialized(&owner));
        Ok(())
    }
}

/// Register a user with a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddUser {
    /// User being granted
    pub user_id: String,
    /// Granted role
    pub role: Role,
}

impl CommandCodec for AddUser {
    const NAME: &'static str = "AddUser";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        Ok(Self {
            user_id: text(fields, "user_id")?,
            role: role_field(fields)?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("user_id", self.user_id.as_str())
            .with("role", self.role.as_str())
    }
}

impl PolicyCommand for AddUser {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        require_admin(ctx)?;
        grantable(ctx, self.role)?;
        ctx.ensure(
            role_of(ctx, &self.user_id)?.is_none(),
            format!("user `{}` already exists", self.user_id),
        )
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        ctx.create(USER_ROLE, user_key(&self.user_id), role_value(self.role))?;
        ctx.emit(effects::user_added(&self.user_id, self.role));
        Ok(())
    }
}

/// Remove a user; the owner cannot be removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveUser {
    /// User being revoked
    pub user_id: String,
}

impl CommandCodec for RemoveUser {
    const NAME: &'static str = "RemoveUser";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        Ok(Self {
            user_id: text(fields, "user_id")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new().with("user_id", self.user_id.as_str())
    }
}

impl PolicyCommand for RemoveUser {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        require_admin(ctx)?;
        let target = role_of(ctx, &self.user_id)?
            .ok_or_else(|| CheckFailure::new(format!("no such user `{}`", self.user_id)))?;
        ctx.ensure(target != Role::Owner, "the owner cannot be removed")
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        ctx.delete(USER_ROLE, user_key(&self.user_id))?;
        ctx.emit(effects::user_removed(&self.user_id));
        Ok(())
    }
}

/// Change a user's role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRole {
    /// User whose role changes
    pub user_id: String,
    /// Replacement role
    pub role: Role,
}

impl CommandCodec for ChangeRole {
    const NAME: &'static str = "ChangeRole";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        Ok(Self {
            user_id: text(fields, "user_id")?,
            role: role_field(fields)?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("user_id", self.user_id.as_str())
            .with("role", self.role.as_str())
    }
}

impl PolicyCommand for ChangeRole {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        require_admin(ctx)?;
        grantable(ctx, self.role)?;
        let target = role_of(ctx, &self.user_id)?
            .ok_or_else(|| CheckFailure::new(format!("no such user `{}`", self.user_id)))?;
        ctx.ensure(target != Role::Owner, "the owner's role is fixed")
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        ctx.update(USER_ROLE, user_key(&self.user_id), role_value(self.role))?;
        ctx.emit(effects::role_changed(&self.user_id, self.role));
        Ok(())
    }
}
