//! Named actions of the access-governance policy
//!
//! Most actions publish exactly one command whose fields are the action's
//! arguments. `create_team_with_admin` publishes two, and reports
//! [`ActionError::PartialFailure`] when the second is not accepted while the
//! team it created stays.

use crate::commands::{
    AddTeamMember, AddUser, AuthCommand, ChangeRole, CommandCodec, CreateTeam, Init,
    RecordAudit, RemoveTeamMember, RemoveUser, SetResource, TransferTeamOwnership,
};
use crate::policy::AuthorizationPolicy;
use crate::roles::Role;
use concord_core::{CommandPayload, Fields};
use concord_replica::{Action, ActionContext, ActionError, Replica};
use std::sync::Arc;

/// Bootstrap the team's owner
pub const INIT: &str = "init";
/// Grant a user a role
pub const ADD_USER: &str = "add_user";
/// Revoke a user
pub const REMOVE_USER: &str = "remove_user";
/// Change an existing user's role
pub const CHANGE_ROLE: &str = "change_role";
/// Create a team owned by the caller
pub const CREATE_TEAM: &str = "create_team";
/// Create a team and add its first admin in one action
pub const CREATE_TEAM_WITH_ADMIN: &str = "create_team_with_admin";
/// Add a member to a team
pub const ADD_TEAM_MEMBER: &str = "add_team_member";
/// Remove a member from a team
pub const REMOVE_TEAM_MEMBER: &str = "remove_team_member";
/// Write a resource value
pub const SET_RESOURCE: &str = "set_resource";
/// Append an audit entry
pub const RECORD_AUDIT: &str = "record_audit";
/// Hand a team to another member
pub const TRANSFER_TEAM_OWNERSHIP: &str = "transfer_team_ownership";

/// Publishes one command built straight from the arguments
struct SingleCommand {
    action: &'static str,
    command: &'static str,
}

impl SingleCommand {
    fn new<C: CommandCodec>(action: &'static str) -> Self {
        Self {
            action,
            command: C::NAME,
        }
    }
}

impl Action<AuthorizationPolicy> for SingleCommand {
    fn name(&self) -> &str {
        self.action
    }

    fn run(
        &self,
        ctx: &mut ActionContext<'_, AuthorizationPolicy>,
        args: &Fields,
    ) -> Result<(), ActionError> {
        let payload = CommandPayload {
            name: self.command.to_string(),
            fields: args.clone(),
        };
        // refuse arguments the policy would reject as undecodable
        AuthCommand::decode(&payload).map_err(|e| ActionError::invalid(e.to_string()))?;
        ctx.publish(payload)?;
        Ok(())
    }
}

/// `CreateTeam` followed by `AddTeamMember` with the admin role
struct CreateTeamWithAdmin;

impl Action<AuthorizationPolicy> for CreateTeamWithAdmin {
    fn name(&self) -> &str {
        CREATE_TEAM_WITH_ADMIN
    }

    fn run(
        &self,
        ctx: &mut ActionContext<'_, AuthorizationPolicy>,
        args: &Fields,
    ) -> Result<(), ActionError> {
        let team_id = args.str("team_id")?.to_string();
        let admin = args.str("admin_id")?.to_string();

        ctx.publish(
            CreateTeam {
                team_id: team_id.clone(),
            }
            .payload(),
        )?;
        ctx.publish(
            AddTeamMember {
                team_id,
                user_id: admin,
                role: Role::Admin,
            }
            .payload(),
        )?;
        Ok(())
    }
}

/// Every action of the policy
pub fn all() -> Vec<Arc<dyn Action<AuthorizationPolicy>>> {
    vec![
        Arc::new(SingleCommand::new::<Init>(INIT)),
        Arc::new(SingleCommand::new::<AddUser>(ADD_USER)),
        Arc::new(SingleCommand::new::<RemoveUser>(REMOVE_USER)),
        Arc::new(SingleCommand::new::<ChangeRole>(CHANGE_ROLE)),
        Arc::new(SingleCommand::new::<CreateTeam>(CREATE_TEAM)),
        Arc::new(CreateTeamWithAdmin),
        Arc::new(SingleCommand::new::<AddTeamMember>(ADD_TEAM_MEMBER)),
        Arc::new(SingleCommand::new::<RemoveTeamMember>(REMOVE_TEAM_MEMBER)),
        Arc::new(SingleCommand::new::<SetResource>(SET_RESOURCE)),
        Arc::new(SingleCommand::new::<RecordAudit>(RECORD_AUDIT)),
        Arc::new(SingleCommand::new::<TransferTeamOwnership>(
            TRANSFER_TEAM_OWNERSHIP,
        )),
    ]
}

/// Register every action on a replica
pub fn register_all(replica: &Replica<AuthorizationPolicy>) {
    for action in all() {
        replica.register_action(action);
    }
    tracing::debug!(actions = replica.actions().len(), "Registered authorization actions");
}
