//! The access-governance policy

use crate::commands::AuthCommand;
use crate::facts;
use concord_core::CommandPayload;
use concord_facts::FactSchema;
use concord_policy::{DecodeError, Policy};

/// Users, teams, resources and an immutable audit log
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    /// Policy with the access-governance schema
    pub fn new() -> Self {
        Self
    }
}

impl Policy for AuthorizationPolicy {
    type Command = AuthCommand;

    fn name(&self) -> &str {
        "authorization"
    }

    fn schema(&self) -> FactSchema {
        facts::schema()
    }

    fn decode(&self, payload: &CommandPayload) -> Result<AuthCommand, DecodeError> {
        AuthCommand::decode(payload)
    }
}
