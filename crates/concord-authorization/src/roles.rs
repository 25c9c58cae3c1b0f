//! Roles held by users and team members

use concord_core::ConcordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standing of a user, globally or within a team
///
/// Ordered by privilege: `Member < Admin < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Team or organization member
    Member,
    /// May manage members
    Admin,
    /// Only ever granted by `Init`
    Owner,
}

impl Role {
    /// Lowercase name, as stored in facts
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Whether this role may manage users and teams
    pub fn can_administer(&self) -> bool {
        *self >= Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConcordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(ConcordError::invalid(format!("unknown role `{other}`"))),
        }
    }
}
