//! Append-only audit log

use super::{require_user, text, user_id, CommandCodec};
use crate::effects;
use crate::facts::{audit_key, AUDIT_LOG};
use concord_core::{ConcordError, Fields};
use concord_policy::{CheckContext, CheckFailure, FinishContext, FinishError, PolicyCommand};

/// Record an audit entry
///
/// Entries are immutable facts: recording an existing entry id faults in
/// finish and leaves the first entry untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAudit {
    /// Unique entry id; reusing one faults
    pub entry_id: String,
    /// What was done
    pub action: String,
}

impl CommandCodec for RecordAudit {
    const NAME: &'static str = "RecordAudit";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        Ok(Self {
            entry_id: text(fields, "entry_id")?,
            action: text(fields, "action")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("entry_id", self.entry_id.as_str())
            .with("action", self.action.as_str())
    }
}

/// Value of an `AuditLog` fact
pub(crate) fn entry(actor: &str, action: &str) -> Fields {
    Fields::new().with("actor", actor).with("action", action)
}

impl PolicyCommand for RecordAudit {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        require_user(ctx).map(|_| ())
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        let actor = user_id(ctx.author());
        ctx.create(AUDIT_LOG, audit_key(&self.entry_id), entry(&actor, &self.action))?;
        ctx.emit(effects::audit_recorded(&self.entry_id, &self.action));
        Ok(())
    }
}
