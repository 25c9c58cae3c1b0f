//! Shared resources

use super::{require_user, text, user_id, CommandCodec};
use crate::effects;
use crate::facts::{resource_key, RESOURCE};
use concord_core::{ConcordError, Fields};
use concord_policy::{CheckContext, CheckFailure, FinishContext, FinishError, PolicyCommand};

/// Create or overwrite a resource value
///
/// Concurrent writes to one resource are resolved by canonical order: the
/// write folded last wins on every replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetResource {
    /// Resource name
    pub resource_id: String,
    /// New value
    pub value: String,
}

impl CommandCodec for SetResource {
    const NAME: &'static str = "SetResource";

    fn from_fields(fields: &Fields) -> Result<Self, ConcordError> {
        Ok(Self {
            resource_id: text(fields, "resource_id")?,
            value: text(fields, "value")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("resource_id", self.resource_id.as_str())
            .with("value", self.value.as_str())
    }
}

impl PolicyCommand for SetResource {
    fn check(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        require_user(ctx).map(|_| ())
    }

    fn finish(&self, ctx: &mut FinishContext<'_>) -> Result<(), FinishError> {
        let writer = user_id(ctx.author());
        let key = resource_key(&self.resource_id);
        let value = Fields::new()
            .with("value", self.value.as_str())
            .with("writer", writer.as_str());
        if ctx.exists(RESOURCE, &key)? {
            ctx.update(RESOURCE, key, value)?;
        } else {
            ctx.create(RESOURCE, key, value)?;
        }
        ctx.emit(effects::resource_set(&self.resource_id, &self.value, &writer));
        Ok(())
    }
}
