//! Action dispatcher
//!
//! Actions turn application intent into one or more published commands.
//! Every command an action publishes must be accepted: the first one that is
//! not fails the action with [`ActionError::PartialFailure`] and blocks any
//! further publish. Commands accepted before the failure stay accepted.
//!
//! Actions are not re-entrant. Invoking an action from inside a running
//! action fails with [`ActionError::Reentrant`]; invocations from other
//! threads wait for the running action to finish.

use crate::error::ReplicaError;
use crate::replica::Replica;
use concord_core::{AuthorId, CommandId, CommandPayload, ConcordError, Fields};
use concord_facts::FactKey;
use concord_policy::{EffectRecord, Policy};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use thiserror::Error;

/// Dispatcher-level failures surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// A published command was not accepted
    #[error("action `{action}` failed at {command}: {reason}")]
    PartialFailure {
        action: String,
        /// The command that was not accepted
        command: CommandId,
        reason: String,
        /// Commands of this action accepted before the failure
        accepted: Vec<CommandId>,
    },

    /// Invoked from inside a running action
    #[error("action `{0}` invoked while another action is running")]
    Reentrant(String),

    /// Cancelled before the next publish
    #[error("action `{action}` cancelled")]
    Cancelled {
        action: String,
        /// Commands of this action accepted before cancellation
        accepted: Vec<CommandId>,
    },

    /// No action registered under this name
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    /// Arguments did not fit the action
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Replica failure outside the action's control
    #[error(transparent)]
    Replica(#[from] ReplicaError),
}

impl ActionError {
    /// Build an argument error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArguments(reason.into())
    }
}

impl From<ConcordError> for ActionError {
    fn from(err: ConcordError) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}

/// Cooperative cancellation for an action's publish sequence
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask running actions to stop before their next publish
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancel was called
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A named application entry point
pub trait Action<P: Policy>: Send + Sync {
    /// Name used with [`Replica::invoke`]
    fn name(&self) -> &str;

    /// Transform `args` into published commands
    fn run(&self, ctx: &mut ActionContext<'_, P>, args: &Fields) -> Result<(), ActionError>;
}

/// What a running action can do
pub struct ActionContext<'a, P: Policy> {
    action: &'a str,
    replica: &'a Replica<P>,
    cancel: &'a CancelToken,
    accepted: Vec<CommandId>,
    effects: Vec<EffectRecord>,
    failure: Option<ActionError>,
}

impl<'a, P: Policy> ActionContext<'a, P> {
    /// Publishing author
    pub fn author(&self) -> AuthorId {
        self.replica.author()
    }

    /// The replica running the action
    pub fn replica(&self) -> &'a Replica<P> {
        self.replica
    }

    /// Read a fact, for computing command arguments
    pub fn query(&self, fact_type: &str, key: &FactKey) -> Result<Option<Fields>, ActionError> {
        Ok(self.replica.query(fact_type, key)?)
    }

    /// Commands accepted so far
    pub fn accepted(&self) -> &[CommandId] {
        &self.accepted
    }

    /// Publish one command and require it to be accepted
    pub fn publish(&mut self, payload: CommandPayload) -> Result<CommandId, ActionError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if self.cancel.is_cancelled() {
            let err = ActionError::Cancelled {
                action: self.action.to_string(),
                accepted: self.accepted.clone(),
            };
            self.failure = Some(err.clone());
            return Err(err);
        }

        let outcome = self.replica.publish(payload)?;
        self.effects.extend(outcome.effects.iter().cloned());
        if outcome.is_accepted() {
            self.accepted.push(outcome.id);
            return Ok(outcome.id);
        }

        let reason = match outcome.reject_reason() {
            Some(reason) => reason.to_string(),
            None => outcome.status().to_string(),
        };
        tracing::warn!(
            action = self.action,
            command = %outcome.id,
            %reason,
            "Action command not accepted"
        );
        let err = ActionError::PartialFailure {
            action: self.action.to_string(),
            command: outcome.id,
            reason,
            accepted: self.accepted.clone(),
        };
        self.failure = Some(err.clone());
        Err(err)
    }
}

/// Named actions plus the non-reentrancy guard
pub struct Dispatcher<P: Policy> {
    actions: RwLock<BTreeMap<String, Arc<dyn Action<P>>>>,
    running: Mutex<Option<ThreadId>>,
    serial: Mutex<()>,
}

impl<P: Policy> Default for Dispatcher<P> {
    fn default() -> Self {
        Self {
            actions: RwLock::new(BTreeMap::new()),
            running: Mutex::new(None),
            serial: Mutex::new(()),
        }
    }
}

struct RunningGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl<P: Policy> Dispatcher<P> {
    /// Register an action, replacing any action with the same name
    pub fn register(&self, action: Arc<dyn Action<P>>) {
        let name = action.name().to_string();
        tracing::debug!(action = %name, "Registered action");
        self.actions.write().insert(name, action);
    }

    /// Registered action names
    pub fn names(&self) -> Vec<String> {
        self.actions.read().keys().cloned().collect()
    }

    pub(crate) fn invoke(
        &self,
        replica: &Replica<P>,
        name: &str,
        args: &Fields,
        cancel: &CancelToken,
    ) -> Result<Vec<EffectRecord>, ActionError> {
        let action = self
            .actions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;

        let me = std::thread::current().id();
        if *self.running.lock() == Some(me) {
            return Err(ActionError::Reentrant(name.to_string()));
        }
        let _serial = self.serial.lock();
        *self.running.lock() = Some(me);
        let _running = RunningGuard(&self.running);

        let mut ctx = ActionContext {
            action: name,
            replica,
            cancel,
            accepted: Vec::new(),
            effects: Vec::new(),
            failure: None,
        };
        let result = action.run(&mut ctx, args);
        match (ctx.failure, result) {
            // a failed publish wins even if the action swallowed it
            (Some(failure), _) => Err(failure),
            (None, Err(e)) => Err(e),
            (None, Ok(())) => {
                tracing::debug!(
                    action = name,
                    commands = ctx.accepted.len(),
                    effects = ctx.effects.len(),
                    "Action completed"
                );
                Ok(ctx.effects)
            }
        }
    }
}
