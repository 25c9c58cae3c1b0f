//! Replica lifecycle
//!
//! A [`Replica`] owns one command graph, one policy engine over one fact
//! database, the orphan pool, the effect stream and the action registry.
//!
//! Locks are always taken in the order engine, then graph. Ingestion appends
//! under the graph lock alone, then aligns the engine in a separate step, so
//! new commands can land while an evaluation is running.

use crate::dispatcher::{Action, ActionError, CancelToken, Dispatcher};
use crate::effects::EffectBus;
use crate::error::{ReplicaError, Result};
use crate::sync::{open_all, IngestReport, OrphanPool, SyncPeer};
use concord_core::{
    AuthorId, CommandId, CommandPayload, ConcordConfig, EnvelopeEffects, Fields, Hash32,
    ReplicaConfig, UnsealedCommand,
};
use concord_facts::{FactKey, FactView};
use concord_graph::{
    AppendOutcome, Command, CommandGraph, CommandStorage, FileStorage, GraphError, MemoryStorage,
};
use concord_policy::{
    CommandOutcome, CommandStatus, EffectRecord, Outcome, Policy, PolicyEngine, ReconcileReport,
    ReplayPlan,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One participant's view of the shared command graph
pub struct Replica<P: Policy> {
    config: ReplicaConfig,
    author: AuthorId,
    envelope: Arc<dyn EnvelopeEffects>,
    graph: RwLock<CommandGraph>,
    engine: Mutex<PolicyEngine<P>>,
    orphans: Mutex<OrphanPool>,
    effects: EffectBus,
    dispatcher: Dispatcher<P>,
}

impl<P: Policy> Replica<P> {
    /// Open a replica, replaying any persisted graph
    ///
    /// Uses file storage when `config.storage_path` is set. A store that
    /// fails verification is refused with [`ReplicaError::Corrupted`].
    pub fn open(
        config: ReplicaConfig,
        author: AuthorId,
        envelope: Arc<dyn EnvelopeEffects>,
        policy: Arc<P>,
    ) -> Result<Self> {
        config.validate()?;
        let storage: Box<dyn CommandStorage> = match &config.storage_path {
            Some(path) => Box::new(FileStorage::open(path)?),
            None => Box::new(MemoryStorage::new()),
        };
        Self::open_with_storage(config, author, envelope, policy, storage)
    }

    /// Open a replica over explicit storage
    pub fn open_with_storage(
        config: ReplicaConfig,
        author: AuthorId,
        envelope: Arc<dyn EnvelopeEffects>,
        policy: Arc<P>,
        storage: Box<dyn CommandStorage>,
    ) -> Result<Self> {
        config.validate()?;
        let graph = CommandGraph::load(storage, &*envelope, config.verify_on_open).map_err(|e| {
            tracing::error!(error = %e, "Refusing to open replica");
            ReplicaError::from(e)
        })?;

        let mut engine = PolicyEngine::new(policy);
        let replayed = ReplayPlan::compute(&engine, &graph)?.apply(&mut engine)?;
        tracing::info!(
            policy = engine.policy().name(),
            %author,
            commands = replayed.outcomes.len(),
            facts = engine.facts().len(),
            "Replica opened"
        );

        Ok(Self {
            orphans: Mutex::new(OrphanPool::new(config.max_orphans)),
            config,
            author,
            envelope,
            graph: RwLock::new(graph),
            engine: Mutex::new(engine),
            effects: EffectBus::new(),
            dispatcher: Dispatcher::default(),
        })
    }

    /// Flush storage and shut down
    pub fn close(self) -> Result<()> {
        self.graph.write().flush()?;
        tracing::info!(author = %self.author, "Replica closed");
        Ok(())
    }

    /// Configuration the replica was opened with
    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// The device this replica publishes as
    pub fn author(&self) -> AuthorId {
        self.author
    }

    // ------------------------------------------------------------------
    // Publishing and ingestion
    // ------------------------------------------------------------------

    /// Seal a new command on top of the current heads and evaluate it
    pub fn publish(&self, payload: CommandPayload) -> Result<CommandOutcome> {
        let mut engine = self.engine.lock();
        let id = {
            let mut graph = self.graph.write();
            let parents: Vec<CommandId> = graph.heads(None).into_iter().collect();
            let command = Command::seal(
                &*self.envelope,
                UnsealedCommand::new(self.author, parents, payload),
            )?;
            let id = command.id();
            graph.append(command)?;
            id
        };
        tracing::debug!(command = %id, "Published command");

        let report = self.align(&mut engine)?;
        report
            .outcome(&id)
            .cloned()
            .ok_or_else(|| {
                ReplicaError::Corrupted(format!("published command {id} was not evaluated"))
            })
    }

    /// Ingest sealed envelopes received from a peer
    ///
    /// Envelopes are opened on worker threads, appended when their ancestry
    /// is complete and buffered otherwise. Whatever was appended is then
    /// reconciled into the fact state.
    pub fn ingest(&self, sealed: Vec<Vec<u8>>) -> Result<IngestReport> {
        let received = sealed.len();
        let opened = open_all(&*self.envelope, sealed, self.config.check_workers);

        let mut report = IngestReport::default();
        let mut failure = None;
        {
            let mut graph = self.graph.write();
            let mut orphans = self.orphans.lock();
            for (position, result) in opened.into_iter().enumerate() {
                let command = match result {
                    Ok(command) => command,
                    Err(e) => {
                        tracing::warn!(
                            position,
                            error = %e,
                            "Dropping envelope that does not open"
                        );
                        report.invalid.push((position, e));
                        continue;
                    }
                };
                let id = command.id();
                match graph.append(command.clone()) {
                    Ok(AppendOutcome::Accepted) => report.appended.push(id),
                    Ok(AppendOutcome::Duplicate) => report.duplicates += 1,
                    Err(GraphError::OrphanCommand { missing, .. }) => {
                        tracing::debug!(command = %id, missing = missing.len(), "Buffering orphan");
                        if !orphans.contains(&id) {
                            report.orphaned.push(id);
                        }
                        if let Some(evicted) = orphans.insert(command) {
                            report.dropped.push(evicted);
                        }
                    }
                    Err(e) => {
                        failure = Some(ReplicaError::from(e));
                        break;
                    }
                }
            }
            if failure.is_none() && !report.appended.is_empty() {
                failure = orphans.drain_into(&mut graph, &mut report.appended).err();
            }
            report.orphaned.retain(|id| orphans.contains(id));
        }

        // whatever reached the graph is evaluated, even when a later append failed
        if report.changed() {
            let mut engine = self.engine.lock();
            report.reconciled = self.align(&mut engine)?;
        }
        if let Some(e) = failure {
            tracing::error!(
                error = %e,
                appended = report.appended.len(),
                "Ingestion stopped on a failed append"
            );
            return Err(e);
        }
        tracing::debug!(
            received,
            appended = report.appended.len(),
            duplicates = report.duplicates,
            orphaned = report.orphaned.len(),
            invalid = report.invalid.len(),
            "Ingested envelopes"
        );
        Ok(report)
    }

    /// Pull everything `peer` has that this replica lacks
    pub fn sync_from<S: SyncPeer + ?Sized>(&self, peer: &S) -> Result<IngestReport> {
        let known: Vec<CommandId> = self.heads().into_iter().collect();
        let sealed = peer.missing(&known)?;
        self.ingest(sealed)
    }

    // Caller holds the engine lock; the graph is only read while planning.
    fn align(&self, engine: &mut PolicyEngine<P>) -> Result<ReconcileReport> {
        let plan = {
            let graph = self.graph.read();
            ReplayPlan::compute(engine, &graph)?
        };
        let report = plan.apply(engine)?;
        let recalled = report.recalled().count();
        if recalled > 0 {
            tracing::info!(recalled, "Reconciliation recalled accepted commands");
        }
        self.effects.deliver(report.effects());
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Graph inspection
    // ------------------------------------------------------------------

    /// Global heads
    pub fn heads(&self) -> BTreeSet<CommandId> {
        self.graph.read().heads(None)
    }

    /// Heads of one author's chain
    pub fn author_heads(&self, author: AuthorId) -> BTreeSet<CommandId> {
        self.graph.read().heads(Some(author))
    }

    /// Sealed envelopes a peer knowing `known` lacks, parents first
    pub fn missing(&self, known: &[CommandId]) -> Result<Vec<Vec<u8>>> {
        let graph = self.graph.read();
        let commands = graph.missing(known)?;
        Ok(commands.into_iter().map(|c| c.sealed().to_vec()).collect())
    }

    /// Number of commands in the graph
    pub fn command_count(&self) -> usize {
        self.graph.read().len()
    }

    /// Whether the graph holds `id`
    pub fn contains(&self, id: &CommandId) -> bool {
        self.graph.read().contains(id)
    }

    /// Commands buffered for missing ancestors
    pub fn orphan_count(&self) -> usize {
        self.orphans.lock().len()
    }

    /// Deterministic total order of the graph
    pub fn canonical_order(&self) -> Result<Vec<CommandId>> {
        Ok(self.graph.read().canonical_order()?)
    }

    // ------------------------------------------------------------------
    // Fact and outcome queries
    // ------------------------------------------------------------------

    /// Current value of a fact
    pub fn query(&self, fact_type: &str, key: &FactKey) -> Result<Option<Fields>> {
        let engine = self.engine.lock();
        Ok(engine.facts().query(fact_type, key)?.cloned())
    }

    /// Whether a fact exists
    pub fn exists(&self, fact_type: &str, key: &FactKey) -> Result<bool> {
        Ok(self.engine.lock().facts().exists(fact_type, key)?)
    }

    /// Facts of a type whose key starts with `prefix`
    pub fn scan(&self, fact_type: &str, prefix: &FactKey) -> Result<Vec<(FactKey, Fields)>> {
        Ok(self.engine.lock().facts().scan(fact_type, prefix)?)
    }

    /// Status of an evaluated command
    pub fn status(&self, id: &CommandId) -> Option<CommandStatus> {
        self.engine.lock().status(id)
    }

    /// Outcome of an evaluated command
    pub fn outcome(&self, id: &CommandId) -> Option<Outcome> {
        self.engine.lock().outcome(id).cloned()
    }

    /// Digest of the fact state
    pub fn digest(&self) -> Result<Hash32> {
        Ok(self.engine.lock().facts().digest()?)
    }

    /// Canonical bytes of the fact state
    pub fn fact_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.engine.lock().facts().to_canonical_bytes()?)
    }

    // ------------------------------------------------------------------
    // Effects and actions
    // ------------------------------------------------------------------

    /// Receive every effect record produced from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<EffectRecord> {
        self.effects.subscribe()
    }

    /// Register a named action
    pub fn register_action(&self, action: Arc<dyn Action<P>>) {
        self.dispatcher.register(action);
    }

    /// Names of registered actions
    pub fn actions(&self) -> Vec<String> {
        self.dispatcher.names()
    }

    /// Run a named action
    pub fn invoke(
        &self,
        name: &str,
        args: &Fields,
    ) -> std::result::Result<Vec<EffectRecord>, ActionError> {
        self.invoke_with_cancel(name, args, &CancelToken::new())
    }

    /// Run a named action that stops publishing once `cancel` fires
    pub fn invoke_with_cancel(
        &self,
        name: &str,
        args: &Fields,
        cancel: &CancelToken,
    ) -> std::result::Result<Vec<EffectRecord>, ActionError> {
        self.dispatcher.invoke(self, name, args, cancel)
    }
}

impl<P: Policy> SyncPeer for Replica<P> {
    fn heads(&self) -> BTreeSet<CommandId> {
        Replica::heads(self)
    }

    fn missing(&self, known: &[CommandId]) -> Result<Vec<Vec<u8>>> {
        Replica::missing(self, known)
    }
}

impl<P: Policy> std::fmt::Debug for Replica<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("author", &self.author)
            .field("graph", &*self.graph.read())
            .field("orphans", &self.orphans.lock().len())
            .finish_non_exhaustive()
    }
}
