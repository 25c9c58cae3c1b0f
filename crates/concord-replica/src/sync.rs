//! Sync boundary
//!
//! The gossip layer moves sealed envelopes between replicas; this module is
//! what it drives. Incoming envelopes are opened on worker threads, appended
//! when their ancestry is complete, and buffered in the [`OrphanPool`]
//! otherwise. Buffered commands are retried whenever an append succeeds.

use crate::error::Result;
use concord_core::{CommandId, EnvelopeEffects, EnvelopeError};
use concord_graph::{AppendOutcome, Command, CommandGraph, GraphError};
use concord_policy::ReconcileReport;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// The graph-exchange surface of a peer
pub trait SyncPeer {
    /// Current global heads
    fn heads(&self) -> BTreeSet<CommandId>;

    /// Sealed envelopes a replica knowing `known` lacks, parents first
    fn missing(&self, known: &[CommandId]) -> Result<Vec<Vec<u8>>>;
}

/// What one ingestion did
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Newly appended commands, in append order
    pub appended: Vec<CommandId>,
    /// Envelopes already in the graph
    pub duplicates: usize,
    /// Commands buffered for missing ancestors
    pub orphaned: Vec<CommandId>,
    /// Orphans evicted because the pool was full
    pub dropped: Vec<CommandId>,
    /// Envelopes that did not open, by position in the input
    pub invalid: Vec<(usize, GraphError)>,
    /// Reconciliation triggered by the new commands
    pub reconciled: ReconcileReport,
}

impl IngestReport {
    /// Whether the graph changed
    pub fn changed(&self) -> bool {
        !self.appended.is_empty()
    }
}

/// Commands waiting for an ancestor
///
/// Bounded: when full, the longest-waiting orphan is evicted to make room.
/// An evicted command is appended once a later sync delivers it again.
#[derive(Debug)]
pub struct OrphanPool {
    capacity: usize,
    waiting: BTreeMap<CommandId, Command>,
    // arrival order; may hold ids already drained or evicted
    arrivals: VecDeque<CommandId>,
}

impl OrphanPool {
    /// Empty pool holding at most `capacity` orphans
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            waiting: BTreeMap::new(),
            arrivals: VecDeque::new(),
        }
    }

    /// Number of buffered orphans
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    /// Whether no orphan is buffered
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Whether `id` is buffered
    pub fn contains(&self, id: &CommandId) -> bool {
        self.waiting.contains_key(id)
    }

    /// Buffer an orphan, returning the id that had to go when the pool is full
    ///
    /// The dropped id is the oldest buffered orphan, or `command` itself when
    /// the pool has no capacity at all.
    pub fn insert(&mut self, command: Command) -> Option<CommandId> {
        let id = command.id();
        if self.waiting.contains_key(&id) {
            return None;
        }
        if self.capacity == 0 {
            return Some(id);
        }
        let evicted = if self.waiting.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };
        self.waiting.insert(id, command);
        self.arrivals.push_back(id);
        evicted
    }

    fn evict_oldest(&mut self) -> Option<CommandId> {
        while let Some(oldest) = self.arrivals.pop_front() {
            if self.waiting.remove(&oldest).is_some() {
                tracing::warn!(
                    command = %oldest,
                    capacity = self.capacity,
                    "Orphan pool full, evicting oldest orphan until it is re-sent"
                );
                return Some(oldest);
            }
        }
        None
    }

    /// Append every buffered command whose ancestry is now complete
    ///
    /// Appended ids are pushed onto `appended` as they land. Repeats until a
    /// pass appends nothing, so chains of orphans resolve in one call. A
    /// command stays buffered when its append fails.
    pub fn drain_into(
        &mut self,
        graph: &mut CommandGraph,
        appended: &mut Vec<CommandId>,
    ) -> Result<()> {
        let result = self.drain_ready(graph, appended);
        self.arrivals.retain(|id| self.waiting.contains_key(id));
        result
    }

    fn drain_ready(
        &mut self,
        graph: &mut CommandGraph,
        appended: &mut Vec<CommandId>,
    ) -> Result<()> {
        loop {
            let ready: Vec<CommandId> = self
                .waiting
                .values()
                .filter(|c| c.parents().iter().all(|p| graph.contains(p)))
                .map(Command::id)
                .collect();
            if ready.is_empty() {
                return Ok(());
            }
            for id in ready {
                let Some(command) = self.waiting.get(&id) else {
                    continue;
                };
                let outcome = graph.append(command.clone())?;
                self.waiting.remove(&id);
                if outcome == AppendOutcome::Accepted {
                    tracing::debug!(command = %id, "Orphan resolved");
                    appended.push(id);
                }
            }
        }
    }
}

/// Open sealed envelopes on up to `workers` threads
///
/// Output order matches input order. Besides opening, each worker checks
/// that the envelope's reported author matches the opened content.
pub fn open_all<E>(
    envelope: &E,
    sealed: Vec<Vec<u8>>,
    workers: usize,
) -> Vec<std::result::Result<Command, GraphError>>
where
    E: EnvelopeEffects + ?Sized,
{
    let workers = workers.max(1);
    if sealed.len() <= 1 || workers == 1 {
        return sealed.into_iter().map(|s| open_one(envelope, s)).collect();
    }

    let chunk = sealed.len().div_ceil(workers);
    let mut batches: Vec<Vec<Vec<u8>>> = Vec::with_capacity(workers);
    let mut rest = sealed.into_iter().peekable();
    while rest.peek().is_some() {
        batches.push(rest.by_ref().take(chunk).collect());
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let len = batch.len();
                let handle = scope.spawn(move || {
                    batch
                        .into_iter()
                        .map(|s| open_one(envelope, s))
                        .collect::<Vec<_>>()
                });
                (len, handle)
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|(len, handle)| match handle.join() {
                Ok(opened) => opened,
                Err(_) => (0..len)
                    .map(|_| {
                        Err(GraphError::SerializationFailed(EnvelopeError::Malformed(
                            "envelope worker panicked".to_string(),
                        )))
                    })
                    .collect(),
            })
            .collect()
    })
}

fn open_one<E>(envelope: &E, sealed: Vec<u8>) -> std::result::Result<Command, GraphError>
where
    E: EnvelopeEffects + ?Sized,
{
    let author = envelope.author_id(&sealed)?;
    let command = Command::open(envelope, sealed)?;
    if command.author() != author {
        return Err(EnvelopeError::Verification(format!(
            "envelope names {author} but content is authored by {}",
            command.author()
        ))
        .into());
    }
    Ok(command)
}
