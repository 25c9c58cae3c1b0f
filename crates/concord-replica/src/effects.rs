//! Effect stream
//!
//! Every effect record produced by the engine is fanned out to all live
//! subscribers, in the order the engine produced them. Subscribers that have
//! dropped their receiver are pruned on the next delivery.

use concord_policy::EffectRecord;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Fan-out of effect records to subscribers
#[derive(Debug, Default)]
pub struct EffectBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<EffectRecord>>>,
}

impl EffectBus {
    /// Bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// New receiver for every record delivered from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<EffectRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver records to every live subscriber
    pub fn deliver<'a>(&self, records: impl IntoIterator<Item = &'a EffectRecord>) {
        let mut subscribers = self.subscribers.lock();
        for record in records {
            subscribers.retain(|tx| tx.send(record.clone()).is_ok());
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}
