//! In-process change feed.
//!
//! [`ChangeFeed`] is the in-memory [`ChangeNotifier`]: it fans committed
//! change messages out to subscribers, keeps a bounded history that can be
//! polled by sequence number, and buffers reconciliation requests.
//!
//! # Usage
//!
//! ```rust
//! use tablesync_core::{ChangeFeed, ChangeMessage, ChangeNotifier, ObjectId, TableKind};
//!
//! let feed = ChangeFeed::new();
//! let receiver = feed.subscribe();
//!
//! feed.publish(vec![ChangeMessage::update(ObjectId::latest(7), TableKind::ReplicationView)]);
//!
//! let event = receiver.recv().unwrap();
//! assert_eq!(event.message.object_id, ObjectId::latest(7));
//! ```

use crate::notify::{ChangeMessage, ChangeNotifier};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashSet, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, trace, warn};

/// Messages kept for polling unless configured otherwise.
const DEFAULT_HISTORY: usize = 10_000;

/// Distinct containers kept awaiting reconciliation unless configured otherwise.
const DEFAULT_PENDING_RECONCILIATION: usize = 100_000;

/// A published change message and its feed sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Monotonic sequence assigned at publication, starting at 1.
    pub sequence: u64,
    /// The message.
    pub message: ChangeMessage,
}

#[derive(Default)]
struct Log {
    events: VecDeque<ChangeEvent>,
    last_sequence: u64,
}

/// Containers awaiting reconciliation, each at most once.
#[derive(Default)]
struct Pending {
    order: VecDeque<u64>,
    queued: HashSet<u64>,
}

/// Distributes committed change messages to index workers.
///
/// Messages of one `publish` call keep their order and receive consecutive
/// sequence numbers. Subscribers whose receiver was dropped are pruned on
/// the next publication.
///
/// A container already awaiting reconciliation is not queued twice. When the
/// queue is full the oldest requests are dropped.
pub struct ChangeFeed {
    log: RwLock<Log>,
    capacity: usize,
    subscribers: Mutex<Vec<Sender<ChangeEvent>>>,
    reconciliation: Mutex<Pending>,
    reconciliation_capacity: usize,
}

impl ChangeFeed {
    /// Creates a feed keeping the last 10,000 messages.
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_HISTORY)
    }

    /// Creates a feed keeping the last `capacity` messages.
    pub fn with_max_history(capacity: usize) -> Self {
        Self {
            log: RwLock::new(Log::default()),
            capacity,
            subscribers: Mutex::new(Vec::new()),
            reconciliation: Mutex::new(Pending::default()),
            reconciliation_capacity: DEFAULT_PENDING_RECONCILIATION,
        }
    }

    /// Keeps at most `capacity` containers awaiting reconciliation.
    pub fn with_reconciliation_capacity(mut self, capacity: usize) -> Self {
        self.reconciliation_capacity = capacity;
        self
    }

    /// Subscribes to every message published from now on.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Messages after `cursor`, oldest first, at most `limit` of them.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.log
            .read()
            .events
            .iter()
            .skip_while(|event| event.sequence <= cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sequence of the newest message, or 0 before the first publication.
    pub fn latest_sequence(&self) -> u64 {
        self.log.read().last_sequence
    }

    /// Live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Messages retained for polling.
    pub fn history_len(&self) -> usize {
        self.log.read().events.len()
    }

    /// Takes every queued reconciliation container id, oldest first.
    pub fn drain_reconciliation(&self) -> Vec<u64> {
        let pending = std::mem::take(&mut *self.reconciliation.lock());
        pending.order.into()
    }

    /// Returns the queued reconciliation container ids without removing them.
    pub fn pending_reconciliation(&self) -> Vec<u64> {
        self.reconciliation.lock().order.iter().copied().collect()
    }

    fn append(&self, messages: Vec<ChangeMessage>) -> Vec<ChangeEvent> {
        let mut log = self.log.write();
        let mut appended = Vec::with_capacity(messages.len());
        for message in messages {
            log.last_sequence += 1;
            let event = ChangeEvent {
                sequence: log.last_sequence,
                message,
            };
            log.events.push_back(event.clone());
            appended.push(event);
        }
        while log.events.len() > self.capacity {
            log.events.pop_front();
        }
        appended
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier for ChangeFeed {
    fn publish(&self, messages: Vec<ChangeMessage>) {
        if messages.is_empty() {
            return;
        }
        // Held across the append so subscribers receive sequences in order.
        let mut subscribers = self.subscribers.lock();
        let events = self.append(messages);
        for event in &events {
            trace!(
                sequence = event.sequence,
                object_id = %event.message.object_id,
                change_type = ?event.message.change_type,
                "publishing change message"
            );
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
        debug!(
            count = events.len(),
            subscribers = subscribers.len(),
            "published change messages"
        );
    }

    fn send_to_reconciliation_queue(&self, container_ids: Vec<u64>) {
        debug!(count = container_ids.len(), "queueing containers for reconciliation");
        let mut pending = self.reconciliation.lock();
        for id in container_ids {
            if pending.queued.insert(id) {
                pending.order.push_back(id);
            }
        }
        let mut dropped = 0;
        while pending.order.len() > self.reconciliation_capacity {
            if let Some(id) = pending.order.pop_front() {
                pending.queued.remove(&id);
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(dropped, "reconciliation queue full, dropped oldest requests");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChangeType;
    use crate::types::{ObjectId, TableKind};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn update(id: u64) -> ChangeMessage {
        ChangeMessage::update(ObjectId::latest(id), TableKind::RowTable)
    }

    #[test]
    fn batch_keeps_order_and_sequences() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        feed.publish(vec![
            update(1),
            ChangeMessage::delete(ObjectId::latest(2), TableKind::ReplicationView),
        ]);

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert_eq!(first.message, update(1));
        assert_eq!(second.message.change_type, ChangeType::Delete);
        assert_eq!(feed.latest_sequence(), 2);
    }

    #[test]
    fn every_subscriber_sees_each_message() {
        let feed = ChangeFeed::new();
        let workers: Vec<_> = (0..3).map(|_| feed.subscribe()).collect();
        feed.publish(vec![update(9)]);
        for rx in &workers {
            assert_eq!(rx.try_recv().unwrap().message, update(9));
        }
    }

    #[test]
    fn late_subscriber_misses_earlier_messages() {
        let feed = ChangeFeed::new();
        feed.publish(vec![update(1)]);
        let rx = feed.subscribe();
        assert!(rx.try_recv().is_err());
        assert_eq!(feed.poll(0, 10).len(), 1);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let feed = ChangeFeed::new();
        let kept = feed.subscribe();
        drop(feed.subscribe());
        assert_eq!(feed.subscriber_count(), 2);

        feed.publish(vec![update(1)]);
        assert_eq!(feed.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn empty_publish_is_ignored() {
        let feed = ChangeFeed::new();
        feed.publish(Vec::new());
        assert_eq!(feed.latest_sequence(), 0);
        assert_eq!(feed.history_len(), 0);
    }

    #[test]
    fn poll_resumes_after_cursor() {
        let feed = ChangeFeed::new();
        feed.publish((1..=5).map(update).collect());

        let page = feed.poll(2, 2);
        let sequences: Vec<u64> = page.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![3, 4]);
        assert!(feed.poll(5, 10).is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let feed = ChangeFeed::with_max_history(3);
        feed.publish((1..=4).map(update).collect());
        feed.publish(vec![update(5)]);

        assert_eq!(feed.history_len(), 3);
        assert_eq!(feed.poll(0, 10)[0].sequence, 3);
        assert_eq!(feed.latest_sequence(), 5);
    }

    #[test]
    fn reconciliation_queue_drains_in_order() {
        let feed = ChangeFeed::new();
        feed.send_to_reconciliation_queue(vec![3, 1]);
        feed.send_to_reconciliation_queue(vec![2]);
        assert_eq!(feed.pending_reconciliation(), vec![3, 1, 2]);
        assert_eq!(feed.drain_reconciliation(), vec![3, 1, 2]);
        assert!(feed.drain_reconciliation().is_empty());
    }

    #[test]
    fn reconciliation_queue_skips_pending_duplicates() {
        let feed = ChangeFeed::new();
        feed.send_to_reconciliation_queue(vec![4, 5]);
        feed.send_to_reconciliation_queue(vec![5, 4, 6]);
        assert_eq!(feed.drain_reconciliation(), vec![4, 5, 6]);

        feed.send_to_reconciliation_queue(vec![4]);
        assert_eq!(feed.pending_reconciliation(), vec![4]);
    }

    #[test]
    fn reconciliation_queue_is_bounded() {
        let feed = ChangeFeed::new().with_reconciliation_capacity(3);
        for round in 0..10u64 {
            feed.send_to_reconciliation_queue((round * 10..round * 10 + 5).collect());
        }
        assert_eq!(feed.pending_reconciliation(), vec![92, 93, 94]);

        // A dropped request may be queued again.
        feed.send_to_reconciliation_queue(vec![0]);
        assert_eq!(feed.drain_reconciliation(), vec![93, 94, 0]);
    }

    #[test]
    fn publishes_across_threads() {
        let feed = Arc::new(ChangeFeed::new());
        let rx = feed.subscribe();

        let publishers: Vec<_> = (0..4)
            .map(|id| {
                let feed = Arc::clone(&feed);
                thread::spawn(move || feed.publish(vec![update(id)]))
            })
            .collect();
        for handle in publishers {
            handle.join().unwrap();
        }

        let mut sequences: Vec<u64> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_millis(500)).unwrap().sequence)
            .collect();
        sequences.sort_unstable();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
    }
}
