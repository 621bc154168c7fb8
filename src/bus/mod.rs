//! Fan-out event distribution
//!
//! The bus copies every published event into one independent queue per
//! subscriber, so a slow consumer never starves a fast one and the
//! ingestion side never needs to know who is listening.
//!
//! # Ordering
//!
//! Publishes are serialised through a FIFO-fair gate. For any two
//! `publish` calls `A` then `B`, every subscriber observes `A` before `B`,
//! no matter which worker issued them.
//!
//! # Backpressure
//!
//! With a bounded capacity, `publish` waits until every bounded queue has
//! room. Slots are reserved on all queues before anything is delivered, so
//! dropping a waiting `publish` future leaves no queue holding the event.
//!
//! # Example
//!
//! ```ignore
//! use statuswatch::bus::EventBus;
//!
//! let bus = EventBus::unbounded();
//! let mut subscription = bus.subscribe();
//!
//! bus.publish(event).await;
//! let received = subscription.recv().await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, Mutex};

use crate::config::BusConfig;
use crate::metrics;
use crate::models::StatusEvent;

// ============================================================================
// Subscriber Queues
// ============================================================================

/// Sending half of one subscriber queue
#[derive(Clone)]
enum QueueSender {
    Bounded(mpsc::Sender<Arc<StatusEvent>>),
    Unbounded(mpsc::UnboundedSender<Arc<StatusEvent>>),
}

impl QueueSender {
    fn is_closed(&self) -> bool {
        match self {
            Self::Bounded(tx) => tx.is_closed(),
            Self::Unbounded(tx) => tx.is_closed(),
        }
    }
}

#[derive(Clone)]
struct SubscriberQueue {
    id: u64,
    sender: QueueSender,
}

/// Slot reserved on a queue during the first phase of a publish
enum ReservedSlot<'a> {
    Bounded(mpsc::Permit<'a, Arc<StatusEvent>>),
    Unbounded(u64, &'a mpsc::UnboundedSender<Arc<StatusEvent>>),
}

enum QueueReceiver {
    Bounded(mpsc::Receiver<Arc<StatusEvent>>),
    Unbounded(mpsc::UnboundedReceiver<Arc<StatusEvent>>),
}

/// Handle to one subscriber's delivery queue
///
/// Dropping the subscription closes the queue; the bus prunes it on the
/// next publish.
pub struct Subscription {
    id: u64,
    receiver: QueueReceiver,
}

impl Subscription {
    /// Identifier of this subscription within its bus
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the bus has been dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<Arc<StatusEvent>> {
        match &mut self.receiver {
            QueueReceiver::Bounded(rx) => rx.recv().await,
            QueueReceiver::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<Arc<StatusEvent>> {
        match &mut self.receiver {
            QueueReceiver::Bounded(rx) => rx.try_recv().ok(),
            QueueReceiver::Unbounded(rx) => rx.try_recv().ok(),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Statistics for the bus
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Total publish calls completed
    pub events_published: u64,

    /// Total events placed into subscriber queues
    pub deliveries: u64,

    /// Subscriber queues removed after their consumer went away
    pub subscribers_pruned: u64,
}

/// Fan-out distribution channel
pub struct EventBus {
    /// Per-subscriber queue capacity; `None` means unbounded
    capacity: Option<usize>,

    /// Registered subscriber queues, in subscription order
    subscribers: RwLock<Vec<SubscriberQueue>>,

    /// Serialises publishes and owns the statistics
    publish_gate: Mutex<BusStats>,

    next_id: AtomicU64,
}

impl EventBus {
    /// Create a bus; `capacity` bounds every subscriber queue
    ///
    /// A capacity of zero is treated as one, since a queue must be able to
    /// hold at least the event being delivered.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity: capacity.map(|c| c.max(1)),
            subscribers: RwLock::new(Vec::new()),
            publish_gate: Mutex::new(BusStats::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Create a bus whose queues never apply backpressure
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Create a bus whose queues hold at most `capacity` events
    pub fn bounded(capacity: usize) -> Self {
        Self::new(Some(capacity))
    }

    /// Create from configuration
    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.queue_capacity)
    }

    /// Per-subscriber capacity (`None` = unbounded)
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Create a new independent delivery queue
    ///
    /// A late subscriber only sees events published after this call.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (sender, receiver) = match self.capacity {
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity);
                (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
            }
        };

        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SubscriberQueue { id, sender });

        tracing::debug!(subscriber = id, capacity = ?self.capacity, "Subscriber registered");

        Subscription { id, receiver }
    }

    /// Number of live subscriber queues
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|q| !q.sender.is_closed())
            .count()
    }

    /// Publish an event to every subscriber queue
    ///
    /// Returns the number of queues the event was delivered to.
    pub async fn publish(&self, event: StatusEvent) -> usize {
        let event = Arc::new(event);
        let mut stats = self.publish_gate.lock().await;

        let targets: Vec<SubscriberQueue> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut closed = Vec::new();
        let mut slots = Vec::with_capacity(targets.len());

        // Phase 1: reserve room everywhere. Cancelling here drops the permits.
        for queue in &targets {
            match &queue.sender {
                QueueSender::Bounded(tx) => match tx.reserve().await {
                    Ok(permit) => slots.push(ReservedSlot::Bounded(permit)),
                    Err(_) => closed.push(queue.id),
                },
                QueueSender::Unbounded(tx) => slots.push(ReservedSlot::Unbounded(queue.id, tx)),
            }
        }

        // Phase 2: deliver to all queues without suspending.
        let mut delivered = 0;
        for slot in slots {
            match slot {
                ReservedSlot::Bounded(permit) => {
                    permit.send(Arc::clone(&event));
                    delivered += 1;
                }
                ReservedSlot::Unbounded(id, tx) => {
                    if tx.send(Arc::clone(&event)).is_ok() {
                        delivered += 1;
                    } else {
                        closed.push(id);
                    }
                }
            }
        }

        if !closed.is_empty() {
            self.prune(&closed);
            stats.subscribers_pruned += closed.len() as u64;
        }

        stats.events_published += 1;
        stats.deliveries += delivered as u64;
        metrics::record_deliveries(delivered);

        tracing::trace!(
            provider = %event.provider,
            id = %event.id,
            delivered,
            "Event published"
        );

        delivered
    }

    /// Snapshot of bus statistics
    ///
    /// Waits for any in-progress publish to finish.
    pub async fn stats(&self) -> BusStats {
        self.publish_gate.lock().await.clone()
    }

    fn prune(&self, ids: &[u64]) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|q| !ids.contains(&q.id));

        tracing::debug!(subscribers = ?ids, "Pruned closed subscriber queues");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
