//! In-memory queue bodies: config, the priority/FIFO orderings, and in-flight tracking.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::QueueItem;

/// Per-queue configuration (§4.1 "Per-queue configuration (enumerated)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub max_message_size_bytes: usize,
    pub max_queue_size: usize,
    pub default_expiration: Duration,
    pub enable_persistence: bool,
    pub enable_priority: bool,
    pub max_retries: u32,
    pub dead_letter_queue: String,
}

impl QueueConfig {
    pub fn for_queue(name: &str) -> Self {
        Self {
            dead_letter_queue: super::naming::dlq_name(name),
            enable_priority: super::naming::RESERVED_QUEUES.contains(&name),
            ..Self::default()
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_message_size_bytes: 2048,
            max_queue_size: 10_000,
            default_expiration: Duration::hours(1),
            enable_persistence: true,
            enable_priority: false,
            max_retries: 3,
            dead_letter_queue: String::new(),
        }
    }
}

/// Wraps a `QueueItem` so a `BinaryHeap` orders by `(priority desc, enqueuedAt asc)`
/// (§4.1 priority queue semantics; GLOSSARY "Priority queue").
#[derive(Debug, Clone)]
pub struct HeapEntry(pub QueueItem<Value>);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.enqueued_at.cmp(&self.0.enqueued_at))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Running counters for `GetStats` (§4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub sent: u64,
    pub received: u64,
    pub acknowledged: u64,
    pub rejected: u64,
    pub expired: u64,
    pub dead_lettered: u64,
}

/// A JSON-serializable write-through snapshot of a queue body (§4.1 `enablePersistence`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BusSnapshot {
    pub fifo: Vec<QueueItem<Value>>,
    pub priority: Vec<QueueItem<Value>>,
}

/// One queue's mutable body: config, the pending items (either ordering, never both
/// populated for the same queue) and the visibility-timeout in-flight set.
pub struct QueueState {
    pub config: QueueConfig,
    pub fifo: VecDeque<QueueItem<Value>>,
    pub priority: BinaryHeap<HeapEntry>,
    pub in_flight: HashMap<Uuid, (QueueItem<Value>, DateTime<Utc>)>,
    pub stats: QueueStats,
}

/// How long a received-but-unacknowledged item stays invisible before redelivery
/// (§5 "Redelivery after timeout-without-ack is permitted").
pub const VISIBILITY_TIMEOUT: Duration = Duration::seconds(30);

impl QueueState {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            fifo: VecDeque::new(),
            priority: BinaryHeap::new(),
            in_flight: HashMap::new(),
            stats: QueueStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.fifo.len() + self.priority.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, item: QueueItem<Value>) {
        if self.config.enable_priority {
            self.priority.push(HeapEntry(item));
        } else {
            self.fifo.push_back(item);
        }
    }

    /// Pop the next eligible item, silently discarding any expired items ahead of it
    /// (§3 invariant: expired items are never delivered).
    pub fn pop_eligible(&mut self) -> (Option<QueueItem<Value>>, u64) {
        let mut expired = 0;
        loop {
            let next = if self.config.enable_priority {
                self.priority.pop().map(|e| e.0)
            } else {
                self.fifo.pop_front()
            };
            match next {
                Some(item) if item.is_expired() => {
                    expired += 1;
                    continue;
                }
                Some(item) => return (Some(item), expired),
                None => return (None, expired),
            }
        }
    }

    /// Move any in-flight item whose visibility timeout has elapsed back onto the
    /// queue for redelivery.
    pub fn reclaim_expired_in_flight(&mut self) {
        let now = Utc::now();
        let expired_ids: Vec<Uuid> = self
            .in_flight
            .iter()
            .filter(|(_, (_, deadline))| *deadline < now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired_ids {
            if let Some((item, _)) = self.in_flight.remove(&id) {
                self.push(item);
            }
        }
    }

    pub fn snapshot(&self) -> BusSnapshot {
        BusSnapshot {
            fifo: self.fifo.iter().cloned().collect(),
            priority: self.priority.iter().map(|e| e.0.clone()).collect(),
        }
    }

    pub fn restore(&mut self, snapshot: BusSnapshot) {
        self.fifo = snapshot.fifo.into_iter().collect();
        for item in snapshot.priority {
            self.priority.push(HeapEntry(item));
        }
    }
}
