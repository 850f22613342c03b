//! The Message Bus (C1, §4.1): typed durable queues plus pub/sub channels.
//!
//! Backed by an in-process [`crate::state::StateStore`] for durable queues (write-
//! through snapshots, not a literal Redis client — per §9's open question, "the
//! `Redis-like backing store` language ... describes the wire/semantics contract, not
//! a literal Redis client", consistent with the single-coordinator non-goal) plus
//! `tokio::sync::broadcast` channels for pub/sub. All key composition funnels through
//! [`naming`].

mod error;
pub mod naming;
mod queue;

pub use error::{BusError, BusResult};
pub use queue::{BusSnapshot, QueueConfig, QueueStats, VISIBILITY_TIMEOUT};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration as StdDuration;

use chrono::Duration as ChronoDuration;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant as TokioInstant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::QueueItem;
use crate::state::SharedStateStore;
use naming::{RESERVED_CHANNELS, RESERVED_QUEUES};
use queue::QueueState;

const CHANNEL_CAPACITY: usize = 256;
/// Strings longer than this are clipped when truncating an oversized payload (§4.1 `Send`).
const TRUNCATE_AT_CHARS: usize = 100;
const TRUNCATE_TO_CHARS: usize = 97;

pub type SharedMessageBus = Arc<MessageBus>;

/// Outcome of a successful `Send`/`SendPriority`.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub id: Uuid,
    pub size_bytes: usize,
    pub truncated: bool,
}

struct QueueHandle {
    state: Mutex<QueueState>,
    notify: Notify,
}

struct ChannelHandle {
    sender: broadcast::Sender<Value>,
}

pub struct MessageBus {
    store: Option<SharedStateStore>,
    queues: RwLock<HashMap<String, Arc<QueueHandle>>>,
    channels: RwLock<HashMap<String, ChannelHandle>>,
}

impl MessageBus {
    /// Construct a bus with no durable persistence (used by most unit tests).
    pub fn new() -> Self {
        let bus = Self {
            store: None,
            queues: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
        };
        bus.seed_reserved();
        bus
    }

    /// Construct a bus whose durable queues write through to `store`.
    pub fn with_store(store: SharedStateStore) -> Self {
        let bus = Self {
            store: Some(store),
            queues: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
        };
        bus.seed_reserved();
        bus
    }

    pub fn shared(self) -> SharedMessageBus {
        Arc::new(self)
    }

    fn seed_reserved(&self) {
        for name in RESERVED_QUEUES {
            self.ensure_queue(name, QueueConfig::for_queue(name));
            let dlq = naming::dlq_name(name);
            self.ensure_queue(&dlq, QueueConfig::for_queue(&dlq));
        }
        let mut channels = self.channels.write().expect("channels lock poisoned");
        for name in RESERVED_CHANNELS {
            channels
                .entry((*name).to_string())
                .or_insert_with(|| ChannelHandle {
                    sender: broadcast::channel(CHANNEL_CAPACITY).0,
                });
        }
    }

    fn ensure_queue(&self, name: &str, config: QueueConfig) -> Arc<QueueHandle> {
        {
            let queues = self.queues.read().expect("queues lock poisoned");
            if let Some(handle) = queues.get(name) {
                return handle.clone();
            }
        }
        let mut queues = self.queues.write().expect("queues lock poisoned");
        if let Some(handle) = queues.get(name) {
            return handle.clone();
        }
        let mut state = QueueState::new(config);
        if let Some(store) = &self.store {
            if let Ok(Some(snapshot)) = store.get_bus_snapshot::<BusSnapshot>(&naming::queue_body_key(name)) {
                state.restore(snapshot);
            }
        }
        let handle = Arc::new(QueueHandle {
            state: Mutex::new(state),
            notify: Notify::new(),
        });
        queues.insert(name.to_string(), handle.clone());
        handle
    }

    fn get_queue(&self, name: &str) -> BusResult<Arc<QueueHandle>> {
        let queues = self.queues.read().expect("queues lock poisoned");
        queues
            .get(name)
            .cloned()
            .ok_or_else(|| BusError::QueueNotFound(name.to_string()))
    }

    fn persist(&self, name: &str, handle: &QueueHandle) {
        let (enable_persistence, snapshot) = {
            let state = handle.state.lock().expect("queue lock poisoned");
            (state.config.enable_persistence, state.snapshot())
        };
        if !enable_persistence {
            return;
        }
        if let Some(store) = &self.store {
            if let Err(err) = store.put_bus_snapshot(&naming::queue_body_key(name), &snapshot) {
                warn!(queue = name, error = %err, "failed to persist queue snapshot");
            }
        }
    }

    // -- Queue administration -------------------------------------------------------

    pub fn create_queue(&self, name: &str, config: QueueConfig) -> BusResult<()> {
        naming::validate_queue_name(name)?;
        self.ensure_queue(name, config);
        Ok(())
    }

    pub fn delete_queue(&self, name: &str) -> BusResult<()> {
        let mut queues = self.queues.write().expect("queues lock poisoned");
        queues.remove(name).ok_or_else(|| BusError::QueueNotFound(name.to_string()))?;
        if let Some(store) = &self.store {
            let _ = store.delete_bus_snapshot(&naming::queue_body_key(name));
        }
        Ok(())
    }

    pub fn clear_queue(&self, name: &str) -> BusResult<()> {
        let handle = self.get_queue(name)?;
        {
            let mut state = handle.state.lock().expect("queue lock poisoned");
            state.fifo.clear();
            state.priority.clear();
            state.in_flight.clear();
        }
        self.persist(name, &handle);
        Ok(())
    }

    pub fn queue_names(&self) -> Vec<String> {
        let queues = self.queues.read().expect("queues lock poisoned");
        let mut names: Vec<String> = queues.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self, name: &str) -> BusResult<QueueStats> {
        let handle = self.get_queue(name)?;
        let state = handle.state.lock().expect("queue lock poisoned");
        Ok(state.stats.clone())
    }

    pub fn queue_len(&self, name: &str) -> BusResult<usize> {
        let handle = self.get_queue(name)?;
        let state = handle.state.lock().expect("queue lock poisoned");
        Ok(state.len())
    }

    // -- Send / Receive ---------------------------------------------------------------

    pub fn send<T: Serialize>(&self, queue: &str, payload: &T, ttl: Option<ChronoDuration>) -> BusResult<SendOutcome> {
        self.enqueue(queue, payload, ttl, None)
    }

    pub fn send_priority<T: Serialize>(
        &self,
        queue: &str,
        payload: &T,
        priority: u8,
        ttl: Option<ChronoDuration>,
    ) -> BusResult<SendOutcome> {
        {
            let handle = self.get_queue(queue)?;
            let state = handle.state.lock().expect("queue lock poisoned");
            if !state.config.enable_priority {
                return Err(BusError::PriorityNotEnabled(queue.to_string()));
            }
        }
        self.enqueue(queue, payload, ttl, Some(priority.clamp(1, 10)))
    }

    fn enqueue<T: Serialize>(
        &self,
        queue: &str,
        payload: &T,
        ttl: Option<ChronoDuration>,
        priority: Option<u8>,
    ) -> BusResult<SendOutcome> {
        let handle = self.get_queue(queue)?;
        let mut value = serde_json::to_value(payload).map_err(|e| BusError::Serialization(e.to_string()))?;

        let (max_size, default_ttl, max_retries) = {
            let state = handle.state.lock().expect("queue lock poisoned");
            if state.len() >= state.config.max_queue_size {
                return Err(BusError::QueueFull(queue.to_string()));
            }
            (
                state.config.max_message_size_bytes,
                state.config.default_expiration,
                state.config.max_retries,
            )
        };

        let mut size_bytes = json_size(&value);
        let mut truncated = false;
        if size_bytes > max_size {
            truncated = truncate_long_strings(&mut value);
            size_bytes = json_size(&value);
        }
        if size_bytes > max_size {
            return Err(BusError::OversizedMessage { size: size_bytes, max: max_size });
        }

        let mut item = QueueItem::new(value, queue, ttl.unwrap_or(default_ttl), max_retries);
        if let Some(p) = priority {
            item = item.with_priority(p);
        }
        let id = item.id;

        {
            let mut state = handle.state.lock().expect("queue lock poisoned");
            state.push(item);
            state.stats.sent += 1;
        }
        handle.notify.notify_waiters();
        self.persist(queue, &handle);

        debug!(queue, %id, size_bytes, truncated, "message sent");
        Ok(SendOutcome { id, size_bytes, truncated })
    }

    /// Returns the next eligible item, or `None` if `timeout` elapses with nothing
    /// available. A `None` timeout polls once without waiting.
    pub async fn receive(&self, queue: &str, timeout: Option<StdDuration>) -> BusResult<Option<QueueItem<Value>>> {
        let handle = self.get_queue(queue)?;
        let deadline = timeout.map(|d| TokioInstant::now() + d);

        loop {
            let found = {
                let mut state = handle.state.lock().expect("queue lock poisoned");
                state.reclaim_expired_in_flight();
                let (item, expired) = state.pop_eligible();
                state.stats.expired += expired;
                if let Some(item) = &item {
                    state.stats.received += 1;
                    state.in_flight.insert(item.id, (item.clone(), chrono::Utc::now() + VISIBILITY_TIMEOUT));
                }
                item
            };
            if found.is_some() {
                self.persist(queue, &handle);
                return Ok(found);
            }
            match deadline {
                None => return Ok(None),
                Some(deadline) => {
                    let now = TokioInstant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    let remaining = deadline - now;
                    let _ = tokio::time::timeout(remaining, handle.notify.notified()).await;
                }
            }
        }
    }

    pub fn acknowledge(&self, queue: &str, id: Uuid) -> BusResult<()> {
        let handle = self.get_queue(queue)?;
        let mut state = handle.state.lock().expect("queue lock poisoned");
        if state.in_flight.remove(&id).is_some() {
            state.stats.acknowledged += 1;
            Ok(())
        } else {
            Err(BusError::ItemNotFound(format!("{queue}#{id}")))
        }
    }

    /// `reject`: if `requeue` and the item has retries left, re-enqueue with an
    /// incremented `retryCount`; otherwise move it to the queue's DLQ (§4.1 `Reject`).
    pub fn reject(&self, queue: &str, id: Uuid, requeue: bool) -> BusResult<()> {
        let handle = self.get_queue(queue)?;
        let (mut item, dlq_name) = {
            let mut state = handle.state.lock().expect("queue lock poisoned");
            let (item, _) = state
                .in_flight
                .remove(&id)
                .ok_or_else(|| BusError::ItemNotFound(format!("{queue}#{id}")))?;
            state.stats.rejected += 1;
            (item, state.config.dead_letter_queue.clone())
        };

        if requeue && item.retry_count < item.max_retries {
            item.retry_count += 1;
            let mut state = handle.state.lock().expect("queue lock poisoned");
            state.push(item);
            drop(state);
            handle.notify.notify_waiters();
            self.persist(queue, &handle);
            return Ok(());
        }

        let dlq = self.ensure_queue(&dlq_name, QueueConfig::for_queue(&dlq_name));
        {
            let mut dlq_state = dlq.state.lock().expect("queue lock poisoned");
            dlq_state.push(item);
        }
        {
            let mut state = handle.state.lock().expect("queue lock poisoned");
            state.stats.dead_lettered += 1;
        }
        dlq.notify.notify_waiters();
        self.persist(&dlq_name, &dlq);
        self.persist(queue, &handle);
        Ok(())
    }

    // -- Pub/sub ----------------------------------------------------------------------

    pub fn publish<T: Serialize>(&self, channel: &str, payload: &T) -> BusResult<()> {
        let value = serde_json::to_value(payload).map_err(|e| BusError::Serialization(e.to_string()))?;
        let channels = self.channels.read().expect("channels lock poisoned");
        let handle = channels
            .get(channel)
            .ok_or_else(|| BusError::ChannelNotFound(channel.to_string()))?;
        // A publish with no subscribers is not an error: "missed while not subscribed are lost."
        let _ = handle.sender.send(value);
        Ok(())
    }

    pub fn subscribe(&self, channel: &str) -> BusResult<broadcast::Receiver<Value>> {
        {
            let channels = self.channels.read().expect("channels lock poisoned");
            if let Some(handle) = channels.get(channel) {
                return Ok(handle.sender.subscribe());
            }
        }
        let mut channels = self.channels.write().expect("channels lock poisoned");
        let handle = channels
            .entry(channel.to_string())
            .or_insert_with(|| ChannelHandle { sender: broadcast::channel(CHANNEL_CAPACITY).0 });
        Ok(handle.sender.subscribe())
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize a received item's `data` field back into `T` (round-trip helper for
/// callers that know the payload type; the bus itself is payload-type-agnostic).
pub fn decode<T: DeserializeOwned>(item: &QueueItem<Value>) -> BusResult<T> {
    serde_json::from_value(item.data.clone()).map_err(|e| BusError::Serialization(e.to_string()))
}

fn json_size(value: &Value) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(usize::MAX)
}

/// Clip every string field longer than 100 chars to 97 chars + `"..."` (§4.1 `Send`
/// truncation algorithm). Returns whether anything was actually truncated.
fn truncate_long_strings(value: &mut Value) -> bool {
    match value {
        Value::String(s) => {
            if s.chars().count() > TRUNCATE_AT_CHARS {
                let clipped: String = s.chars().take(TRUNCATE_TO_CHARS).collect();
                *s = format!("{clipped}...");
                true
            } else {
                false
            }
        }
        Value::Array(items) => items.iter_mut().fold(false, |acc, v| truncate_long_strings(v) || acc),
        Value::Object(map) => map.values_mut().fold(false, |acc, v| truncate_long_strings(v) || acc),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_then_receive_round_trips_structured_payload() {
        let bus = MessageBus::new();
        bus.create_queue("test.q", QueueConfig::default()).unwrap();
        bus.send("test.q", &json!({"a": 1, "b": "two"}), None).unwrap();
        let item = bus.receive("test.q", None).await.unwrap().unwrap();
        assert_eq!(item.data, json!({"a": 1, "b": "two"}));
    }

    #[tokio::test]
    async fn priority_ordering_is_respected_on_receive() {
        let bus = MessageBus::new();
        bus.create_queue("test.pq", QueueConfig { enable_priority: true, ..QueueConfig::default() })
            .unwrap();
        bus.send_priority("test.pq", &json!(2), 2, None).unwrap();
        tokio::time::sleep(StdDuration::from_millis(1)).await;
        bus.send_priority("test.pq", &json!(8), 8, None).unwrap();
        tokio::time::sleep(StdDuration::from_millis(1)).await;
        bus.send_priority("test.pq", &json!(5), 5, None).unwrap();

        let first = bus.receive("test.pq", None).await.unwrap().unwrap();
        let second = bus.receive("test.pq", None).await.unwrap().unwrap();
        let third = bus.receive("test.pq", None).await.unwrap().unwrap();
        assert_eq!(first.data, json!(8));
        assert_eq!(second.data, json!(5));
        assert_eq!(third.data, json!(2));
    }

    #[test]
    fn send_priority_on_non_priority_queue_fails() {
        let bus = MessageBus::new();
        bus.create_queue("test.np", QueueConfig::default()).unwrap();
        let err = bus.send_priority("test.np", &json!(1), 5, None).unwrap_err();
        assert!(matches!(err, BusError::PriorityNotEnabled(_)));
    }

    #[test]
    fn oversized_untruncatable_message_is_rejected() {
        let bus = MessageBus::new();
        bus.create_queue(
            "test.small",
            QueueConfig { max_message_size_bytes: 16, ..QueueConfig::default() },
        )
        .unwrap();
        // All strings are short, so truncation cannot shrink this below the limit.
        let err = bus.send("test.small", &json!({"a": "x", "b": "y", "c": "z"}), None).unwrap_err();
        assert!(matches!(err, BusError::OversizedMessage { .. }));
    }

    #[test]
    fn oversized_truncatable_message_is_truncated() {
        let bus = MessageBus::new();
        bus.create_queue("test.trunc", QueueConfig::default()).unwrap();
        let long = "x".repeat(4000);
        let outcome = bus.send("test.trunc", &json!({"description": long}), None).unwrap();
        assert!(outcome.truncated);
        assert!(outcome.size_bytes <= 2048);
    }

    #[tokio::test]
    async fn reject_without_requeue_moves_to_dlq() {
        let bus = MessageBus::new();
        bus.create_queue("test.dlq_src", QueueConfig { dead_letter_queue: "test.dlq_src.dlq".into(), ..QueueConfig::default() })
            .unwrap();
        bus.send("test.dlq_src", &json!("payload"), None).unwrap();
        let item = bus.receive("test.dlq_src", None).await.unwrap().unwrap();
        bus.reject("test.dlq_src", item.id, false).unwrap();
        assert_eq!(bus.queue_len("test.dlq_src").unwrap(), 0);
        assert_eq!(bus.queue_len("test.dlq_src.dlq").unwrap(), 1);
    }

    #[tokio::test]
    async fn reject_with_requeue_and_retries_left_goes_back_on_queue() {
        let bus = MessageBus::new();
        bus.create_queue("test.retry", QueueConfig::default()).unwrap();
        bus.send("test.retry", &json!("payload"), None).unwrap();
        let item = bus.receive("test.retry", None).await.unwrap().unwrap();
        assert_eq!(item.retry_count, 0);
        bus.reject("test.retry", item.id, true).unwrap();
        let redelivered = bus.receive("test.retry", None).await.unwrap().unwrap();
        assert_eq!(redelivered.retry_count, 1);
    }

    #[test]
    fn publish_subscribe_round_trips() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe("swarm.heartbeats").unwrap();
        bus.publish("swarm.heartbeats", &json!({"ping": true})).unwrap();
        let received = rx.try_recv().unwrap();
        assert_eq!(received, json!({"ping": true}));
    }

    #[test]
    fn publish_with_no_subscribers_is_not_an_error() {
        let bus = MessageBus::new();
        bus.publish("swarm.shutdown", &json!("go")).unwrap();
    }

    #[test]
    fn reserved_queues_and_dlqs_exist_at_construction() {
        let bus = MessageBus::new();
        let names = bus.queue_names();
        assert!(names.contains(&"swarm.codeunit.assignments".to_string()));
        assert!(names.contains(&"swarm.codeunit.assignments.dlq".to_string()));
    }

    #[test]
    fn invalid_queue_name_is_rejected() {
        let bus = MessageBus::new();
        let err = bus.create_queue("bad:name", QueueConfig::default()).unwrap_err();
        assert!(matches!(err, BusError::InvalidQueueName(_)));
    }
}
