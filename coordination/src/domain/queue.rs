use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Envelope around one message body moving through the message bus.
///
/// Mirrors the normative wire format in §6: `{id, data, timestamp, expiresAt, priority,
/// retryCount, maxRetries, queueName, metadata}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem<T> {
    pub id: Uuid,
    pub data: T,
    pub enqueued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub priority: u8,
    pub retry_count: u32,
    pub max_retries: u32,
    pub queue_name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl<T> QueueItem<T> {
    pub fn new(data: T, queue_name: impl Into<String>, ttl: chrono::Duration, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            data,
            enqueued_at: now,
            expires_at: now + ttl,
            priority: 0,
            retry_count: 0,
            max_retries,
            queue_name: queue_name.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Queue items with `expiresAt < now` are never delivered (§3 invariant).
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Ordering key for priority queues: `(priority desc, enqueuedAt asc)` (§4.1, GLOSSARY).
    pub fn ordering_key(&self) -> (std::cmp::Reverse<u8>, DateTime<Utc>) {
        (std::cmp::Reverse(self.priority), self.enqueued_at)
    }
}
