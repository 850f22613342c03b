//! Key composition for the message bus (§4.1 "Key naming (normative)").
//!
//! This is the sole place that composes bus keys, mirroring [`crate::state::schema::keys`]:
//! sender/consumer name mismatch is, per the spec, "the single largest historical bug
//! class" and must be ruled out by construction by funneling every key through here.

use std::sync::LazyLock;

use regex::Regex;

use crate::bus::BusError;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap());

/// Reserved durable queues (§4.1); each gets an implicit `.dlq` companion.
pub const RESERVED_QUEUES: &[&str] = &[
    "swarm.spawn.requests",
    "swarm.completions",
    "swarm.function.assignments",
    "swarm.codeunit.assignments",
    "swarm.workload.distribution",
    "builder.notifications",
    "builder.errors",
];

/// Reserved pub/sub channels (§4.1); no retention.
pub const RESERVED_CHANNELS: &[&str] = &["swarm.status.updates", "swarm.heartbeats", "swarm.shutdown"];

/// Queue names must match `[A-Za-z0-9._-]+` and must not contain any reserved
/// prefix/suffix used internally for key composition.
pub fn validate_queue_name(name: &str) -> Result<(), BusError> {
    if name.is_empty() || !NAME_PATTERN.is_match(name) {
        return Err(BusError::InvalidQueueName(name.to_string()));
    }
    if name.contains("maestro:") {
        return Err(BusError::InvalidQueueName(name.to_string()));
    }
    if name.ends_with(":priority") || name.ends_with(":stats") {
        return Err(BusError::InvalidQueueName(name.to_string()));
    }
    Ok(())
}

/// The `<name>.dlq` companion of a queue.
pub fn dlq_name(queue: &str) -> String {
    format!("{queue}.dlq")
}

/// `maestro:queue:<name>` — the body of the queue.
pub fn queue_body_key(name: &str) -> String {
    format!("maestro:queue:{name}")
}

/// `maestro:queue:<name>:priority` — the priority-ordered body of the queue.
pub fn queue_priority_key(name: &str) -> String {
    format!("maestro:queue:{name}:priority")
}

/// `maestro:config:queue:<name>` — the per-queue configuration.
pub fn queue_config_key(name: &str) -> String {
    format!("maestro:config:queue:{name}")
}

/// `maestro:stats:<name>:stats` — the running stats for a queue.
pub fn queue_stats_key(name: &str) -> String {
    format!("maestro:stats:{name}:stats")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dotted_and_dashed_names() {
        assert!(validate_queue_name("swarm.codeunit.assignments").is_ok());
        assert!(validate_queue_name("builder.errors.dlq").is_ok());
        assert!(validate_queue_name("my-queue_1").is_ok());
    }

    #[test]
    fn rejects_empty_and_colon_names() {
        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name("has:colon").is_err());
        assert!(validate_queue_name("maestro:queue:x").is_err());
    }

    #[test]
    fn rejects_reserved_suffixes() {
        assert!(validate_queue_name("foo:priority").is_err());
        assert!(validate_queue_name("foo:stats").is_err());
    }

    #[test]
    fn key_composition_is_stable() {
        assert_eq!(queue_body_key("swarm.completions"), "maestro:queue:swarm.completions");
        assert_eq!(
            queue_priority_key("swarm.completions"),
            "maestro:queue:swarm.completions:priority"
        );
        assert_eq!(
            queue_config_key("swarm.completions"),
            "maestro:config:queue:swarm.completions"
        );
        assert_eq!(
            queue_stats_key("swarm.completions"),
            "maestro:stats:swarm.completions:stats"
        );
    }
}
