//! Coordination core for the Maestro orchestrator.
//!
//! This crate holds everything that is stateful and shared across a pipeline run:
//! the data model (§3), the Message Bus (§4.1), the Cross-Reference Registry (§4.2),
//! the Swarm Policy (§4.5) and the Code-Unit Controller (§4.6), all sitting on top of
//! a single RocksDB-backed `StateStore`.
//!
//! `swarm-agents` (the sibling crate) depends on this one for every durable type and
//! every coordination primitive; it owns the LLM-facing and stage-driving pieces that
//! have no reason to live next to the storage/bus/policy layer.

#![allow(clippy::uninlined_format_args)]

pub mod bus;
pub mod controller;
pub mod domain;
pub mod errors;
pub mod llm;
pub mod policy;
pub mod state;
pub mod xref;

pub use bus::{BusError, MessageBus, SharedMessageBus};
pub use controller::{CodeUnitController, ControllerError, MethodWorker};
pub use domain::*;
pub use errors::{Categorized, Category};
pub use llm::{estimate_tokens, Generate, GenerateRequest, LlmResponse};
pub use policy::{SpawnCapacity, SwarmPolicy, SwarmPolicyConfig};
pub use state::{SharedStateStore, StateStore, StoreError};
pub use xref::{CrossReferenceRegistry, GraphStore, SearchIndex, XrefError};
