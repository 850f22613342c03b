//! RocksDB-backed persistence: column-family naming (`schema`) and the typed
//! put/get/list wrappers (`store`) every other module in this crate is built on.

pub mod schema;
pub mod store;

pub use store::{SharedStateStore, StateStore, StoreError, StoreResult};
