//! Persistent cross-invocation state
//!
//! The agent runs as repeated short-lived invocations, so everything that
//! must survive between runs lives behind two narrow repository traits:
//!
//! - [`AlertStateStore`]: one durable record per alert key, backing the
//!   dedup/cooldown state machine in the dispatcher
//! - [`BaselineStore`]: previous samples for delta-based checks
//!   (interface error counters, VM/CT running sets)
//!
//! ## Backends
//!
//! - **File** (default): one JSON record per key, written temp+rename so
//!   an interrupted process never leaves a truncated record
//! - **In-memory**: backs unit and integration tests
//!
//! Invocations are serialized by the process run lock, so the stores need
//! no internal locking.

pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use error::{StateError, StateResult};
pub use file::{FileAlertStateStore, FileBaselineStore};
pub use memory::{MemoryAlertStateStore, MemoryBaselineStore};
pub use store::{AlertRecord, AlertStateStore, AlertStatus, BaselineStore};
