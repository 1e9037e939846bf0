//! Foglink Instance Registry
//!
//! Persistent record of the FogLAMP instances a user has registered: the
//! ordered URL list, per-instance metadata (name, last status, latency,
//! error, timestamps) and the active-instance pointer.
//!
//! # Invariants
//!
//! - exactly one [`RegisteredInstance`] per normalized URL
//! - the URL list and the metadata map hold the same keys at all times
//! - the active pointer is a registered URL, or `None` when the registry is empty
//!
//! # Example
//!
//! ```
//! use foglink_registry::{AddOptions, InstanceRegistry};
//!
//! let mut registry = InstanceRegistry::in_memory();
//! assert!(registry.add("127.0.0.1:8081/", AddOptions::default()));
//! assert_eq!(registry.active().as_deref(), Some("http://127.0.0.1:8081"));
//! ```

pub mod instance;
pub mod registry;
pub mod store;

pub use instance::{InstanceStatus, MetaPatch, RegisteredInstance};
pub use registry::{AddOptions, InstanceRegistry, ACTIVE_KEY, META_KEY, URLS_KEY};
pub use store::{FileStore, KvStore, MemoryStore};
