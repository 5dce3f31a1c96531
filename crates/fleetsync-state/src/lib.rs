//! fleetsync-state: the store boundary for fleetsync.
//!
//! Everything the orchestrator knows about the fleet lives in a shared
//! key-value store. This crate defines the capability set it relies on
//! ([`KvStore`], [`HealthSource`]) and the backends that provide it.
//!
//! # Backends
//!
//! - [`EtcdStore`]: etcd v2 keys API, native TTLs
//! - [`LocalStore`]: redb file for single-node and development setups
//! - [`MemoryStore`]: in-process, used by tests
//! - [`ConsulHealth`]: Consul health API as the external check source
//!
//! Missing keys are `Option::None`, never an error; connectivity failures
//! are [`StoreError::Unreachable`].

pub mod consul;
pub mod error;
pub mod etcd;
pub mod health;
mod http;
pub mod kv;
pub mod memory;
pub mod store;
pub mod tables;
#[cfg(test)]
mod testing;
pub mod types;

pub use consul::ConsulHealth;
pub use error::{StoreError, StoreResult};
pub use etcd::EtcdStore;
pub use health::{CheckState, HealthCheck, HealthSource};
pub use kv::KvStore;
pub use memory::{MemoryHealth, MemoryStore};
pub use store::LocalStore;
pub use types::{epoch_secs, ttl_secs, StoredValue};
