//! The key-value capability set the orchestrator relies on.
//!
//! Keys are `/`-separated paths (`/running_version/v12/node1`). Every
//! backend keeps the same contract:
//!
//! - a missing key is `Ok(None)` / `Ok(false)`, never an error;
//! - connectivity problems are `Err(StoreError::Unreachable)`;
//! - `find` lists leaf keys whose path starts with the prefix, and returns
//!   `Ok(None)` when nothing lives under it.

use std::future::Future;
use std::time::Duration;

use crate::error::StoreResult;

/// A shared, eventually-consistent key-value store.
pub trait KvStore: Send + Sync {
    /// Read a key.
    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Write a key, optionally expiring it after `ttl`.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete a key. Returns true if it existed.
    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// List keys under a prefix.
    fn find(&self, prefix: &str) -> impl Future<Output = StoreResult<Option<Vec<String>>>> + Send;

    /// List the members of the store's own cluster.
    fn members(&self) -> impl Future<Output = StoreResult<Vec<String>>> + Send;
}

/// A borrowed store is a store, so the coordinator and tracker can share one.
impl<T: KvStore> KvStore for &T {
    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = StoreResult<()>> + Send {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).delete(key)
    }

    fn find(&self, prefix: &str) -> impl Future<Output = StoreResult<Option<Vec<String>>>> + Send {
        (**self).find(prefix)
    }

    fn members(&self) -> impl Future<Output = StoreResult<Vec<String>>> + Send {
        (**self).members()
    }
}
