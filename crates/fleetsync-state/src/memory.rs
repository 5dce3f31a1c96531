//! In-process store and health source.
//!
//! `MemoryStore` is what the orchestrator tests run against. It keeps the
//! same contract as the networked backends, including TTL expiry and
//! raw string-prefix `find`, and can be told to behave as if the store
//! were down.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::health::{CheckState, HealthCheck, HealthSource};
use crate::kv::KvStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug)]
struct Inner {
    entries: RwLock<BTreeMap<String, Entry>>,
    members: RwLock<Vec<String>>,
    unreachable: AtomicBool,
}

/// Thread-safe in-memory key-value store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store reporting a single cluster member.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(BTreeMap::new()),
                members: RwLock::new(vec!["memory".to_string()]),
                unreachable: AtomicBool::new(false),
            }),
        }
    }

    /// Replace the reported cluster members.
    pub fn with_members(self, members: Vec<String>) -> Self {
        *self
            .inner
            .members
            .write()
            .unwrap_or_else(PoisonError::into_inner) = members;
        self
    }

    /// Make every subsequent call fail as if the store were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of live entries (for tests).
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.read_entries()
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_reachable(&self) -> StoreResult<()> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("memory store marked down".to_string()));
        }
        Ok(())
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Entry>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Entry>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_reachable()?;
        let now = Instant::now();
        Ok(self
            .read_entries()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.check_reachable()?;
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.write_entries().insert(key.to_string(), entry);
        debug!(%key, ?ttl, "memory key stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check_reachable()?;
        let now = Instant::now();
        let existed = self
            .write_entries()
            .remove(key)
            .is_some_and(|e| e.is_live(now));
        Ok(existed)
    }

    async fn find(&self, prefix: &str) -> StoreResult<Option<Vec<String>>> {
        self.check_reachable()?;
        let now = Instant::now();
        let keys: Vec<String> = self
            .read_entries()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        Ok((!keys.is_empty()).then_some(keys))
    }

    async fn members(&self) -> StoreResult<Vec<String>> {
        self.check_reachable()?;
        Ok(self
            .inner
            .members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// A fixed set of health checks.
///
/// Used in tests, and as the health source when no external one is
/// configured (in which case it is simply empty).
#[derive(Debug, Clone, Default)]
pub struct MemoryHealth {
    checks: Arc<RwLock<Vec<HealthCheck>>>,
}

impl MemoryHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a check (keyed by node and name).
    pub fn register(&self, check: HealthCheck) {
        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        checks.retain(|c| !(c.node == check.node && c.name == check.name));
        checks.push(check);
    }
}

impl HealthSource for MemoryHealth {
    async fn checks_in_state(&self, state: CheckState) -> StoreResult<Vec<HealthCheck>> {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        Ok(checks.iter().filter(|c| c.status == state).cloned().collect())
    }

    async fn node_checks(&self, node: &str) -> StoreResult<Vec<HealthCheck>> {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        Ok(checks.iter().filter(|c| c.node == node).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_get() {
        let store = MemoryStore::new();
        store.set("/current_version", "v12", None).await.unwrap();
        assert_eq!(
            store.get("/current_version").await.unwrap(),
            Some("v12".to_string())
        );
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("/nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryStore::new();
        store.set("/a", "1", None).await.unwrap();
        assert!(store.delete("/a").await.unwrap());
        assert!(!store.delete("/a").await.unwrap());
    }

    #[tokio::test]
    async fn find_is_raw_prefix_scan() {
        let store = MemoryStore::new();
        store.set("/running_version/v1/h3", "1", None).await.unwrap();
        store.set("/running_version/v10/h1", "1", None).await.unwrap();
        store.set("/status/puppet/failed/h1", "1", None).await.unwrap();

        let keys = store.find("/running_version/v1").await.unwrap().unwrap();
        assert_eq!(
            keys,
            vec![
                "/running_version/v1/h3".to_string(),
                "/running_version/v10/h1".to_string()
            ]
        );
        assert_eq!(store.find("/nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_disappear() {
        let store = MemoryStore::new();
        store
            .set("/running_version/v1/h1", "1", Some(Duration::ZERO))
            .await
            .unwrap();
        store.set("/running_version/v1/h2", "1", None).await.unwrap();

        assert_eq!(store.get("/running_version/v1/h1").await.unwrap(), None);
        let keys = store.find("/running_version").await.unwrap().unwrap();
        assert_eq!(keys, vec!["/running_version/v1/h2".to_string()]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unreachable(true);
        assert!(store.get("/a").await.unwrap_err().is_unreachable());
        assert!(store.set("/a", "1", None).await.is_err());
        assert!(store.members().await.is_err());

        store.set_unreachable(false);
        assert!(store.members().await.is_ok());
    }

    #[tokio::test]
    async fn members_can_be_empty() {
        let store = MemoryStore::new().with_members(Vec::new());
        assert!(store.members().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_filters_by_state_and_node() {
        let health = MemoryHealth::new();
        health.register(HealthCheck::new("cp1", "puppet", CheckState::Warning));
        health.register(HealthCheck::new("cp1", "ntp", CheckState::Critical));
        health.register(HealthCheck::new("st1", "puppet", CheckState::Passing));
        // Re-registering replaces the previous state.
        health.register(HealthCheck::new("st1", "puppet", CheckState::Critical));

        let critical = health.checks_in_state(CheckState::Critical).await.unwrap();
        assert_eq!(critical.len(), 2);
        assert_eq!(health.node_checks("cp1").await.unwrap().len(), 2);
        assert!(health
            .checks_in_state(CheckState::Passing)
            .await
            .unwrap()
            .is_empty());
    }
}
