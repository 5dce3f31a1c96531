//! Runtime selection of the store and health source.

use std::time::Duration;

use anyhow::Context;
use fleetsync_orchestrator::{BackendKind, FleetConfig};
use fleetsync_state::{
    CheckState, ConsulHealth, EtcdStore, HealthCheck, HealthSource, KvStore, LocalStore,
    MemoryHealth, StoreResult,
};
use tracing::{debug, info, warn};

/// The shared store picked by configuration.
#[derive(Clone)]
pub enum StoreBackend {
    Etcd(EtcdStore),
    Local(LocalStore),
}

impl StoreBackend {
    pub fn open(config: &FleetConfig, timeout: Duration) -> anyhow::Result<Self> {
        match config.store.backend {
            BackendKind::Etcd => {
                debug!(endpoint = %config.store.endpoint, ?timeout, "using etcd store");
                Ok(StoreBackend::Etcd(EtcdStore::new(&config.store.endpoint, timeout)))
            }
            BackendKind::Local => {
                std::fs::create_dir_all(&config.store.data_dir).with_context(|| {
                    format!("creating data dir {}", config.store.data_dir.display())
                })?;
                let path = config.local_db_path();
                let store = LocalStore::open(&path)
                    .with_context(|| format!("opening {}", path.display()))?
                    .with_lock_timeout(timeout);
                debug!(?path, "using local store");
                Ok(StoreBackend::Local(store))
            }
        }
    }

    /// Drop expired records the backend does not expire on its own.
    ///
    /// Best effort: a busy or broken store is left for the command itself
    /// to report.
    pub async fn purge_expired(&self) {
        if let StoreBackend::Local(store) = self {
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "expired records purged"),
                Err(e) => warn!(error = %e, "expired record purge skipped"),
            }
        }
    }
}

impl KvStore for StoreBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            StoreBackend::Etcd(s) => s.get(key).await,
            StoreBackend::Local(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        match self {
            StoreBackend::Etcd(s) => s.set(key, value, ttl).await,
            StoreBackend::Local(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        match self {
            StoreBackend::Etcd(s) => s.delete(key).await,
            StoreBackend::Local(s) => s.delete(key).await,
        }
    }

    async fn find(&self, prefix: &str) -> StoreResult<Option<Vec<String>>> {
        match self {
            StoreBackend::Etcd(s) => s.find(prefix).await,
            StoreBackend::Local(s) => s.find(prefix).await,
        }
    }

    async fn members(&self) -> StoreResult<Vec<String>> {
        match self {
            StoreBackend::Etcd(s) => s.members().await,
            StoreBackend::Local(s) => s.members().await,
        }
    }
}

/// External health checks, or none at all.
#[derive(Clone)]
pub enum HealthBackend {
    Consul(ConsulHealth),
    /// No external source configured; always empty.
    Static(MemoryHealth),
}

impl HealthBackend {
    pub fn open(config: &FleetConfig, timeout: Duration) -> Self {
        match &config.health.consul {
            Some(address) => {
                debug!(%address, "using consul health source");
                HealthBackend::Consul(ConsulHealth::new(address, timeout))
            }
            None => HealthBackend::Static(MemoryHealth::new()),
        }
    }
}

impl HealthSource for HealthBackend {
    async fn checks_in_state(&self, state: CheckState) -> StoreResult<Vec<HealthCheck>> {
        match self {
            HealthBackend::Consul(h) => h.checks_in_state(state).await,
            HealthBackend::Static(h) => h.checks_in_state(state).await,
        }
    }

    async fn node_checks(&self, node: &str) -> StoreResult<Vec<HealthCheck>> {
        match self {
            HealthBackend::Consul(h) => h.node_checks(node).await,
            HealthBackend::Static(h) => h.node_checks(node).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_backend_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FleetConfig::default();
        config.store.backend = BackendKind::Local;
        config.store.data_dir = dir.path().join("state");

        let store = StoreBackend::open(&config, Duration::from_secs(1)).unwrap();
        store.set("/current_version", "v3", None).await.unwrap();
        assert_eq!(store.get("/current_version").await.unwrap(), Some("v3".to_string()));
        assert!(config.local_db_path().exists());

        // A second handle on the same file sees the same data.
        let second = StoreBackend::open(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(second.get("/current_version").await.unwrap(), Some("v3".to_string()));
        store.purge_expired().await;
        assert_eq!(store.members().await.unwrap(), vec!["local".to_string()]);
    }

    #[tokio::test]
    async fn missing_consul_means_no_external_checks() {
        let health = HealthBackend::open(&FleetConfig::default(), Duration::from_secs(1));
        assert!(matches!(health, HealthBackend::Static(_)));
        assert!(health.checks_in_state(CheckState::Critical).await.unwrap().is_empty());
    }

    #[test]
    fn etcd_is_the_default_backend() {
        let store = StoreBackend::open(&FleetConfig::default(), Duration::from_secs(1)).unwrap();
        assert!(matches!(store, StoreBackend::Etcd(_)));
    }
}
