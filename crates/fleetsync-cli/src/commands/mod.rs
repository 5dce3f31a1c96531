pub mod status;
pub mod version;

use std::process::ExitCode;
use std::time::Duration;

use fleetsync_orchestrator::{FleetConfig, LocalVersionMarker, StatusTracker, VersionCoordinator};

use crate::backend::{HealthBackend, StoreBackend};

/// Everything a command needs, built once from flags and config.
pub struct Context {
    pub config: FleetConfig,
    pub timeout: Duration,
    store: StoreBackend,
}

impl Context {
    pub fn new(config: FleetConfig) -> anyhow::Result<Self> {
        let timeout = config.store_timeout()?;
        let store = StoreBackend::open(&config, timeout)?;
        Ok(Self {
            config,
            timeout,
            store,
        })
    }

    /// Drop records that outlived their TTL, where the backend keeps them.
    pub async fn purge_expired(&self) {
        self.store.purge_expired().await;
    }

    pub fn coordinator(&self) -> VersionCoordinator<StoreBackend> {
        let marker = LocalVersionMarker::new(&self.config.marker.path);
        VersionCoordinator::new(self.store.clone(), marker)
    }

    pub fn tracker(&self) -> StatusTracker<StoreBackend, HealthBackend> {
        let health = HealthBackend::open(&self.config, self.timeout);
        StatusTracker::new(self.store.clone(), health)
    }
}

/// 0 for true, 1 for false.
pub fn exit_bool(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// `--hostname`, or this machine's name.
pub fn resolve_hostname(explicit: Option<String>) -> anyhow::Result<String> {
    if let Some(name) = explicit.filter(|n| !n.trim().is_empty()) {
        return Ok(name.trim().to_string());
    }
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return Ok(name.trim().to_string());
        }
    }
    for path in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Ok(name) = std::fs::read_to_string(path) {
            let name = name.trim();
            if !name.is_empty() {
                return Ok(name.to_string());
            }
        }
    }
    anyhow::bail!("cannot determine hostname, pass --hostname")
}
