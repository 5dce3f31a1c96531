//! fleetsync.toml configuration.
//!
//! Every section and field is optional; command-line flags override
//! whatever the file sets.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestrateError, OrchestrateResult};
use crate::marker::DEFAULT_MARKER_PATH;

pub const DEFAULT_ETCD_ENDPOINT: &str = "127.0.0.1:2379";
pub const DEFAULT_DATA_DIR: &str = "/var/lib/fleetsync";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub store: StoreConfig,
    pub health: HealthConfig,
    pub marker: MarkerConfig,
    pub heartbeat: HeartbeatConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub endpoint: String,
    pub data_dir: PathBuf,
    pub timeout: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Etcd,
            endpoint: DEFAULT_ETCD_ENDPOINT.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            timeout: "5s".to_string(),
        }
    }
}

/// External health source. Without one, only the tracker's own records
/// count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub consul: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub path: PathBuf,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MARKER_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: "30s".to_string(),
        }
    }
}

/// Which shared store to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// etcd v2 keys API.
    #[default]
    Etcd,
    /// redb file under `data_dir`, for a single host.
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Etcd => write!(f, "etcd"),
            BackendKind::Local => write!(f, "local"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = OrchestrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "etcd" => Ok(BackendKind::Etcd),
            "local" => Ok(BackendKind::Local),
            other => Err(OrchestrateError::Config(format!("unknown backend: {other}"))),
        }
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> OrchestrateResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OrchestrateError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> OrchestrateResult<Self> {
        toml::from_str(content).map_err(|e| OrchestrateError::Config(e.to_string()))
    }

    pub fn store_timeout(&self) -> OrchestrateResult<Duration> {
        parse_duration(&self.store.timeout)
            .ok_or_else(|| OrchestrateError::Config(format!("bad store timeout: {}", self.store.timeout)))
    }

    pub fn heartbeat_interval(&self) -> OrchestrateResult<Duration> {
        parse_interval(&self.heartbeat.interval).ok_or_else(|| {
            OrchestrateError::Config(format!("bad heartbeat interval: {}", self.heartbeat.interval))
        })
    }

    /// redb file used by the local backend.
    pub fn local_db_path(&self) -> PathBuf {
        self.store.data_dir.join("fleetsync.redb")
    }
}

/// Parse `500ms`, `5s`, `2m` or bare seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Like [`parse_duration`], but zero is not a period.
pub fn parse_interval(s: &str) -> Option<Duration> {
    parse_duration(s).filter(|d| !d.is_zero())
}
