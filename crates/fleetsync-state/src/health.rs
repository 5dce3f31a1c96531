//! External health-check source.
//!
//! Hosts register checks (puppet runs, validation suites, service liveness)
//! with a health subsystem that lives next to the store. The tracker only
//! reads from it.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// State of a single registered check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Passing,
    Warning,
    Critical,
    Maintenance,
    #[serde(other)]
    Unknown,
}

impl CheckState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Passing => "passing",
            CheckState::Warning => "warning",
            CheckState::Critical => "critical",
            CheckState::Maintenance => "maintenance",
            CheckState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A check as reported by the health source.
///
/// Field names follow the Consul health API so responses deserialize as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    pub node: String,
    #[serde(rename = "CheckID", default)]
    pub check_id: String,
    pub name: String,
    pub status: CheckState,
    #[serde(default)]
    pub output: String,
}

impl HealthCheck {
    pub fn new(node: &str, name: &str, status: CheckState) -> Self {
        Self {
            node: node.to_string(),
            check_id: name.to_string(),
            name: name.to_string(),
            status,
            output: String::new(),
        }
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }
}

/// Read access to registered health checks.
pub trait HealthSource: Send + Sync {
    /// All checks across the cluster currently in `state`.
    fn checks_in_state(
        &self,
        state: CheckState,
    ) -> impl Future<Output = StoreResult<Vec<HealthCheck>>> + Send;

    /// All checks registered for one node.
    fn node_checks(&self, node: &str) -> impl Future<Output = StoreResult<Vec<HealthCheck>>> + Send;
}
