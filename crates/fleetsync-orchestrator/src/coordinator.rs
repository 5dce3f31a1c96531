//! Version coordinator: desired version vs. what each host runs.
//!
//! The coordinator never observes hosts directly. Hosts announce
//! themselves under `/running_version/{version}/{hostname}`, the operator
//! announces the desired version under `/current_version`, and every
//! convergence question is answered from those keys.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use fleetsync_state::{epoch_secs, KvStore};
use tracing::{debug, info, warn};

use crate::convergence::{all_registered, missing_hosts, VersionSpread};
use crate::error::{OrchestrateError, OrchestrateResult};
use crate::keys;
use crate::marker::LocalVersionMarker;
use crate::reconcile::retain_only;

/// Whether this host should update, as far as it can tell.
///
/// Computed fresh on every call; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingUpdateState {
    /// Desired version is known and differs from the local one.
    UpdateAvailable,
    /// Desired version equals the local one.
    UpToDate,
    /// Desired version unknown, but this host has been provisioned before.
    NoClue,
    /// Desired version unknown and nothing recorded locally yet.
    NoClueButJustStarting,
}

impl PendingUpdateState {
    /// The answer when the desired version could not be read.
    pub fn without_desired(local: &str) -> Self {
        if local.is_empty() {
            PendingUpdateState::NoClueButJustStarting
        } else {
            PendingUpdateState::NoClue
        }
    }

    /// Process exit code for this state.
    pub fn exit_code(&self) -> u8 {
        match self {
            PendingUpdateState::UpdateAvailable => 0,
            PendingUpdateState::UpToDate => 1,
            PendingUpdateState::NoClue => 2,
            PendingUpdateState::NoClueButJustStarting => 3,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PendingUpdateState::UpdateAvailable => "Yes, there is an update pending",
            PendingUpdateState::UpToDate => "No updates pending",
            PendingUpdateState::NoClue => "Could not get current_version",
            PendingUpdateState::NoClueButJustStarting => {
                "Could not get current_version, but there's also no local version set"
            }
        }
    }
}

impl fmt::Display for PendingUpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Reads and writes version state in the shared store.
pub struct VersionCoordinator<S> {
    store: S,
    marker: LocalVersionMarker,
}

impl<S: KvStore> VersionCoordinator<S> {
    pub fn new(store: S, marker: LocalVersionMarker) -> Self {
        Self { store, marker }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn marker(&self) -> &LocalVersionMarker {
        &self.marker
    }

    /// Announce the version the whole fleet should run.
    pub async fn trigger_update(&self, version: &str) -> OrchestrateResult<()> {
        self.store.set(keys::CURRENT_VERSION, version, None).await?;
        info!(%version, "update triggered");
        Ok(())
    }

    /// The desired version, trimmed. `NotFound` if never triggered.
    pub async fn current_version(&self) -> OrchestrateResult<String> {
        match self.store.get(keys::CURRENT_VERSION).await? {
            Some(version) => Ok(version.trim().to_string()),
            None => Err(OrchestrateError::NotFound(keys::CURRENT_VERSION.to_string())),
        }
    }

    /// Read (`None`) or overwrite (`Some`) this host's local version.
    pub fn local_version(&self, new_value: Option<&str>) -> OrchestrateResult<String> {
        let version = match new_value {
            None => self.marker.read()?,
            Some(value) => self.marker.write(value)?,
        };
        Ok(version)
    }

    /// Register `hostname` as running `version` (default: the local version).
    ///
    /// Refreshes the heartbeat record, optionally with a TTL, then removes
    /// the host's records under every other version. Returns the version
    /// announced, or `None` when there was nothing to announce.
    pub async fn update_own_info(
        &self,
        hostname: &str,
        version: Option<&str>,
        ttl: Option<Duration>,
    ) -> OrchestrateResult<Option<String>> {
        let version = match version {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => self.local_version(None)?,
        };
        if version.is_empty() {
            debug!(%hostname, "no local version yet, nothing to announce");
            return Ok(None);
        }

        let own_key = keys::running_version_key(&version, hostname);
        self.store
            .set(&own_key, &epoch_secs().to_string(), ttl)
            .await?;

        let mut registrations = Vec::new();
        for other in self.running_versions().await? {
            if other != version && self.hosts_at_version(&other).await?.contains(hostname) {
                registrations.push(keys::running_version_key(&other, hostname));
            }
        }
        let removed = retain_only(&self.store, registrations, &own_key).await?;

        debug!(%hostname, %version, ?ttl, stale = removed.len(), "own info updated");
        Ok(Some(version))
    }

    /// Every version with at least one live heartbeat record.
    pub async fn running_versions(&self) -> OrchestrateResult<BTreeSet<String>> {
        let Some(found) = self.store.find(keys::RUNNING_VERSION).await? else {
            return Ok(BTreeSet::new());
        };
        Ok(found
            .iter()
            .filter_map(|key| keys::parse_running_version_key(key))
            .map(|(version, _)| version.to_string())
            .collect())
    }

    /// Hosts with a live heartbeat record under exactly `version`.
    pub async fn hosts_at_version(&self, version: &str) -> OrchestrateResult<BTreeSet<String>> {
        let Some(found) = self.store.find(&keys::version_dir(version)).await? else {
            return Ok(BTreeSet::new());
        };
        Ok(found
            .iter()
            .filter_map(|key| keys::parse_running_version_key(key))
            .filter(|(v, _)| *v == version)
            .map(|(_, host)| host.to_string())
            .collect())
    }

    /// Every host in `hosts` is registered at `version`.
    pub async fn verify_hosts<H: AsRef<str>>(
        &self,
        version: &str,
        hosts: &[H],
    ) -> OrchestrateResult<bool> {
        let registered = self.hosts_at_version(version).await?;
        let ok = all_registered(hosts, &registered);
        if !ok {
            let missing = missing_hosts(hosts, &registered);
            debug!(%version, ?missing, "hosts not yet registered");
        }
        Ok(ok)
    }

    /// Snapshot of wanted vs. unwanted running versions.
    pub async fn version_spread(&self, version: &str) -> OrchestrateResult<VersionSpread> {
        let running = self.running_versions().await?;
        Ok(VersionSpread::of(&running, version))
    }

    /// `version` is running and nothing else is.
    pub async fn check_single_version(&self, version: &str, verbose: bool) -> OrchestrateResult<bool> {
        let spread = self.version_spread(version).await?;
        if verbose {
            info!("{spread}");
        }
        Ok(spread.is_converged())
    }

    /// Compare the local version against the desired one.
    ///
    /// Only a local marker failure other than absence is an error; not
    /// knowing the desired version is one of the answers.
    pub async fn pending_update(&self) -> OrchestrateResult<PendingUpdateState> {
        let local = self.local_version(None)?;
        let state = match self.current_version().await {
            Ok(desired) if desired == local => PendingUpdateState::UpToDate,
            Ok(_) => PendingUpdateState::UpdateAvailable,
            Err(e) => {
                debug!(error = %e, "desired version unavailable");
                PendingUpdateState::without_desired(&local)
            }
        };
        Ok(state)
    }

    /// The store is reachable and knows at least one cluster member.
    pub async fn ping(&self) -> bool {
        match self.store.members().await {
            Ok(members) => {
                debug!(?members, "store members");
                !members.is_empty()
            }
            Err(e) => {
                warn!(error = %e, "store ping failed");
                false
            }
        }
    }
}
