//! Heartbeat loop: keep a host's running-version record alive.
//!
//! Each tick re-announces the host with a TTL a little over two intervals,
//! so one missed beat is tolerated and a dead host ages out of the fleet
//! on its own.

use std::time::Duration;

use fleetsync_state::KvStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::coordinator::VersionCoordinator;

/// Period used when asked to beat every zero seconds.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Record lifetime for a heartbeat sent every `interval`.
pub fn heartbeat_ttl(interval: Duration) -> Duration {
    interval * 2 + Duration::from_secs(10)
}

/// Counters from a finished heartbeat loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatStats {
    pub sent: u64,
    pub failed: u64,
}

/// Announce `hostname` every `interval` until `shutdown` flips.
///
/// The first beat goes out immediately. A beat that errors or exceeds
/// `timeout` is logged and retried on the next tick; the loop never gives
/// up on its own.
pub async fn run_heartbeat<S: KvStore>(
    coordinator: &VersionCoordinator<S>,
    hostname: &str,
    version: Option<&str>,
    interval: Duration,
    timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> HeartbeatStats {
    let interval = if interval.is_zero() {
        warn!(%hostname, fallback = ?MIN_INTERVAL, "zero heartbeat interval");
        MIN_INTERVAL
    } else {
        interval
    };
    let ttl = heartbeat_ttl(interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut stats = HeartbeatStats::default();

    info!(%hostname, ?interval, ?ttl, "heartbeat loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let beat = coordinator.update_own_info(hostname, version, Some(ttl));
                match tokio::time::timeout(timeout, beat).await {
                    Ok(Ok(Some(announced))) => {
                        stats.sent += 1;
                        debug!(%hostname, version = %announced, "heartbeat sent");
                    }
                    Ok(Ok(None)) => {
                        debug!(%hostname, "no version to announce yet");
                    }
                    Ok(Err(e)) => {
                        stats.failed += 1;
                        warn!(%hostname, error = %e, "heartbeat failed");
                    }
                    Err(_) => {
                        stats.failed += 1;
                        warn!(%hostname, ?timeout, "heartbeat timed out");
                    }
                }
            }
            _ = shutdown.changed() => {
                info!(%hostname, "heartbeat loop shutting down");
                break;
            }
        }
    }

    stats
}
