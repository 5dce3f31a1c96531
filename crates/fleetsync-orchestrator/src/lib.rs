//! fleetsync-orchestrator: fleet version convergence and health aggregation.
//!
//! Hosts announce the version they run and the outcome of their own
//! puppet and validation runs in a shared store; operators set the desired
//! version and ask whether the fleet has converged and is healthy.
//!
//! - [`VersionCoordinator`]: desired version, running versions, heartbeats
//! - [`StatusTracker`]: per-host check status and failure aggregation
//! - [`LocalVersionMarker`]: the host's own record of what it runs
//! - [`run_heartbeat`]: periodic re-announcement with a TTL

pub mod config;
pub mod convergence;
pub mod coordinator;
pub mod error;
pub mod heartbeat;
pub mod keys;
pub mod marker;
pub mod reconcile;
pub mod status;
pub mod tracker;

pub use config::{parse_duration, parse_interval, BackendKind, FleetConfig};
pub use convergence::VersionSpread;
pub use coordinator::{PendingUpdateState, VersionCoordinator};
pub use error::{OrchestrateError, OrchestrateResult};
pub use heartbeat::{heartbeat_ttl, run_heartbeat, HeartbeatStats};
pub use marker::{LocalVersionMarker, DEFAULT_MARKER_PATH};
pub use status::{CheckType, StatusValue};
pub use tracker::{FailingCheck, FailureReport, StatusTracker};
