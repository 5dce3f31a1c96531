//! fleetctl: drive fleet version convergence from scripts.
//!
//! Boolean checks exit 0 for true and 1 for false, so they compose with
//! shell loops:
//!
//! ```text
//! fleetctl trigger_update v42
//! until fleetctl check_single_version v42; do sleep 10; done
//! fleetctl get_failures --hosts
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use fleetsync_orchestrator::{parse_interval, BackendKind, FleetConfig};

mod backend;
mod commands;

use commands::{status, version};

#[derive(Parser)]
#[command(
    name = "fleetctl",
    about = "Fleet version convergence and health aggregation",
    version
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Shared store backend (etcd, local).
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// etcd address, host:port.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Data directory for the local backend.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Consul address for external health checks.
    #[arg(long, global = true)]
    consul: Option<String>,

    /// Local version marker file.
    #[arg(long, global = true)]
    marker: Option<PathBuf>,

    /// Store request timeout (e.g. 5s, 500ms).
    #[arg(long, global = true)]
    timeout: Option<String>,
}

impl GlobalArgs {
    /// Config file (or defaults) with flags layered on top.
    fn resolve(self) -> anyhow::Result<FleetConfig> {
        let mut config = match &self.config {
            Some(path) => FleetConfig::from_file(path)?,
            None => FleetConfig::default(),
        };
        if let Some(backend) = self.backend {
            config.store.backend = backend;
        }
        if let Some(endpoint) = self.endpoint {
            config.store.endpoint = endpoint;
        }
        if let Some(data_dir) = self.data_dir {
            config.store.data_dir = data_dir;
        }
        if let Some(consul) = self.consul {
            config.health.consul = Some(consul);
        }
        if let Some(marker) = self.marker {
            config.marker.path = marker;
        }
        if let Some(timeout) = self.timeout {
            config.store.timeout = timeout;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
enum Command {
    /// Set the version every host should run.
    TriggerUpdate { version: String },
    /// Print the desired version.
    CurrentVersion,
    /// Compare the local version with the desired one (exit 0-3).
    PendingUpdate,
    /// Print the local version, or record a new one.
    LocalVersion { version: Option<String> },
    /// Register this host under its running version.
    UpdateOwnInfo {
        #[arg(long)]
        hostname: Option<String>,
        /// Defaults to the local version.
        #[arg(long)]
        version: Option<String>,
        /// Expire the registration unless refreshed.
        #[arg(long, value_parser = duration_arg)]
        ttl: Option<Duration>,
    },
    /// Record the result of a puppet or validation run.
    UpdateOwnStatus {
        status_type: String,
        #[arg(allow_negative_numbers = true)]
        result: i32,
        #[arg(long)]
        hostname: Option<String>,
    },
    /// Print every version with at least one live host.
    RunningVersions,
    /// Print the hosts registered at a version.
    HostsAtVersion { version: String },
    /// Check that every hostname on stdin is registered at a version.
    VerifyHosts { version: String },
    /// Check that a version, and only that version, is running.
    CheckSingleVersion {
        version: String,
        #[arg(long)]
        verbose: bool,
    },
    /// Check that nothing in the fleet is failing.
    GetFailures {
        /// Log each failing host and check.
        #[arg(long)]
        hosts: bool,
        /// Count non-bootstrap warnings as failures.
        #[arg(long = "show_warnings")]
        show_warnings: bool,
    },
    /// Check that the shared store is reachable.
    Ping,
    /// Count failing checks on this host (exit code = count).
    LocalHealth {
        #[arg(long)]
        hostname: Option<String>,
        #[arg(long)]
        verbose: bool,
    },
    /// Show failures and registrations after a convergence wait timed out.
    DebugTimeout { version: String },
    /// Keep this host registered until interrupted.
    Heartbeat {
        #[arg(long)]
        hostname: Option<String>,
        #[arg(long)]
        version: Option<String>,
        /// Seconds between beats (e.g. 30s, 2m).
        #[arg(long, value_parser = duration_arg)]
        interval: Option<Duration>,
    },
}

/// A positive duration; zero would mean a record that is born expired or a
/// loop that never sleeps.
fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_interval(s).ok_or_else(|| format!("invalid duration (need e.g. 30s, 500ms, 2m; not zero): {s}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fleetctl=info,fleetsync=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.global.resolve()?;
    let ctx = match commands::Context::new(config.clone()) {
        Ok(ctx) => ctx,
        Err(e) if matches!(cli.command, Command::PendingUpdate) => {
            return version::pending_update_offline(&config, &e);
        }
        Err(e) => return Err(e),
    };
    ctx.purge_expired().await;

    match cli.command {
        Command::TriggerUpdate { version: v } => version::trigger_update(&ctx, &v).await,
        Command::CurrentVersion => version::current_version(&ctx).await,
        Command::PendingUpdate => version::pending_update(&ctx).await,
        Command::LocalVersion { version: v } => version::local_version(&ctx, v.as_deref()),
        Command::UpdateOwnInfo {
            hostname,
            version: v,
            ttl,
        } => version::update_own_info(&ctx, hostname, v.as_deref(), ttl).await,
        Command::UpdateOwnStatus {
            status_type,
            result,
            hostname,
        } => status::update_own_status(&ctx, hostname, &status_type, result).await,
        Command::RunningVersions => version::running_versions(&ctx).await,
        Command::HostsAtVersion { version: v } => version::hosts_at_version(&ctx, &v).await,
        Command::VerifyHosts { version: v } => version::verify_hosts(&ctx, &v).await,
        Command::CheckSingleVersion { version: v, verbose } => {
            version::check_single_version(&ctx, &v, verbose).await
        }
        Command::GetFailures {
            hosts,
            show_warnings,
        } => status::get_failures(&ctx, hosts, show_warnings).await,
        Command::Ping => version::ping(&ctx).await,
        Command::LocalHealth { hostname, verbose } => {
            status::local_health(&ctx, hostname, verbose).await
        }
        Command::DebugTimeout { version: v } => status::debug_timeout(&ctx, &v).await,
        Command::Heartbeat {
            hostname,
            version: v,
            interval,
        } => version::heartbeat(&ctx, hostname, v.as_deref(), interval).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fleetctl").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn subcommands_use_snake_case() {
        assert!(matches!(
            parse(&["check_single_version", "v3", "--verbose"]).command,
            Command::CheckSingleVersion { verbose: true, .. }
        ));
        assert!(matches!(
            parse(&["get_failures", "--hosts", "--show_warnings"]).command,
            Command::GetFailures { hosts: true, show_warnings: true }
        ));
        assert!(Cli::try_parse_from(["fleetctl", "check-single-version", "v3"]).is_err());
    }

    #[test]
    fn negative_status_result() {
        match parse(&["update_own_status", "puppet", "-1"]).command {
            Command::UpdateOwnStatus { status_type, result, hostname } => {
                assert_eq!(status_type, "puppet");
                assert_eq!(result, -1);
                assert!(hostname.is_none());
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn ttl_accepts_durations() {
        match parse(&["update_own_info", "--ttl", "70s", "--version", "v2"]).command {
            Command::UpdateOwnInfo { ttl, version, .. } => {
                assert_eq!(ttl, Some(Duration::from_secs(70)));
                assert_eq!(version.as_deref(), Some("v2"));
            }
            _ => panic!("wrong command"),
        }
        assert!(Cli::try_parse_from(["fleetctl", "update_own_info", "--ttl", "soon"]).is_err());
    }

    #[test]
    fn zero_durations_are_rejected() {
        for zero in ["0", "0s", "0ms"] {
            assert!(Cli::try_parse_from(["fleetctl", "heartbeat", "--interval", zero]).is_err());
            assert!(Cli::try_parse_from(["fleetctl", "update_own_info", "--ttl", zero]).is_err());
        }
        match parse(&["heartbeat", "--interval", "1s"]).command {
            Command::Heartbeat { interval, .. } => assert_eq!(interval, Some(Duration::from_secs(1))),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn missing_config_file_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cli = parse(&["ping", "--config", path.to_str().unwrap()]);
        let message = format!("{:#}", cli.global.resolve().unwrap_err());
        assert!(message.contains("config error"), "{message}");
        assert!(message.contains("absent.toml"), "{message}");
        assert!(!message.contains("local version marker"), "{message}");
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetsync.toml");
        std::fs::write(&path, "[store]\nendpoint = \"etcd1:2379\"\ntimeout = \"2s\"\n").unwrap();

        let cli = parse(&[
            "ping",
            "--config",
            path.to_str().unwrap(),
            "--backend",
            "local",
            "--marker",
            "/tmp/marker",
        ]);
        let config = cli.global.resolve().unwrap();
        assert_eq!(config.store.backend, BackendKind::Local);
        assert_eq!(config.store.endpoint, "etcd1:2379");
        assert_eq!(config.store_timeout().unwrap(), Duration::from_secs(2));
        assert_eq!(config.marker.path, PathBuf::from("/tmp/marker"));
    }
}
