//! Version commands: desired version, registrations, convergence.

use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use fleetsync_orchestrator::{
    heartbeat_ttl, run_heartbeat, FleetConfig, LocalVersionMarker, OrchestrateError,
    PendingUpdateState,
};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{exit_bool, resolve_hostname, Context};

pub async fn trigger_update(ctx: &Context, version: &str) -> anyhow::Result<ExitCode> {
    ctx.coordinator().trigger_update(version).await?;
    info!(%version, "desired version set");
    Ok(ExitCode::SUCCESS)
}

pub async fn current_version(ctx: &Context) -> anyhow::Result<ExitCode> {
    match ctx.coordinator().current_version().await {
        Ok(version) => {
            println!("{version}");
            Ok(ExitCode::SUCCESS)
        }
        Err(OrchestrateError::NotFound(_)) => {
            eprintln!("current_version is not set");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn pending_update(ctx: &Context) -> anyhow::Result<ExitCode> {
    let state = ctx.coordinator().pending_update().await?;
    println!("{state}");
    Ok(ExitCode::from(state.exit_code()))
}

/// `pending_update` when the store could not be opened at all: the
/// desired version is unknown, so only the local marker decides.
pub fn pending_update_offline(config: &FleetConfig, error: &anyhow::Error) -> anyhow::Result<ExitCode> {
    warn!(error = %format!("{error:#}"), "store unavailable");
    let marker = LocalVersionMarker::new(&config.marker.path);
    let local = marker
        .read()
        .with_context(|| format!("local version marker {}", marker.path().display()))?;
    let state = PendingUpdateState::without_desired(&local);
    println!("{state}");
    Ok(ExitCode::from(state.exit_code()))
}

pub fn local_version(ctx: &Context, version: Option<&str>) -> anyhow::Result<ExitCode> {
    let coordinator = ctx.coordinator();
    let value = coordinator
        .local_version(version)
        .with_context(|| format!("local version marker {}", coordinator.marker().path().display()))?;
    println!("{value}");
    Ok(ExitCode::SUCCESS)
}

pub async fn update_own_info(
    ctx: &Context,
    hostname: Option<String>,
    version: Option<&str>,
    ttl: Option<Duration>,
) -> anyhow::Result<ExitCode> {
    let hostname = resolve_hostname(hostname)?;
    match ctx.coordinator().update_own_info(&hostname, version, ttl).await? {
        Some(version) => info!(%hostname, %version, "registered"),
        None => warn!(%hostname, "no local version, nothing registered"),
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn running_versions(ctx: &Context) -> anyhow::Result<ExitCode> {
    for version in ctx.coordinator().running_versions().await? {
        println!("{version}");
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn hosts_at_version(ctx: &Context, version: &str) -> anyhow::Result<ExitCode> {
    for host in ctx.coordinator().hosts_at_version(version).await? {
        println!("{host}");
    }
    Ok(ExitCode::SUCCESS)
}

/// Hostnames from stdin, one per line. Blank lines are ignored; a list
/// with no hostnames at all is an error rather than a trivial yes.
pub fn parse_host_list(input: &str) -> anyhow::Result<Vec<String>> {
    let hosts: Vec<String> = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if hosts.is_empty() {
        anyhow::bail!("no hostnames on stdin, expected one per line");
    }
    Ok(hosts)
}

pub async fn verify_hosts(ctx: &Context, version: &str) -> anyhow::Result<ExitCode> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading host list from stdin")?;
    let hosts = parse_host_list(&input)?;
    let ok = ctx.coordinator().verify_hosts(version, &hosts).await?;
    Ok(exit_bool(ok))
}

pub async fn check_single_version(
    ctx: &Context,
    version: &str,
    verbose: bool,
) -> anyhow::Result<ExitCode> {
    let spread = ctx.coordinator().version_spread(version).await?;
    if verbose {
        println!("{spread}");
    }
    Ok(exit_bool(spread.is_converged()))
}

pub async fn ping(ctx: &Context) -> anyhow::Result<ExitCode> {
    let ok = ctx.coordinator().ping().await;
    if ok {
        println!("connection successful");
    } else {
        println!("connection failed");
    }
    Ok(exit_bool(ok))
}

/// Re-register every `interval` until Ctrl-C.
pub async fn heartbeat(
    ctx: &Context,
    hostname: Option<String>,
    version: Option<&str>,
    interval: Option<Duration>,
) -> anyhow::Result<ExitCode> {
    let hostname = resolve_hostname(hostname)?;
    let interval = match interval {
        Some(interval) => interval,
        None => ctx.config.heartbeat_interval()?,
    };
    info!(%hostname, ?interval, ttl = ?heartbeat_ttl(interval), "starting heartbeat");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c, heartbeat runs until killed");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let coordinator = ctx.coordinator();
    let stats = run_heartbeat(&coordinator, &hostname, version, interval, ctx.timeout, shutdown_rx).await;
    info!(sent = stats.sent, failed = stats.failed, "heartbeat stopped");
    Ok(ExitCode::SUCCESS)
}
