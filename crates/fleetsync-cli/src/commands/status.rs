//! Health commands: per-host status and fleet-wide failure checks.

use std::process::ExitCode;

use super::{exit_bool, resolve_hostname, Context};

pub async fn update_own_status(
    ctx: &Context,
    hostname: Option<String>,
    status_type: &str,
    result: i32,
) -> anyhow::Result<ExitCode> {
    let hostname = resolve_hostname(hostname)?;
    ctx.tracker()
        .update_own_status(&hostname, status_type, result)
        .await?;
    Ok(ExitCode::SUCCESS)
}

pub async fn get_failures(ctx: &Context, hosts: bool, show_warnings: bool) -> anyhow::Result<ExitCode> {
    let report = ctx.tracker().failure_report(show_warnings).await?;
    if hosts {
        print!("{report}");
    }
    Ok(exit_bool(report.is_healthy()))
}

/// Exit code is the number of failing checks on this host.
pub async fn local_health(
    ctx: &Context,
    hostname: Option<String>,
    verbose: bool,
) -> anyhow::Result<ExitCode> {
    let hostname = resolve_hostname(hostname)?;
    let failing = ctx.tracker().local_health(&hostname, false).await?;
    if verbose {
        for check in &failing {
            println!("{}: {}", check.name, check.output);
        }
    }
    Ok(ExitCode::from(u8::try_from(failing.len()).unwrap_or(u8::MAX)))
}

/// What to look at when a wait for `version` gave up.
pub async fn debug_timeout(ctx: &Context, version: &str) -> anyhow::Result<ExitCode> {
    let report = ctx.tracker().failure_report(false).await?;
    if report.is_healthy() {
        println!("no failures reported");
    } else {
        print!("{report}");
    }

    let hosts = ctx.coordinator().hosts_at_version(version).await?;
    if hosts.is_empty() {
        println!("no hosts registered at {version}");
    } else {
        println!("hosts registered at {version}:");
        for host in &hosts {
            println!("  {host}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
