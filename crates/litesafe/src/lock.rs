// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `litesafe lock` subcommands.

use std::time::Duration;

use litesafe_core::LitesafeError;
use litesafe_sqlite::{LockInfo, SqliteStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

fn format_row(info: &LockInfo) -> String {
    let pid = info
        .owner_pid
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<24} {:<8} {}  {}",
        info.resource,
        pid,
        info.acquired_at.format("%Y-%m-%d %H:%M:%S UTC"),
        info.owner
    )
}

pub async fn run_list(store: &SqliteStore) -> Result<(), LitesafeError> {
    let held = store.locks().await?.list().await?;
    if held.is_empty() {
        println!("no locks held");
        return Ok(());
    }
    println!("{:<24} {:<8} {:<23}  OWNER", "RESOURCE", "PID", "ACQUIRED");
    for info in &held {
        println!("{}", format_row(info));
    }
    Ok(())
}

/// Hold `name` until `hold_for` elapses or `shutdown` fires, then release.
pub async fn run_hold(
    store: &SqliteStore,
    name: &str,
    timeout: Option<Duration>,
    hold_for: Option<Duration>,
    shutdown: CancellationToken,
) -> Result<(), LitesafeError> {
    let locks = store.locks().await?;
    let mut handle = locks
        .acquire(name, timeout.unwrap_or(locks.default_timeout()))
        .await?;
    println!("holding `{name}` as {}", handle.owner());

    match hold_for {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = shutdown.cancelled() => {}
            }
        }
        None => shutdown.cancelled().await,
    }

    locks.release(&mut handle).await?;
    info!(resource = name, "released");
    println!("released `{name}`");
    Ok(())
}

pub async fn run_break(store: &SqliteStore, name: &str) -> Result<(), LitesafeError> {
    match store.locks().await?.break_lock(name).await? {
        Some(info) => println!("broke `{name}` held by {}", info.owner),
        None => println!("`{name}` is not held"),
    }
    Ok(())
}
