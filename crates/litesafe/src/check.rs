// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `litesafe check` command implementation.
//!
//! Runs diagnostic checks against the configured store: connection string,
//! reachability, journal mode, schema version and lingering locks.

use std::time::{Duration, Instant};

use litesafe_config::LitesafeConfig;
use litesafe_core::HealthStatus;
use litesafe_sqlite::migrations::{applied_version, embedded_count};
use litesafe_sqlite::SqliteStore;

/// Locks older than this many default lock timeouts are reported as
/// possibly orphaned.
const ORPHAN_FACTOR: u32 = 10;

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn timed(name: &'static str, started: Instant, status: CheckStatus, message: String) -> Self {
        Self {
            name,
            status,
            message,
            duration: started.elapsed(),
        }
    }

    fn render(&self) -> String {
        let tag = match self.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<18} {} ({}ms)",
            self.name,
            self.message,
            self.duration.as_millis()
        )
    }
}

/// Run the checks, print a report, and return whether none failed.
pub async fn run_check(config: &LitesafeConfig, store: &SqliteStore) -> bool {
    let results = collect(config, store).await;

    println!();
    println!("  litesafe check");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", result.render());
    }
    println!();

    let failed = results.iter().filter(|r| r.status == CheckStatus::Fail).count();
    let warned = results.iter().filter(|r| r.status == CheckStatus::Warn).count();
    match (failed, warned) {
        (0, 0) => println!("  All checks passed."),
        (f, w) => println!("  {f} failed, {w} warning(s)."),
    }
    failed == 0
}

pub async fn collect(config: &LitesafeConfig, store: &SqliteStore) -> Vec<CheckResult> {
    let mut results = vec![check_connection_string(config, store)];
    if results[0].status == CheckStatus::Fail {
        return results;
    }

    let reachable = check_store(store).await;
    let unreachable = reachable.status == CheckStatus::Fail;
    results.push(reachable);
    if unreachable {
        return results;
    }

    results.push(check_journal_mode(config, store).await);
    results.push(check_schema(store).await);
    results.push(check_locks(config, store).await);
    results
}

fn check_connection_string(config: &LitesafeConfig, store: &SqliteStore) -> CheckResult {
    let started = Instant::now();
    let provider = store.provider();
    if !config
        .database
        .provider_name
        .trim()
        .eq_ignore_ascii_case(provider.name())
    {
        return CheckResult::timed(
            "connection string",
            started,
            CheckStatus::Fail,
            format!(
                "provider `{}` is not handled by `{}`",
                config.database.provider_name,
                provider.name()
            ),
        );
    }
    match provider.prepare(&config.database.connection_string) {
        Ok(safe) if safe.is_configured() => CheckResult::timed(
            "connection string",
            started,
            CheckStatus::Pass,
            safe.to_string(),
        ),
        Ok(_) => CheckResult::timed(
            "connection string",
            started,
            CheckStatus::Fail,
            "no data source configured".to_string(),
        ),
        Err(e) => CheckResult::timed("connection string", started, CheckStatus::Fail, e.to_string()),
    }
}

async fn check_store(store: &SqliteStore) -> CheckResult {
    let started = Instant::now();
    match store.health_check().await {
        HealthStatus::Healthy => {
            CheckResult::timed("store", started, CheckStatus::Pass, "reachable".to_string())
        }
        HealthStatus::Degraded(reason) => {
            CheckResult::timed("store", started, CheckStatus::Warn, reason)
        }
        HealthStatus::Unhealthy(reason) => {
            CheckResult::timed("store", started, CheckStatus::Fail, reason)
        }
    }
}

async fn check_journal_mode(config: &LitesafeConfig, store: &SqliteStore) -> CheckResult {
    let started = Instant::now();
    let db = match store.database().await {
        Ok(db) => db,
        Err(e) => return CheckResult::timed("journal mode", started, CheckStatus::Fail, e.to_string()),
    };
    let actual = db
        .call("check.journal_mode", |c| {
            c.query_row("PRAGMA journal_mode", [], |r| r.get::<_, String>(0))
        })
        .await;
    let expected = config.database.journal_mode.pragma_value();
    match actual {
        Ok(mode) if mode.eq_ignore_ascii_case(expected) => {
            CheckResult::timed("journal mode", started, CheckStatus::Pass, mode.to_uppercase())
        }
        Ok(mode) => CheckResult::timed(
            "journal mode",
            started,
            CheckStatus::Warn,
            format!("store uses {}, configuration expects {expected}", mode.to_uppercase()),
        ),
        Err(e) => CheckResult::timed("journal mode", started, CheckStatus::Fail, e.to_string()),
    }
}

async fn check_schema(store: &SqliteStore) -> CheckResult {
    let started = Instant::now();
    let db = match store.database().await {
        Ok(db) => db,
        Err(e) => return CheckResult::timed("schema", started, CheckStatus::Fail, e.to_string()),
    };
    match applied_version(db).await {
        Ok(Some(version)) => CheckResult::timed("schema", started, CheckStatus::Pass, version),
        Ok(None) => CheckResult::timed(
            "schema",
            started,
            CheckStatus::Warn,
            format!(
                "{} migration(s) pending, run `litesafe migrate`",
                embedded_count()
            ),
        ),
        Err(e) => CheckResult::timed("schema", started, CheckStatus::Fail, e.to_string()),
    }
}

async fn check_locks(config: &LitesafeConfig, store: &SqliteStore) -> CheckResult {
    let started = Instant::now();
    let locks = match store.locks().await {
        Ok(locks) => locks,
        Err(e) => return CheckResult::timed("locks", started, CheckStatus::Fail, e.to_string()),
    };
    let held = match locks.list().await {
        Ok(held) => held,
        Err(e) => return CheckResult::timed("locks", started, CheckStatus::Fail, e.to_string()),
    };

    let max_age = Duration::from_millis(config.lock.default_timeout_ms) * ORPHAN_FACTOR;
    let now = chrono::Utc::now();
    let stale: Vec<&str> = held
        .iter()
        .filter(|info| {
            (now - info.acquired_at)
                .to_std()
                .is_ok_and(|age| age > max_age)
        })
        .map(|info| info.resource.as_str())
        .collect();

    if stale.is_empty() {
        CheckResult::timed(
            "locks",
            started,
            CheckStatus::Pass,
            format!("{} held", held.len()),
        )
    } else {
        CheckResult::timed(
            "locks",
            started,
            CheckStatus::Warn,
            format!(
                "possibly orphaned: {} (see `litesafe lock break`)",
                stale.join(", ")
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use litesafe_sqlite::SqliteProvider;

    fn config_for(path: &std::path::Path) -> LitesafeConfig {
        let mut config = LitesafeConfig::default();
        config.database.connection_string = format!("Data Source={}", path.display());
        config
    }

    #[tokio::test]
    async fn fresh_store_passes_with_pending_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("check.db");
        let provider = Arc::new(SqliteProvider::default());
        provider.creator().create(&path).await.unwrap();

        let config = config_for(&path);
        let store = SqliteStore::new(provider, config.database.connection_string.clone());
        let results = collect(&config, &store).await;

        let statuses: Vec<_> = results.iter().map(|r| (r.name, r.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("connection string", CheckStatus::Pass),
                ("store", CheckStatus::Pass),
                ("journal mode", CheckStatus::Pass),
                ("schema", CheckStatus::Warn),
                ("locks", CheckStatus::Pass),
            ]
        );
        assert!(results[0].message.contains("Mode=ReadWrite"));
    }

    #[tokio::test]
    async fn missing_store_stops_after_reachability() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let config = config_for(&path);
        let store = SqliteStore::new(
            Arc::new(SqliteProvider::default()),
            config.database.connection_string.clone(),
        );

        let results = collect(&config, &store).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].status, CheckStatus::Fail);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn foreign_provider_fails_first_check() {
        let mut config = LitesafeConfig::default();
        config.database.provider_name = "postgres".to_string();
        let store = SqliteStore::new(Arc::new(SqliteProvider::default()), "Data Source=x.db");
        let results = collect(&config, &store).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, CheckStatus::Fail);
        assert!(results[0].message.contains("postgres"));
    }

    #[test]
    fn render_pads_names() {
        let result = CheckResult {
            name: "store",
            status: CheckStatus::Warn,
            message: "slow".to_string(),
            duration: Duration::from_millis(7),
        };
        assert_eq!(result.render(), "    [WARN] store              slow (7ms)");
    }
}
