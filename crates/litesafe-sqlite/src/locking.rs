// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named cross-process locks backed by the store itself.
//!
//! A lock is a row in `distributed_locks`. Any process with a connection to
//! the same file takes part in the same mutual-exclusion domain, so there is
//! no lock server. Acquisition inserts the row and treats a conflict as a
//! transient "lock held" failure, retried under the shared busy-retry policy
//! until the caller's timeout.
//!
//! Rows are committed, so a lock held by a process that dies stays held
//! until an operator removes it with [`LockManager::break_lock`]. There are no
//! heartbeats or leases. Locks are not re-entrant: acquiring a resource the
//! same process already holds waits like any other contender.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use litesafe_core::{LitesafeError, OpenMode};
use litesafe_resilience::RetryError;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classify::AttemptError;
use crate::database::Database;
use crate::migrations::LOCK_TABLE_SQL;
use crate::retry::map_retry_error;

/// Timeout used by [`LockManager::acquire_default`] unless configured otherwise.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest wait `acquire` honours; larger timeouts (up to `Duration::MAX`)
/// mean "wait indefinitely" and are clamped to this.
const MAX_LOCK_WAIT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

const INSERT_SQL: &str = "INSERT INTO distributed_locks (resource_name, acquired_at, owner) \
                          VALUES (?1, ?2, ?3) ON CONFLICT(resource_name) DO NOTHING";
const RELEASE_SQL: &str = "DELETE FROM distributed_locks WHERE resource_name = ?1 AND owner = ?2";
const HOLDER_SQL: &str =
    "SELECT resource_name, acquired_at, owner FROM distributed_locks WHERE resource_name = ?1";

/// Lifecycle of one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Unlocked,
    Acquiring,
    Held,
    Releasing,
    /// The timeout elapsed before the lock was acquired.
    Failed,
}

/// A lock row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub resource: String,
    /// `pid:uuid` of the acquiring handle.
    pub owner: String,
    pub owner_pid: Option<u32>,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let owner: String = row.get(2)?;
        Ok(Self {
            resource: row.get(0)?,
            owner_pid: owner_pid(&owner),
            owner,
            acquired_at: from_millis(row.get(1)?),
        })
    }
}

fn owner_pid(owner: &str) -> Option<u32> {
    owner.split_once(':').and_then(|(pid, _)| pid.parse().ok())
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// An exclusively held named lock.
///
/// Release it with [`LockManager::release`]. A handle dropped while still
/// held is released in the background if a tokio runtime is available.
#[derive(Debug)]
pub struct LockHandle {
    resource: String,
    owner: String,
    acquired_at: DateTime<Utc>,
    store: String,
    state: LockState,
    releaser: Option<Database>,
}

impl LockHandle {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn owner_pid(&self) -> Option<u32> {
        owner_pid(&self.owner)
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Path of the store the lock row lives in.
    pub fn store_path(&self) -> &str {
        &self.store
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_held(&self) -> bool {
        self.state == LockState::Held
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if self.state != LockState::Held {
            return;
        }
        let Some(db) = self.releaser.take().map(|db| db.without_cancellation()) else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                resource = %self.resource,
                owner = %self.owner,
                "lock handle dropped outside a runtime, row left in place"
            );
            return;
        };

        warn!(resource = %self.resource, "lock handle dropped while held, releasing in background");
        let resource = self.resource.clone();
        let owner = self.owner.clone();
        runtime.spawn(async move {
            let result = db
                .call("lock.release", move |c| c.execute(RELEASE_SQL, params![resource, owner]))
                .await;
            if let Err(e) = result {
                warn!(error = %e, "background lock release failed");
            }
        });
    }
}

/// Acquires and releases named locks in one store.
#[derive(Debug, Clone)]
pub struct LockManager {
    db: Database,
    default_timeout: Duration,
}

impl LockManager {
    /// Create a manager on `db`, creating the lock table if it is missing.
    ///
    /// A read-only store must already have the table.
    pub async fn new(db: Database) -> Result<Self, LitesafeError> {
        let manager = Self {
            db,
            default_timeout: DEFAULT_LOCK_TIMEOUT,
        };
        manager.ensure_schema().await?;
        Ok(manager)
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn ensure_schema(&self) -> Result<(), LitesafeError> {
        if self.db.descriptor().mode == OpenMode::ReadOnly {
            let exists = self
                .db
                .call("lock.schema", |c| {
                    c.query_row(
                        "SELECT COUNT(*) FROM sqlite_master \
                         WHERE type = 'table' AND name = 'distributed_locks'",
                        [],
                        |r| r.get::<_, i64>(0),
                    )
                })
                .await?;
            if exists == 0 {
                return Err(LitesafeError::Config(format!(
                    "store `{}` is read-only and has no lock table",
                    self.db.path()
                )));
            }
            return Ok(());
        }
        self.db
            .call("lock.schema", |c| c.execute_batch(LOCK_TABLE_SQL))
            .await
    }

    /// Acquire `resource`, waiting up to `timeout`. A zero timeout makes a
    /// single attempt; `Duration::MAX` waits indefinitely.
    pub async fn acquire(
        &self,
        resource: &str,
        timeout: Duration,
    ) -> Result<LockHandle, LitesafeError> {
        if resource.trim().is_empty() {
            return Err(LitesafeError::Invalid(
                "lock resource name must not be empty".to_string(),
            ));
        }

        let owner = format!("{}:{}", std::process::id(), Uuid::new_v4());
        let started = Instant::now();
        debug!(resource, %owner, state = ?LockState::Acquiring, ?timeout, "acquiring lock");

        let result = self
            .db
            .retry()
            .execute_until(started + timeout.min(MAX_LOCK_WAIT), || {
                let resource = resource.to_string();
                let owner = owner.clone();
                async move {
                    let name = resource.clone();
                    match self.db.attempt(move |c| try_insert(c, &name, &owner)).await? {
                        Ok(acquired_at) => Ok(acquired_at),
                        Err(holder) => Err(AttemptError::LockHeld {
                            resource,
                            owner: holder,
                        }),
                    }
                }
            })
            .await;

        match result {
            Ok(acquired_at) => {
                info!(
                    resource,
                    %owner,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "lock acquired"
                );
                Ok(LockHandle {
                    resource: resource.to_string(),
                    owner,
                    acquired_at: from_millis(acquired_at),
                    store: self.db.path().to_string(),
                    state: LockState::Held,
                    releaser: Some(self.db.clone()),
                })
            }
            Err(RetryError::DeadlineElapsed { attempts, error }) => {
                let holder = match error {
                    AttemptError::LockHeld { owner, .. } => owner,
                    _ => None,
                };
                let waited = started.elapsed();
                warn!(
                    resource,
                    attempts,
                    holder = holder.as_deref().unwrap_or("unknown"),
                    state = ?LockState::Failed,
                    "lock acquisition timed out"
                );
                Err(LitesafeError::LockTimeout {
                    resource: resource.to_string(),
                    waited,
                    holder,
                })
            }
            Err(other) => Err(map_retry_error(other)),
        }
    }

    /// Acquire with the manager's default timeout.
    pub async fn acquire_default(&self, resource: &str) -> Result<LockHandle, LitesafeError> {
        self.acquire(resource, self.default_timeout).await
    }

    /// Release `handle`.
    ///
    /// Releasing an already released handle is a no-op. A handle from
    /// another store, or one whose row is gone or now belongs to someone
    /// else, is [`LitesafeError::InvalidHandle`]. The delete retries with
    /// full backoff even after the provider's cancellation token fired.
    pub async fn release(&self, handle: &mut LockHandle) -> Result<(), LitesafeError> {
        if !handle.is_held() {
            debug!(resource = %handle.resource, "lock already released");
            return Ok(());
        }
        if handle.store != self.db.path() {
            return Err(LitesafeError::InvalidHandle {
                resource: handle.resource.clone(),
                reason: format!("handle belongs to store `{}`", handle.store),
            });
        }

        handle.state = LockState::Releasing;
        let resource = handle.resource.clone();
        let owner = handle.owner.clone();
        let deleted = match self
            .db
            .without_cancellation()
            .call("lock.release", move |c| c.execute(RELEASE_SQL, params![resource, owner]))
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                // Still ours; the caller may retry or drop the handle.
                handle.state = LockState::Held;
                return Err(e);
            }
        };

        handle.state = LockState::Unlocked;
        handle.releaser = None;
        if deleted == 0 {
            return Err(LitesafeError::InvalidHandle {
                resource: handle.resource.clone(),
                reason: "lock is no longer held by this owner".to_string(),
            });
        }
        info!(resource = %handle.resource, owner = %handle.owner, "lock released");
        Ok(())
    }

    /// Run `f` while holding `resource`. The lock is released whether `f`
    /// succeeds or fails; `f`'s error wins over a release error.
    pub async fn with_lock<F, Fut, T>(
        &self,
        resource: &str,
        timeout: Duration,
        f: F,
    ) -> Result<T, LitesafeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LitesafeError>>,
    {
        let mut handle = self.acquire(resource, timeout).await?;
        let outcome = f().await;
        let released = self.release(&mut handle).await;
        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(resource, error = %release_err, "release after failed critical section also failed");
                Err(e)
            }
        }
    }

    /// Current holder of `resource`, if any.
    pub async fn holder(&self, resource: &str) -> Result<Option<LockInfo>, LitesafeError> {
        let resource = resource.to_string();
        self.db
            .call("lock.holder", move |c| {
                c.query_row(HOLDER_SQL, [&resource], LockInfo::from_row)
                    .optional()
            })
            .await
    }

    /// Every held lock, ordered by resource name.
    pub async fn list(&self) -> Result<Vec<LockInfo>, LitesafeError> {
        self.db
            .call("lock.list", |c| {
                let mut stmt = c.prepare(
                    "SELECT resource_name, acquired_at, owner FROM distributed_locks \
                     ORDER BY resource_name",
                )?;
                let rows = stmt.query_map([], LockInfo::from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await
    }

    /// Remove the row for `resource` regardless of owner. For clearing locks
    /// left behind by dead processes. Returns the removed row.
    pub async fn break_lock(&self, resource: &str) -> Result<Option<LockInfo>, LitesafeError> {
        let name = resource.to_string();
        let removed = self
            .db
            .call("lock.break", move |c| {
                let tx = c.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let info = tx
                    .query_row(HOLDER_SQL, [&name], LockInfo::from_row)
                    .optional()?;
                if info.is_some() {
                    tx.execute("DELETE FROM distributed_locks WHERE resource_name = ?1", [&name])?;
                }
                tx.commit()?;
                Ok(info)
            })
            .await?;

        match &removed {
            Some(info) => warn!(resource, owner = %info.owner, "lock broken"),
            None => debug!(resource, "no lock to break"),
        }
        Ok(removed)
    }
}

/// One insert attempt. `Ok(Err(holder))` means the row already exists.
fn try_insert(
    conn: &mut rusqlite::Connection,
    resource: &str,
    owner: &str,
) -> rusqlite::Result<Result<i64, Option<String>>> {
    let now = Utc::now().timestamp_millis();
    let inserted = conn.execute(INSERT_SQL, params![resource, now, owner])?;
    if inserted == 1 {
        return Ok(Ok(now));
    }
    let holder = conn
        .query_row(
            "SELECT owner FROM distributed_locks WHERE resource_name = ?1",
            [resource],
            |r| r.get(0),
        )
        .optional()?;
    Ok(Err(holder))
}
