//! Lease storage capability and its PostgreSQL implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::debug;

use crate::error::LockResult;

/// A named lease row: exactly one may exist per `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub name: String,
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Storage primitives the lock loop is built from.
///
/// Every method must be atomic on its own; [`crate::RunLock`] never relies on
/// a read followed by a write.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Insert a lease for `name` unless one already exists.
    ///
    /// Returns `true` when this call created the row.
    async fn try_insert(&self, name: &str, owner: &str, ttl: Duration) -> LockResult<bool>;

    /// Take over the lease for `name` only if it has already expired.
    ///
    /// Returns `true` when ownership moved to `owner`.
    async fn steal_if_expired(&self, name: &str, owner: &str, ttl: Duration) -> LockResult<bool>;

    /// Delete the lease only if `owner` still holds it.
    async fn release(&self, name: &str, owner: &str) -> LockResult<bool>;

    /// Read the current lease, expired or not.
    async fn current(&self, name: &str) -> LockResult<Option<Lease>>;
}

/// PostgreSQL lease store over the `run_leases` table:
///
/// ```sql
/// CREATE TABLE run_leases (
///     name       TEXT PRIMARY KEY,
///     owner      TEXT NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL
/// );
/// ```
///
/// Expiry is always evaluated against the database clock (`NOW()`), so
/// processes on hosts with skewed clocks still agree on who holds a lease.
#[derive(Clone)]
pub struct PgLeaseStore {
    pool: PgPool,
}

impl PgLeaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaseStore for PgLeaseStore {
    async fn try_insert(&self, name: &str, owner: &str, ttl: Duration) -> LockResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO run_leases (name, owner, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn steal_if_expired(&self, name: &str, owner: &str, ttl: Duration) -> LockResult<bool> {
        // Single conditional UPDATE: two racing stealers cannot both match
        let result = sqlx::query(
            r#"
            UPDATE run_leases
            SET owner = $2,
                expires_at = NOW() + make_interval(secs => $3)
            WHERE name = $1
              AND expires_at < NOW()
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        let stolen = result.rows_affected() > 0;
        if stolen {
            debug!(lock = %name, owner = %owner, "Took over expired lease");
        }
        Ok(stolen)
    }

    async fn release(&self, name: &str, owner: &str) -> LockResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM run_leases
            WHERE name = $1 AND owner = $2
            "#,
        )
        .bind(name)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn current(&self, name: &str) -> LockResult<Option<Lease>> {
        let row = sqlx::query(
            r#"
            SELECT name, owner, expires_at
            FROM run_leases
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> LockResult<Lease> {
            Ok(Lease {
                name: row.try_get("name")?,
                owner: row.try_get("owner")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }
}
