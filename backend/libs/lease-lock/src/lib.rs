//! # Lease Lock
//!
//! Named, leased mutual exclusion over a shared store. Used to keep
//! overlapping scheduler invocations from polling the same feed twice.
//!
//! ## Semantics
//!
//! - **Acquire**: insert a lease row keyed by name. If a row exists and its
//!   expiry has passed, take it over in a single conditional update. Otherwise
//!   wait `retry_interval` and try again until `max_wait` has elapsed.
//! - **Contention is not an error**: `acquire` returns `Ok(false)` when someone
//!   else holds a live lease. Only storage failures are errors.
//! - **Release**: delete the row only if the caller's owner token still holds
//!   it. A run that outlived its TTL and had its lease taken over cannot
//!   release the new holder's lease.
//! - **Ownership** is proven by an opaque owner token (see [`owner_token`]),
//!   not by process identity.
//!
//! The TTL must exceed the worst-case duration of the guarded work. A holder
//! that hangs past its TTL can be displaced, and both may then run at once;
//! that is the price of never leaving a lock stuck forever.
//!
//! ## Usage Example
//!
//! ```ignore
//! use lease_lock::{owner_token, LeaseOptions, PgLeaseStore, RunLock};
//! use std::sync::Arc;
//!
//! # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let lock = RunLock::new(Arc::new(PgLeaseStore::new(pool)));
//! let owner = owner_token();
//!
//! if lock.acquire("poll:new-grad", &owner, &LeaseOptions::default()).await? {
//!     // ... guarded work ...
//!     lock.release("poll:new-grad", &owner).await?;
//! } else {
//!     println!("another run holds the lease, skipping");
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

mod error;
pub mod memory;
pub mod store;

pub use error::{LockError, LockResult};
pub use memory::InMemoryLeaseStore;
pub use store::{Lease, LeaseStore, PgLeaseStore};

/// Timing knobs for [`RunLock::acquire`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseOptions {
    /// How long a lease stays live without being released
    pub ttl: Duration,
    /// Give up after waiting this long for a live lease to go away
    pub max_wait: Duration,
    /// Pause between attempts while contended
    pub retry_interval: Duration,
}

impl Default for LeaseOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(120),
            max_wait: Duration::from_secs(10),
            retry_interval: Duration::from_millis(500),
        }
    }
}

/// Lease-based lock over a [`LeaseStore`]
#[derive(Clone)]
pub struct RunLock {
    store: Arc<dyn LeaseStore>,
}

impl RunLock {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self { store }
    }

    /// Try to acquire `name` for `owner`.
    ///
    /// At least one attempt is made even when `max_wait` is zero.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the lease was inserted or an expired lease was taken over
    /// - `Ok(false)` if a live lease was still held by someone else after `max_wait`
    /// - `Err` on storage errors or invalid arguments
    pub async fn acquire(
        &self,
        name: &str,
        owner: &str,
        options: &LeaseOptions,
    ) -> LockResult<bool> {
        validate_key(name)?;
        validate_key(owner)?;

        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            if self.store.try_insert(name, owner, options.ttl).await? {
                info!(lock = %name, owner = %owner, attempts, "Lease acquired");
                return Ok(true);
            }

            if self.store.steal_if_expired(name, owner, options.ttl).await? {
                warn!(
                    lock = %name,
                    owner = %owner,
                    attempts,
                    "Acquired lease by taking over an expired holder"
                );
                return Ok(true);
            }

            let elapsed = started.elapsed();
            if elapsed >= options.max_wait {
                debug!(
                    lock = %name,
                    owner = %owner,
                    attempts,
                    waited_ms = elapsed.as_millis() as u64,
                    "Lease still held elsewhere, giving up"
                );
                return Ok(false);
            }

            let remaining = options.max_wait - elapsed;
            tokio::time::sleep(options.retry_interval.min(remaining)).await;
        }
    }

    /// Release `name` if `owner` still holds it.
    ///
    /// Returns `false` when the lease was already gone or had been taken over.
    pub async fn release(&self, name: &str, owner: &str) -> LockResult<bool> {
        let released = self.store.release(name, owner).await?;
        if released {
            debug!(lock = %name, owner = %owner, "Lease released");
        } else {
            warn!(
                lock = %name,
                owner = %owner,
                "Lease was no longer held by this owner at release"
            );
        }
        Ok(released)
    }

    /// Read the current holder of `name`, if any.
    pub async fn holder(&self, name: &str) -> LockResult<Option<Lease>> {
        self.store.current(name).await
    }
}

/// Build a process-unique owner token: `{host}:{pid}:{uuid}`
pub fn owner_token() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "host".to_string());
    format!("{}:{}:{}", host, std::process::id(), Uuid::new_v4())
}

fn validate_key(key: &str) -> LockResult<()> {
    if key.trim().is_empty() {
        return Err(LockError::InvalidKey("lease key cannot be empty".to_string()));
    }
    if key.len() > 255 {
        return Err(LockError::InvalidKey(format!(
            "lease key too long: {} characters (max 255)",
            key.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("poll:new-grad").is_ok());
        assert!(matches!(validate_key(""), Err(LockError::InvalidKey(_))));
        assert!(matches!(validate_key("   "), Err(LockError::InvalidKey(_))));
        assert!(matches!(
            validate_key(&"x".repeat(256)),
            Err(LockError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_owner_tokens_are_unique() {
        let a = owner_token();
        let b = owner_token();
        assert_ne!(a, b);
        assert!(a.contains(&std::process::id().to_string()));
    }

    #[test]
    fn test_default_options() {
        let options = LeaseOptions::default();
        assert_eq!(options.ttl, Duration::from_secs(120));
        assert_eq!(options.max_wait, Duration::from_secs(10));
        assert_eq!(options.retry_interval, Duration::from_millis(500));
    }
}
