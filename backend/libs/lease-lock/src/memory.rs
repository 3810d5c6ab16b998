//! In-process lease store
//!
//! Gives the same atomicity guarantees as the SQL store within one process
//! (every operation runs under a single mutex). Used by tests and by callers
//! that only need to coordinate tasks inside one process.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{LockError, LockResult};
use crate::store::{Lease, LeaseStore};

#[derive(Default)]
pub struct InMemoryLeaseStore {
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn expiry_after(ttl: Duration) -> LockResult<chrono::DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| LockError::InvalidTtl(e.to_string()))?;
    Ok(Utc::now() + ttl)
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn try_insert(&self, name: &str, owner: &str, ttl: Duration) -> LockResult<bool> {
        let expires_at = expiry_after(ttl)?;
        let mut leases = self.leases.lock().await;
        if leases.contains_key(name) {
            return Ok(false);
        }
        leases.insert(
            name.to_string(),
            Lease {
                name: name.to_string(),
                owner: owner.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn steal_if_expired(&self, name: &str, owner: &str, ttl: Duration) -> LockResult<bool> {
        let expires_at = expiry_after(ttl)?;
        let mut leases = self.leases.lock().await;
        match leases.get_mut(name) {
            Some(lease) if lease.is_expired_at(Utc::now()) => {
                lease.owner = owner.to_string();
                lease.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, name: &str, owner: &str) -> LockResult<bool> {
        let mut leases = self.leases.lock().await;
        match leases.get(name) {
            Some(lease) if lease.owner == owner => {
                leases.remove(name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn current(&self, name: &str) -> LockResult<Option<Lease>> {
        Ok(self.leases.lock().await.get(name).cloned())
    }
}
