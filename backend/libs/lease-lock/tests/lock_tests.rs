//! Behavioural tests for RunLock over the in-memory store

use lease_lock::{InMemoryLeaseStore, LeaseOptions, RunLock};
use std::sync::Arc;
use std::time::Duration;

fn lock() -> RunLock {
    RunLock::new(Arc::new(InMemoryLeaseStore::new()))
}

fn options(ttl_ms: u64, max_wait_ms: u64) -> LeaseOptions {
    LeaseOptions {
        ttl: Duration::from_millis(ttl_ms),
        max_wait: Duration::from_millis(max_wait_ms),
        retry_interval: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_acquire_and_release() {
    let lock = lock();

    assert!(lock.acquire("X", "owner1", &options(2_000, 0)).await.unwrap());
    // Cannot get while held
    assert!(!lock.acquire("X", "owner2", &options(2_000, 50)).await.unwrap());

    assert!(lock.release("X", "owner1").await.unwrap());

    // After release, can acquire
    assert!(lock.acquire("X", "owner2", &options(2_000, 0)).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_acquire_yields_exactly_one_winner() {
    let lock = lock();
    let opts = options(5_000, 50);

    let (a, b) = tokio::join!(
        lock.acquire("poll:new-grad", "owner-a", &opts),
        lock.acquire("poll:new-grad", "owner-b", &opts),
    );

    let wins = [a.unwrap(), b.unwrap()].iter().filter(|won| **won).count();
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn test_expired_lease_is_stolen() {
    let lock = lock();

    assert!(lock.acquire("Y", "owner1", &options(30, 0)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(60)).await;

    // Stolen after expiry
    assert!(lock.acquire("Y", "owner2", &options(1_000, 0)).await.unwrap());
    let holder = lock.holder("Y").await.unwrap().expect("lease exists");
    assert_eq!(holder.owner, "owner2");
}

#[tokio::test]
async fn test_waiter_acquires_once_holder_expires() {
    let lock = lock();

    assert!(lock.acquire("Z", "owner1", &options(40, 0)).await.unwrap());
    // Waits past the holder's TTL and takes over
    assert!(lock.acquire("Z", "owner2", &options(1_000, 500)).await.unwrap());
}

#[tokio::test]
async fn test_displaced_owner_cannot_release_new_holder() {
    let lock = lock();

    assert!(lock.acquire("W", "slow-run", &options(20, 0)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(lock.acquire("W", "next-run", &options(5_000, 0)).await.unwrap());

    assert!(!lock.release("W", "slow-run").await.unwrap());
    let holder = lock.holder("W").await.unwrap().expect("lease kept");
    assert_eq!(holder.owner, "next-run");

    assert!(lock.release("W", "next-run").await.unwrap());
    assert!(lock.holder("W").await.unwrap().is_none());
}

#[tokio::test]
async fn test_leases_are_independent_per_name() {
    let lock = lock();
    let opts = options(5_000, 0);

    assert!(lock.acquire("poll:new-grad", "same-owner", &opts).await.unwrap());
    assert!(lock.acquire("poll:internship", "same-owner", &opts).await.unwrap());
}
