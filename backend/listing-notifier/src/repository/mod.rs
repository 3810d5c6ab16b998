//! Storage capabilities used by the pipeline.
//!
//! Each trait has a Postgres implementation for the deployed binary and an
//! in-memory implementation for tests and dry runs.

use crate::error::Result;
use crate::models::SubscriberProfile;
use async_trait::async_trait;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryCursorStore, InMemorySentLedger, InMemorySubscriberRepository};
pub use postgres::{PgCursorStore, PgSentLedger, PgSubscriberRepository};

/// Read access to subscriber profiles
#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Every verified subscriber, in a stable order
    async fn list_verified(&self) -> Result<Vec<SubscriberProfile>>;
}

/// Per-feed watermark, last write wins
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, feed_name: &str) -> Result<Option<String>>;

    async fn upsert(&self, feed_name: &str, cursor: &str) -> Result<()>;
}

/// Append-only record of (subscriber, posting) pairs already notified
#[async_trait]
pub trait SentLedger: Send + Sync {
    async fn was_sent(&self, subscriber_id: &str, posting_id: &str) -> Result<bool>;

    /// Insert the pair if absent.
    ///
    /// Returns `true` only for the call that actually inserted it, so two
    /// racing callers cannot both claim the same pair.
    async fn mark_sent(&self, subscriber_id: &str, posting_id: &str) -> Result<bool>;
}
