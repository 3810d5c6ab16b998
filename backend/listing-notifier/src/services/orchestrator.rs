//! One poll-and-notify cycle per feed.
//!
//! Cursor read, poll, per-subscriber match and dedup, one batched delivery
//! per subscriber, then the cursor advances. [`FeedRunner`] wraps each
//! cycle in the feed's lease so overlapping invocations do not double-process.

use crate::error::Result;
use crate::models::{FeedDescriptor, Posting, RunStats, SubscriberProfile};
use crate::repository::{CursorStore, SentLedger, SubscriberRepository};
use crate::services::delivery::DeliveryBatcher;
use crate::services::enrich::{enrich_descriptions, PostingEnricher};
use crate::services::feed_poller::FeedSource;
use crate::services::matcher::matches;
use futures::future::join_all;
use lease_lock::{LeaseOptions, RunLock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Description enrichment applied before matching
#[derive(Clone)]
pub struct Enrichment {
    pub enricher: Arc<dyn PostingEnricher>,
    pub concurrency: usize,
}

#[derive(Clone)]
pub struct Orchestrator {
    subscribers: Arc<dyn SubscriberRepository>,
    cursors: Arc<dyn CursorStore>,
    ledger: Arc<dyn SentLedger>,
    batcher: DeliveryBatcher,
    enrichment: Option<Enrichment>,
}

impl Orchestrator {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        cursors: Arc<dyn CursorStore>,
        ledger: Arc<dyn SentLedger>,
        batcher: DeliveryBatcher,
    ) -> Self {
        Self {
            subscribers,
            cursors,
            ledger,
            batcher,
            enrichment: None,
        }
    }

    pub fn with_enrichment(mut self, enrichment: Enrichment) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    /// Postings not yet sent to `subscriber`, each claimed in the ledger
    /// before it is returned.
    async fn claim_unsent(
        &self,
        subscriber: &SubscriberProfile,
        candidates: Vec<&Posting>,
    ) -> Result<Vec<Posting>> {
        let mut fresh = Vec::new();
        for posting in candidates {
            if self.ledger.was_sent(&subscriber.id, &posting.id).await? {
                continue;
            }
            if self.ledger.mark_sent(&subscriber.id, &posting.id).await? {
                fresh.push(posting.clone());
            }
        }
        Ok(fresh)
    }

    async fn maybe_enrich(
        &self,
        postings: Vec<Posting>,
        audience: &[SubscriberProfile],
    ) -> Vec<Posting> {
        let Some(enrichment) = &self.enrichment else {
            return postings;
        };
        if postings.is_empty() || !audience.iter().any(|s| s.preferences.has_content_keywords()) {
            return postings;
        }

        debug!(postings = postings.len(), "Enriching posting descriptions");
        enrich_descriptions(postings, enrichment.enricher.as_ref(), enrichment.concurrency).await
    }

    /// Run one cycle for `feed`.
    ///
    /// Subscribers are processed one at a time so ledger checks for the
    /// same pair never interleave. The cursor is written once, after every
    /// subscriber has been handled, and only if the poll moved it.
    pub async fn run_feed(
        &self,
        feed: &FeedDescriptor,
        source: &dyn FeedSource,
    ) -> Result<RunStats> {
        let feed_name = feed.name();
        let cursor_before = self.cursors.get(&feed_name).await?;

        let outcome = source.fetch_new_listings(cursor_before.as_deref()).await;

        let mut stats = RunStats {
            feed_name: feed_name.clone(),
            cursor_before: cursor_before.clone(),
            cursor_after: cursor_before.clone(),
            postings_considered: outcome.postings.len(),
            commits_processed: outcome.commits_processed,
            commits_skipped: outcome.commits_skipped,
            ..Default::default()
        };

        let audience: Vec<SubscriberProfile> = self
            .subscribers
            .list_verified()
            .await?
            .into_iter()
            .filter(|s| s.is_verified && s.preferences.subscribes_to(feed.kind))
            .collect();

        let postings = if audience.is_empty() {
            outcome.postings
        } else {
            self.maybe_enrich(outcome.postings, &audience).await
        };

        for subscriber in &audience {
            let candidates: Vec<&Posting> = postings
                .iter()
                .filter(|p| matches(p, &subscriber.preferences))
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let fresh = self.claim_unsent(subscriber, candidates).await?;
            if fresh.is_empty() {
                debug!(
                    feed = %feed_name,
                    subscriber_id = %subscriber.id,
                    "All matches already sent"
                );
                continue;
            }

            let delivery = self.batcher.send_batch(subscriber, feed, &fresh).await;
            if delivery.delivered() {
                stats.subscribers_notified += 1;
                stats.postings_sent_total += fresh.len();
            } else {
                warn!(
                    feed = %feed_name,
                    subscriber_id = %subscriber.id,
                    postings = fresh.len(),
                    outcome = ?delivery,
                    "Matches marked sent but no channel delivered them"
                );
            }
        }

        if let Some(cursor_after) = outcome.cursor {
            if cursor_before.as_deref() != Some(cursor_after.as_str()) {
                self.cursors.upsert(&feed_name, &cursor_after).await?;
                info!(
                    feed = %feed_name,
                    from = ?cursor_before,
                    to = %cursor_after,
                    "Cursor advanced"
                );
            }
            stats.cursor_after = Some(cursor_after);
        }

        Ok(stats)
    }
}

/// A feed paired with the source that polls it
#[derive(Clone)]
pub struct FeedJob {
    pub feed: FeedDescriptor,
    pub source: Arc<dyn FeedSource>,
}

/// Result of one guarded feed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRunReport {
    Completed(RunStats),
    /// Another runner holds the feed's lease
    Skipped,
    Failed(String),
}

impl FeedRunReport {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedRunReport::Completed(_) => "completed",
            FeedRunReport::Skipped => "skipped",
            FeedRunReport::Failed(_) => "failed",
        }
    }
}

/// Runs feeds under their leases
#[derive(Clone)]
pub struct FeedRunner {
    orchestrator: Arc<Orchestrator>,
    lock: RunLock,
    owner: String,
    lease: LeaseOptions,
}

impl FeedRunner {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        lock: RunLock,
        owner: String,
        lease: LeaseOptions,
    ) -> Self {
        Self {
            orchestrator,
            lock,
            owner,
            lease,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Acquire the feed's lease, run one cycle, release.
    ///
    /// Contention yields [`FeedRunReport::Skipped`]. A lease that was
    /// acquired is released whether the cycle succeeded or not.
    pub async fn run_one(&self, job: &FeedJob) -> FeedRunReport {
        let lock_name = job.feed.lock_name();
        let feed_name = job.feed.name();

        match self.lock.acquire(&lock_name, &self.owner, &self.lease).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    feed = %feed_name,
                    lock = %lock_name,
                    "Feed is being polled elsewhere, skipping"
                );
                return FeedRunReport::Skipped;
            }
            Err(e) => {
                error!(feed = %feed_name, error = %e, "Could not acquire feed lease");
                return FeedRunReport::Failed(format!("lease: {e}"));
            }
        }

        let result = self.orchestrator.run_feed(&job.feed, job.source.as_ref()).await;

        if let Err(e) = self.lock.release(&lock_name, &self.owner).await {
            warn!(feed = %feed_name, error = %e, "Failed to release feed lease; it will expire");
        }

        match result {
            Ok(stats) => FeedRunReport::Completed(stats),
            Err(e) => {
                error!(feed = %feed_name, error = %e, "Feed run failed");
                FeedRunReport::Failed(e.to_string())
            }
        }
    }

    /// Run every job concurrently; one feed's failure never affects another.
    pub async fn run_all(&self, jobs: &[FeedJob]) -> Vec<(String, FeedRunReport)> {
        join_all(jobs.iter().map(|job| async move {
            let report = self.run_one(job).await;
            (job.feed.name(), report)
        }))
        .await
    }
}
