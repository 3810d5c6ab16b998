use super::{CursorStore, SentLedger, SubscriberRepository};
use crate::error::Result;
use crate::models::SubscriberProfile;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct InMemorySubscriberRepository {
    subscribers: Vec<SubscriberProfile>,
}

impl InMemorySubscriberRepository {
    pub fn new(subscribers: Vec<SubscriberProfile>) -> Self {
        Self { subscribers }
    }
}

#[async_trait]
impl SubscriberRepository for InMemorySubscriberRepository {
    async fn list_verified(&self) -> Result<Vec<SubscriberProfile>> {
        Ok(self.subscribers.iter().filter(|s| s.is_verified).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryCursorStore {
    cursors: Mutex<HashMap<String, String>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn get(&self, feed_name: &str) -> Result<Option<String>> {
        Ok(self.cursors.lock().await.get(feed_name).cloned())
    }

    async fn upsert(&self, feed_name: &str, cursor: &str) -> Result<()> {
        self.cursors
            .lock()
            .await
            .insert(feed_name.to_string(), cursor.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySentLedger {
    sent: Mutex<HashSet<(String, String)>>,
}

impl InMemorySentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl SentLedger for InMemorySentLedger {
    async fn was_sent(&self, subscriber_id: &str, posting_id: &str) -> Result<bool> {
        let key = (subscriber_id.to_string(), posting_id.to_string());
        Ok(self.sent.lock().await.contains(&key))
    }

    async fn mark_sent(&self, subscriber_id: &str, posting_id: &str) -> Result<bool> {
        let key = (subscriber_id.to_string(), posting_id.to_string());
        Ok(self.sent.lock().await.insert(key))
    }
}
