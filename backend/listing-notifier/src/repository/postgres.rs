use super::{CursorStore, SentLedger, SubscriberRepository};
use crate::error::Result;
use crate::models::{PreferenceSet, SubscriberProfile};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

#[derive(Clone)]
pub struct PgSubscriberRepository {
    pool: PgPool,
}

impl PgSubscriberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberRepository for PgSubscriberRepository {
    async fn list_verified(&self) -> Result<Vec<SubscriberProfile>> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, phone, is_verified, notify_email, notify_sms,
                   subscribe_new_grad, subscribe_internship, receive_all,
                   tech_keywords, role_keywords, location_keywords
            FROM subscribers
            WHERE is_verified = TRUE
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list verified subscribers")?;

        let mut subscribers = Vec::with_capacity(rows.len());
        for row in rows {
            let tech: Vec<String> = row.try_get("tech_keywords")?;
            let role: Vec<String> = row.try_get("role_keywords")?;
            let location: Vec<String> = row.try_get("location_keywords")?;

            subscribers.push(SubscriberProfile {
                id: row.try_get("id")?,
                email: row.try_get("email")?,
                phone: row.try_get("phone")?,
                notify_email: row.try_get("notify_email")?,
                notify_sms: row.try_get("notify_sms")?,
                is_verified: row.try_get("is_verified")?,
                preferences: PreferenceSet {
                    subscribe_new_grad: row.try_get("subscribe_new_grad")?,
                    subscribe_internship: row.try_get("subscribe_internship")?,
                    receive_all: row.try_get("receive_all")?,
                    tech_keywords: tech.into_iter().collect(),
                    role_keywords: role.into_iter().collect(),
                    location_keywords: location.into_iter().collect(),
                },
            });
        }

        debug!(count = subscribers.len(), "Loaded verified subscribers");
        Ok(subscribers)
    }
}

#[derive(Clone)]
pub struct PgCursorStore {
    pool: PgPool,
}

impl PgCursorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CursorStore for PgCursorStore {
    async fn get(&self, feed_name: &str) -> Result<Option<String>> {
        let cursor = sqlx::query_scalar::<_, String>(
            r#"
            SELECT last_commit_sha FROM feed_cursors WHERE feed_name = $1
            "#,
        )
        .bind(feed_name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read feed cursor")?;

        Ok(cursor)
    }

    async fn upsert(&self, feed_name: &str, cursor: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feed_cursors (feed_name, last_commit_sha, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (feed_name)
            DO UPDATE SET last_commit_sha = EXCLUDED.last_commit_sha,
                          updated_at = NOW()
            "#,
        )
        .bind(feed_name)
        .bind(cursor)
        .execute(&self.pool)
        .await
        .context("Failed to upsert feed cursor")?;

        debug!(feed = %feed_name, cursor = %cursor, "Feed cursor stored");
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgSentLedger {
    pool: PgPool,
}

impl PgSentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SentLedger for PgSentLedger {
    async fn was_sent(&self, subscriber_id: &str, posting_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sent_notifications
                WHERE subscriber_id = $1 AND posting_id = $2
            )
            "#,
        )
        .bind(subscriber_id)
        .bind(posting_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check sent notification")?;

        Ok(exists)
    }

    async fn mark_sent(&self, subscriber_id: &str, posting_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sent_notifications (subscriber_id, posting_id, sent_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (subscriber_id, posting_id) DO NOTHING
            "#,
        )
        .bind(subscriber_id)
        .bind(posting_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark notification as sent")?;

        Ok(result.rows_affected() > 0)
    }
}
