//! Job listing feed poller and notifier.
//!
//! Polls listings feeds for new commits, extracts added postings, matches
//! them against subscriber preferences and sends each subscriber at most
//! one batched notification per feed per run.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use models::{FeedDescriptor, FeedKind, Posting, PreferenceSet, RunStats, SubscriberProfile};

/// Embedded SQL migrations
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
