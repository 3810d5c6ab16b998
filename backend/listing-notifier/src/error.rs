use lease_lock::LockError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Store failure with context attached at the call site
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

/// Failures talking to the remote feed API
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed API returned HTTP {status}")]
    Http { status: u16 },

    #[error("feed API transport error: {message}")]
    Transport { message: String, retriable: bool },

    #[error("feed API response could not be decoded: {0}")]
    Decode(String),
}

impl FeedError {
    /// Rate limiting, server errors, timeouts and connect failures
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Http { status } => *status == 429 || (500..=599).contains(status),
            FeedError::Transport { retriable, .. } => *retriable,
            FeedError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FeedError::Http {
                status: status.as_u16(),
            };
        }
        if err.is_decode() {
            return FeedError::Decode(err.to_string());
        }
        FeedError::Transport {
            retriable: err.is_timeout() || err.is_connect(),
            message: err.to_string(),
        }
    }
}

/// Failures handing a message to an email or SMS provider
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("email send failed: {0}")]
    Email(String),

    #[error("SMS send failed: {0}")]
    Sms(String),
}
