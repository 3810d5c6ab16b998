/// Environment-driven configuration for the poll-once job
use anyhow::{anyhow, Context, Result};
use db_pool::env_utils::{env_non_empty, parse_env_bool};
use db_pool::DbConfig;
use lease_lock::LeaseOptions;
use std::env;
use std::fmt;
use std::time::Duration;

const SERVICE_NAME: &str = "listing-notifier";

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DbConfig,
    pub github: GithubSettings,
    pub lock: LockSettings,
    pub run: RunSettings,
    pub links: LinkSettings,
    pub email: EmailSettings,
    pub sms: SmsSettings,
    pub enrichment: EnrichmentSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DbConfig::from_env(SERVICE_NAME).map_err(|e| anyhow!(e))?,
            github: GithubSettings::from_env()?,
            lock: LockSettings::from_env()?,
            run: RunSettings::from_env()?,
            links: LinkSettings::from_env(),
            email: EmailSettings::from_env()?,
            sms: SmsSettings::from_env(),
            enrichment: EnrichmentSettings::from_env()?,
        })
    }
}

/// Remote feed API access
#[derive(Clone)]
pub struct GithubSettings {
    pub api_url: String,
    /// Anonymous (rate-limited) access when absent
    pub token: Option<String>,
    pub page_size: u32,
}

impl GithubSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            token: env_non_empty("GITHUB_TOKEN").or_else(|| env_non_empty("GH_TOKEN")),
            page_size: env::var("GITHUB_PAGE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("Invalid GITHUB_PAGE_SIZE")?,
        })
    }
}

impl fmt::Debug for GithubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubSettings")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LockSettings {
    pub ttl_secs: u64,
    pub max_wait_secs: u64,
    pub retry_millis: u64,
}

impl LockSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            ttl_secs: env::var("LOCK_TTL_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("Invalid LOCK_TTL_SECS")?,
            max_wait_secs: env::var("LOCK_MAX_WAIT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid LOCK_MAX_WAIT_SECS")?,
            retry_millis: env::var("LOCK_RETRY_MILLIS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("Invalid LOCK_RETRY_MILLIS")?,
        })
    }

    pub fn lease_options(&self) -> LeaseOptions {
        LeaseOptions {
            ttl: Duration::from_secs(self.ttl_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
            retry_interval: Duration::from_millis(self.retry_millis),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Wall-clock ceiling for a whole poll-once invocation
    pub ceiling_secs: u64,
}

impl RunSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            ceiling_secs: env::var("RUN_CEILING_SECS")
                .unwrap_or_else(|_| "240".to_string())
                .parse()
                .context("Invalid RUN_CEILING_SECS")?,
        })
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_secs(self.ceiling_secs)
    }
}

#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub app_base_url: String,
}

impl LinkSettings {
    fn from_env() -> Self {
        Self {
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

/// SMTP delivery; an empty host means log-only mode
#[derive(Clone)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
    pub use_starttls: bool,
}

impl EmailSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .context("Invalid SMTP_PORT")?,
            smtp_username: env_non_empty("SMTP_USERNAME"),
            smtp_password: env_non_empty("SMTP_PASSWORD"),
            smtp_from: env::var("SMTP_FROM").unwrap_or_else(|_| "noreply@example.com".to_string()),
            use_starttls: parse_env_bool("SMTP_STARTTLS", true),
        })
    }
}

impl fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "[REDACTED]"))
            .field("smtp_from", &self.smtp_from)
            .field("use_starttls", &self.use_starttls)
            .finish()
    }
}

/// Twilio credentials; SMS is log-only unless all three are set
#[derive(Clone)]
pub struct SmsSettings {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
}

impl SmsSettings {
    fn from_env() -> Self {
        Self {
            account_sid: env_non_empty("TWILIO_ACCOUNT_SID"),
            auth_token: env_non_empty("TWILIO_AUTH_TOKEN"),
            from_number: env_non_empty("TWILIO_FROM_NUMBER"),
        }
    }
}

impl fmt::Debug for SmsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsSettings")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("from_number", &self.from_number)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub enabled: bool,
    pub concurrency: usize,
}

impl EnrichmentSettings {
    fn from_env() -> Result<Self> {
        let concurrency: usize = env::var("ENRICH_CONCURRENCY")
            .unwrap_or_else(|_| "6".to_string())
            .parse()
            .context("Invalid ENRICH_CONCURRENCY")?;

        Ok(Self {
            enabled: parse_env_bool("ENRICH_DESCRIPTIONS", false),
            concurrency: concurrency.max(1),
        })
    }
}
