/// Preset configurations for outbound HTTP calls
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Configuration bundle for a class of external calls
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Per-request timeout
    pub timeout: TimeoutConfig,
    /// Connect timeout for establishing the TCP/TLS session
    pub connect_timeout: Duration,
    pub retry: Option<RetryConfig>,
}

/// External HTTP APIs polled by a periodic batch run (idempotent GETs)
///
/// - Timeout: 10s per request, 5s connect
/// - Retry: 3 retries with exponential backoff (500ms, 1s, 2s), capped at 8s
pub fn http_external_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(10),
        },
        connect_timeout: Duration::from_secs(5),
        retry: Some(RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            jitter: true,
        }),
    }
}

/// Best-effort page fetches whose failure is tolerated
///
/// - Timeout: 10s per request, 5s connect
/// - No retry (a missing result is acceptable, latency is not)
pub fn http_enrichment_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(10),
        },
        connect_timeout: Duration::from_secs(5),
        retry: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_external_config() {
        let config = http_external_config();
        assert_eq!(config.timeout.duration, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        let retry = config.retry.expect("external calls retry");
        assert_eq!(retry.max_retries, 3);
    }

    #[test]
    fn test_http_enrichment_config() {
        let config = http_enrichment_config();
        assert!(config.retry.is_none());
    }
}
