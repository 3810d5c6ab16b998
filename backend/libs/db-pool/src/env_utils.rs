//! Environment variable parsing utilities
//!
//! Small helpers shared by every `from_env` constructor so that a missing or
//! malformed optional variable falls back to its default instead of panicking.

use std::str::FromStr;

/// Parse an environment variable with a default fallback
///
/// # Example
/// ```ignore
/// let ttl: u64 = parse_env_with_default("LOCK_TTL_SECS", 120);
/// ```
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    parse_env_optional(key).unwrap_or(default)
}

/// Parse an environment variable, returning None if missing or invalid
pub fn parse_env_optional<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Read a string variable, treating an empty or whitespace-only value as unset
///
/// # Example
/// ```ignore
/// let token = env_non_empty("GITHUB_TOKEN").or_else(|| env_non_empty("GH_TOKEN"));
/// ```
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean flag; accepts `1/0`, `true/false`, `yes/no`, `on/off`
pub fn parse_env_bool(key: &str, default: bool) -> bool {
    match env_non_empty(key).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

/// Parse a required environment variable
pub fn parse_env_required<T: FromStr>(key: &str) -> Result<T, String> {
    env_non_empty(key)
        .ok_or_else(|| format!("Environment variable {} not set", key))?
        .parse()
        .map_err(|_| format!("Failed to parse environment variable {}", key))
}
