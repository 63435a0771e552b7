// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::RelayError;
use crate::severity::Severity;
use std::env;
use std::time::Duration;

/// Marker prepended to batches that were cut down to size.
pub const ELLIPSIS: &str = "...";

/// Configuration for a relay session
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Webhook URL messages are posted to
    pub webhook_url: Option<String>,
    /// Sender label attached to every message
    pub username: String,
    /// Records below this severity are ignored
    pub log_level: Severity,
    /// Records at or above this severity are flushed immediately
    pub flush_level: Severity,
    /// Maximum time buffered records wait before being flushed
    pub flush_interval: Duration,
    /// Number of buffered records that forces a flush
    pub max_batch_entries: usize,
    /// Maximum length of a delivered batch, in characters
    pub max_message_length: usize,
    /// Label used when a progress bar does not carry its own description
    pub progress_description: String,
    /// Number of evenly spaced progress checkpoints per run
    pub progress_intervals: u32,
    /// Upper bound on a single delivery attempt
    pub request_timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "Application".to_string(),
            log_level: Severity::Info,
            flush_level: Severity::Warn,
            flush_interval: Duration::from_secs(1),
            max_batch_entries: 10,
            max_message_length: 2000,
            progress_description: "Progress".to_string(),
            progress_intervals: 10,
            request_timeout: Duration::from_secs(5),
            https_proxy: None,
        }
    }
}

impl RelayConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unset keys keep their default. Keys that are set but unparseable are
    /// rejected rather than silently ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let webhook_url = lookup("RELAY_WEBHOOK_URL").filter(|url| !url.trim().is_empty());
        let username = lookup("RELAY_USERNAME").unwrap_or(defaults.username);
        let log_level = match lookup("RELAY_LOG_LEVEL") {
            Some(val) => val.parse().map_err(RelayError::InvalidConfig)?,
            None => defaults.log_level,
        };
        let flush_level = match lookup("RELAY_FLUSH_LEVEL") {
            Some(val) => val.parse().map_err(RelayError::InvalidConfig)?,
            None => defaults.flush_level,
        };
        let flush_interval = match lookup("RELAY_FLUSH_INTERVAL") {
            Some(val) => parse_seconds("RELAY_FLUSH_INTERVAL", &val)?,
            None => defaults.flush_interval,
        };
        let max_batch_entries = match lookup("RELAY_MAX_BATCH_ENTRIES") {
            Some(val) => parse_number("RELAY_MAX_BATCH_ENTRIES", &val)?,
            None => defaults.max_batch_entries,
        };
        let max_message_length = match lookup("RELAY_MAX_MESSAGE_LENGTH") {
            Some(val) => parse_number("RELAY_MAX_MESSAGE_LENGTH", &val)?,
            None => defaults.max_message_length,
        };
        let progress_description =
            lookup("RELAY_PROGRESS_DESCRIPTION").unwrap_or(defaults.progress_description);
        let progress_intervals = match lookup("RELAY_PROGRESS_INTERVALS") {
            Some(val) => parse_number("RELAY_PROGRESS_INTERVALS", &val)?,
            None => defaults.progress_intervals,
        };
        let request_timeout = match lookup("RELAY_REQUEST_TIMEOUT") {
            Some(val) => parse_seconds("RELAY_REQUEST_TIMEOUT", &val)?,
            None => defaults.request_timeout,
        };
        let https_proxy = lookup("RELAY_PROXY_HTTPS").or_else(|| lookup("HTTPS_PROXY"));

        let config = Self {
            webhook_url,
            username,
            log_level,
            flush_level,
            flush_interval,
            max_batch_entries,
            max_message_length,
            progress_description,
            progress_intervals,
            request_timeout,
            https_proxy,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.username.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "RELAY_USERNAME cannot be empty".to_string(),
            ));
        }

        if self.max_batch_entries == 0 {
            return Err(RelayError::InvalidConfig(
                "Max batch entries must be greater than 0".to_string(),
            ));
        }

        // Room for the ellipsis plus at least one character of content
        if self.max_message_length <= ELLIPSIS.len() {
            return Err(RelayError::InvalidConfig(format!(
                "Max message length must be greater than {}",
                ELLIPSIS.len()
            )));
        }

        if self.progress_intervals == 0 || 100 % self.progress_intervals != 0 {
            return Err(RelayError::InvalidConfig(format!(
                "Progress intervals must evenly divide 100, got {}",
                self.progress_intervals
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(RelayError::InvalidConfig(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(url) = &self.webhook_url {
            reqwest::Url::parse(url).map_err(|e| {
                RelayError::InvalidConfig(format!("Invalid webhook URL '{url}': {e}"))
            })?;
        }

        Ok(())
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration, RelayError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| RelayError::InvalidConfig(format!("{key} must be seconds, got '{value}'")))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, RelayError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| RelayError::InvalidConfig(format!("{key} must be a number, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_batch_entries, 10);
        assert_eq!(config.max_message_length, 2000);
        assert_eq!(config.progress_intervals, 10);
        assert_eq!(config.flush_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = RelayConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.webhook_url.is_none());
        assert_eq!(config.username, "Application");
        assert_eq!(config.log_level, Severity::Info);
        assert_eq!(config.flush_level, Severity::Warn);
    }

    #[test]
    fn test_from_lookup_reads_every_option() {
        let config = RelayConfig::from_lookup(lookup_from(&[
            ("RELAY_WEBHOOK_URL", "https://hooks.example.com/abc"),
            ("RELAY_USERNAME", "MyApp"),
            ("RELAY_LOG_LEVEL", "debug"),
            ("RELAY_FLUSH_LEVEL", "error"),
            ("RELAY_FLUSH_INTERVAL", "2.5"),
            ("RELAY_MAX_BATCH_ENTRIES", "25"),
            ("RELAY_MAX_MESSAGE_LENGTH", "500"),
            ("RELAY_PROGRESS_DESCRIPTION", "Training"),
            ("RELAY_PROGRESS_INTERVALS", "4"),
            ("RELAY_REQUEST_TIMEOUT", "10"),
            ("HTTPS_PROXY", "https://proxy.example.com"),
        ]))
        .unwrap();

        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://hooks.example.com/abc")
        );
        assert_eq!(config.username, "MyApp");
        assert_eq!(config.log_level, Severity::Debug);
        assert_eq!(config.flush_level, Severity::Error);
        assert_eq!(config.flush_interval, Duration::from_millis(2500));
        assert_eq!(config.max_batch_entries, 25);
        assert_eq!(config.max_message_length, 500);
        assert_eq!(config.progress_description, "Training");
        assert_eq!(config.progress_intervals, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(
            config.https_proxy.as_deref(),
            Some("https://proxy.example.com")
        );
    }

    #[test]
    fn test_relay_proxy_takes_precedence() {
        let config = RelayConfig::from_lookup(lookup_from(&[
            ("RELAY_PROXY_HTTPS", "https://relay-proxy"),
            ("HTTPS_PROXY", "https://global-proxy"),
        ]))
        .unwrap();
        assert_eq!(config.https_proxy.as_deref(), Some("https://relay-proxy"));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        for (key, value) in [
            ("RELAY_LOG_LEVEL", "loud"),
            ("RELAY_FLUSH_INTERVAL", "soon"),
            ("RELAY_FLUSH_INTERVAL", "-1"),
            ("RELAY_MAX_BATCH_ENTRIES", "ten"),
            ("RELAY_WEBHOOK_URL", "not a url"),
        ] {
            assert!(
                RelayConfig::from_lookup(lookup_from(&[(key, value)])).is_err(),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_progress_intervals() {
        for intervals in [1, 2, 4, 5, 10, 20, 25, 50, 100] {
            let config = RelayConfig {
                progress_intervals: intervals,
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "{intervals} should be valid");
        }
        for intervals in [0, 3, 7, 30, 200] {
            let config = RelayConfig {
                progress_intervals: intervals,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{intervals} should be invalid");
        }
    }

    #[test]
    fn test_validate_limits() {
        let config = RelayConfig {
            max_batch_entries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            max_message_length: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            username: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
