//! Application configuration with sensible defaults.
//!
//! All operational parameters are centralized here. Every value has a
//! documented default and can be overridden through the environment:
//!
//! | Variable                       | Field                     | Default |
//! |--------------------------------|---------------------------|---------|
//! | `RATE_LIMIT_PER_MIN`           | `rate_limit_count`        | 60      |
//! | `RATE_LIMIT_WINDOW`            | `rate_limit_window`       | 60s     |
//! | `RATE_LIMIT_IDLE_TTL`          | `rate_limit_idle_ttl`     | 10m     |
//! | `RATE_LIMIT_MAX_CLIENTS`       | `rate_limit_max_clients`  | 100000  |
//! | `NOTIFICATION_BUFFER`          | `notification_buffer`     | 100     |
//! | `NOTIFICATION_ENQUEUE_TIMEOUT` | `enqueue_timeout`         | 5s      |
//! | `CLEANUP_INTERVAL`             | `cleanup_interval`        | 1h      |
//! | `NOTIFICATION_MAX_AGE`         | `notification_max_age`    | 7d      |
//!
//! Durations accept a bare number of seconds or a number followed by one
//! of `ms`, `s`, `m`, `h`, `d`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, SocialnetError};

const ENV_RATE_LIMIT_COUNT: &str = "RATE_LIMIT_PER_MIN";
const ENV_RATE_LIMIT_WINDOW: &str = "RATE_LIMIT_WINDOW";
const ENV_RATE_LIMIT_IDLE_TTL: &str = "RATE_LIMIT_IDLE_TTL";
const ENV_RATE_LIMIT_MAX_CLIENTS: &str = "RATE_LIMIT_MAX_CLIENTS";
const ENV_NOTIFICATION_BUFFER: &str = "NOTIFICATION_BUFFER";
const ENV_ENQUEUE_TIMEOUT: &str = "NOTIFICATION_ENQUEUE_TIMEOUT";
const ENV_CLEANUP_INTERVAL: &str = "CLEANUP_INTERVAL";
const ENV_NOTIFICATION_MAX_AGE: &str = "NOTIFICATION_MAX_AGE";

/// Global application configuration.
///
/// Durations are serialized as seconds so a JSON config file stays
/// readable (`"rate_limit_window": 60`). Sub-second values use a
/// fractional number (`0.5`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Maximum admitted actions per client within one window.
    pub rate_limit_count: u32,

    /// Length of the sliding admission window.
    #[serde(with = "duration_secs")]
    pub rate_limit_window: Duration,

    /// A client with no admitted action for this long is dropped from the
    /// admission table. Must be at least `rate_limit_window`.
    #[serde(with = "duration_secs")]
    pub rate_limit_idle_ttl: Duration,

    /// Upper bound on tracked clients. The least recently seen client is
    /// evicted when a new one would exceed it.
    pub rate_limit_max_clients: usize,

    /// Capacity of the notification queue.
    pub notification_buffer: usize,

    /// Default deadline for an enqueue that finds the queue full.
    #[serde(with = "duration_secs")]
    pub enqueue_timeout: Duration,

    /// Interval between retention sweeps.
    #[serde(with = "duration_secs")]
    pub cleanup_interval: Duration,

    /// Read notifications older than this are deleted by the sweep.
    #[serde(with = "duration_secs")]
    pub notification_max_age: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limit_count: 60,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_idle_ttl: Duration::from_secs(10 * 60),
            rate_limit_max_clients: 100_000,
            notification_buffer: 100,
            enqueue_timeout: Duration::from_secs(5),
            cleanup_interval: Duration::from_secs(60 * 60),
            notification_max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment, then validated.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` (keyed by variable name) and
    /// validates the result.
    ///
    /// Empty values are treated as unset. Unparsable values are an error
    /// rather than a silent fallback to the default.
    pub fn with_overrides<F>(self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = self.merge_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup` without validating, for callers
    /// that layer more settings on top before calling
    /// [`validate`](Self::validate).
    pub fn merge_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_RATE_LIMIT_COUNT) {
            self.rate_limit_count = parse_number(ENV_RATE_LIMIT_COUNT, &v)?;
        }
        if let Some(v) = get(ENV_RATE_LIMIT_WINDOW) {
            self.rate_limit_window = parse_duration(ENV_RATE_LIMIT_WINDOW, &v)?;
        }
        if let Some(v) = get(ENV_RATE_LIMIT_IDLE_TTL) {
            self.rate_limit_idle_ttl = parse_duration(ENV_RATE_LIMIT_IDLE_TTL, &v)?;
        }
        if let Some(v) = get(ENV_RATE_LIMIT_MAX_CLIENTS) {
            self.rate_limit_max_clients = parse_number(ENV_RATE_LIMIT_MAX_CLIENTS, &v)?;
        }
        if let Some(v) = get(ENV_NOTIFICATION_BUFFER) {
            self.notification_buffer = parse_number(ENV_NOTIFICATION_BUFFER, &v)?;
        }
        if let Some(v) = get(ENV_ENQUEUE_TIMEOUT) {
            self.enqueue_timeout = parse_duration(ENV_ENQUEUE_TIMEOUT, &v)?;
        }
        if let Some(v) = get(ENV_CLEANUP_INTERVAL) {
            self.cleanup_interval = parse_duration(ENV_CLEANUP_INTERVAL, &v)?;
        }
        if let Some(v) = get(ENV_NOTIFICATION_MAX_AGE) {
            self.notification_max_age = parse_duration(ENV_NOTIFICATION_MAX_AGE, &v)?;
        }

        Ok(self)
    }

    /// Validates all configuration values.
    ///
    /// Returns an error if any value is outside its acceptable range.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_count == 0 {
            return Err(config_error("rate_limit_count must be greater than 0"));
        }

        if self.rate_limit_window.is_zero() {
            return Err(config_error("rate_limit_window must be greater than 0"));
        }

        if self.rate_limit_idle_ttl < self.rate_limit_window {
            return Err(config_error(
                "rate_limit_idle_ttl must be at least rate_limit_window",
            ));
        }

        if self.rate_limit_max_clients == 0 {
            return Err(config_error("rate_limit_max_clients must be greater than 0"));
        }

        if self.notification_buffer == 0 {
            return Err(config_error("notification_buffer must be greater than 0"));
        }

        if self.cleanup_interval.is_zero() {
            return Err(config_error("cleanup_interval must be greater than 0"));
        }

        if self.notification_max_age.is_zero() {
            return Err(config_error("notification_max_age must be greater than 0"));
        }

        Ok(())
    }
}

fn config_error(reason: &str) -> SocialnetError {
    SocialnetError::ConfigError {
        reason: reason.into(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SocialnetError::ConfigError {
            reason: format!("{key}: expected a non-negative integer, got {value:?}"),
        })
}

/// Parses `"90"`, `"250ms"`, `"30s"`, `"5m"`, `"1h"` or `"7d"`.
pub fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let invalid = || SocialnetError::ConfigError {
        reason: format!("{key}: invalid duration {value:?}"),
    };

    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let secs_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(amount)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    amount
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

mod duration_secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Secs {
        Whole(u64),
        Fractional(f64),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if value.subsec_nanos() == 0 {
            serializer.serialize_u64(value.as_secs())
        } else {
            serializer.serialize_f64(value.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Secs::deserialize(deserializer)? {
            Secs::Whole(secs) => Ok(Duration::from_secs(secs)),
            Secs::Fractional(secs) => Duration::try_from_secs_f64(secs).map_err(D::Error::custom),
        }
    }
}
