//! Collector and practice configuration, validated at construction.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_DRILL_SECONDS: u64 = 60;
pub const DEFAULT_TARGET_RATE: f64 = 20.0;

const BATCH_SIZE_VAR: &str = "LEARN_TELEMETRY_BATCH_SIZE";
const FLUSH_MS_VAR: &str = "LEARN_TELEMETRY_FLUSH_MS";
const ENDPOINT_VAR: &str = "LEARN_TELEMETRY_ENDPOINT";
const TOKEN_VAR: &str = "LEARN_TELEMETRY_TOKEN";
const DRILL_SECONDS_VAR: &str = "LEARN_DRILL_SECONDS";
const TARGET_RATE_VAR: &str = "LEARN_TARGET_RATE";

//
// ─── TELEMETRY ─────────────────────────────────────────────────────────────────
//

/// Batching policy and delivery target for the telemetry collector.
///
/// Immutable after construction; deserialized values go through the same
/// validation as [`TelemetryConfig::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TelemetryConfigFile", rename_all = "camelCase")]
pub struct TelemetryConfig {
    batch_size: usize,
    flush_interval_ms: u64,
    endpoint: Option<String>,
    token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryConfigFile {
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    flush_interval_ms: u64,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

impl TryFrom<TelemetryConfigFile> for TelemetryConfig {
    type Error = ConfigError;

    fn try_from(file: TelemetryConfigFile) -> Result<Self, Self::Error> {
        let config = Self::new(file.batch_size, Duration::from_millis(file.flush_interval_ms))?;
        Ok(config.with_endpoint(file.endpoint, file.token))
    }
}

impl TelemetryConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::ZeroBatchSize` or `ConfigError::ZeroFlushInterval`.
    pub fn new(batch_size: usize, flush_interval: Duration) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        let flush_interval_ms = u64::try_from(flush_interval.as_millis()).unwrap_or(u64::MAX);
        if flush_interval_ms == 0 {
            return Err(ConfigError::ZeroFlushInterval);
        }
        Ok(Self {
            batch_size,
            flush_interval_ms,
            endpoint: None,
            token: None,
        })
    }

    /// Set the ingestion endpoint; blank values are treated as unset.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Option<String>, token: Option<String>) -> Self {
        self.endpoint = endpoint.filter(|e| !e.trim().is_empty());
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Read `LEARN_TELEMETRY_*` variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but unparsable or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`TelemetryConfig::from_env`] with an injectable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a value is unparsable or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let batch_size = parse_var(&lookup, BATCH_SIZE_VAR)?.unwrap_or(DEFAULT_BATCH_SIZE);
        let flush_ms = parse_var(&lookup, FLUSH_MS_VAR)?.unwrap_or(DEFAULT_FLUSH_INTERVAL_MS);
        let config = Self::new(batch_size, Duration::from_millis(flush_ms))?;
        Ok(config.with_endpoint(lookup(ENDPOINT_VAR), lookup(TOKEN_VAR)))
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            endpoint: None,
            token: None,
        }
    }
}

//
// ─── PRACTICE ──────────────────────────────────────────────────────────────────
//

/// Speed drill length and target answer rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PracticeConfigFile", rename_all = "camelCase")]
pub struct PracticeConfig {
    session_duration_secs: u64,
    target_rate: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PracticeConfigFile {
    session_duration_secs: u64,
    target_rate: f64,
}

impl TryFrom<PracticeConfigFile> for PracticeConfig {
    type Error = ConfigError;

    fn try_from(file: PracticeConfigFile) -> Result<Self, Self::Error> {
        Self::new(Duration::from_secs(file.session_duration_secs), file.target_rate)
    }
}

impl PracticeConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::ZeroSessionDuration` for a zero duration and
    /// `ConfigError::InvalidTargetRate` unless the rate is finite and positive.
    pub fn new(session_duration: Duration, target_rate: f64) -> Result<Self, ConfigError> {
        let session_duration_secs = session_duration.as_secs();
        if session_duration_secs == 0 {
            return Err(ConfigError::ZeroSessionDuration);
        }
        if !target_rate.is_finite() || target_rate <= 0.0 {
            return Err(ConfigError::InvalidTargetRate(target_rate));
        }
        Ok(Self {
            session_duration_secs,
            target_rate,
        })
    }

    /// Read `LEARN_DRILL_SECONDS` and `LEARN_TARGET_RATE`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but unparsable or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when a value is unparsable or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let seconds = parse_var(&lookup, DRILL_SECONDS_VAR)?.unwrap_or(DEFAULT_DRILL_SECONDS);
        let rate = parse_var(&lookup, TARGET_RATE_VAR)?.unwrap_or(DEFAULT_TARGET_RATE);
        Self::new(Duration::from_secs(seconds), rate)
    }

    #[must_use]
    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs)
    }

    /// Session length as a calendar duration for timestamp arithmetic.
    #[must_use]
    pub fn session_length(&self) -> chrono::Duration {
        i64::try_from(self.session_duration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    #[must_use]
    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: DEFAULT_DRILL_SECONDS,
            target_rate: DEFAULT_TARGET_RATE,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Env { var, value: raw })
}
