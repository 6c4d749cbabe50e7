// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::warn;

use crate::constants::{
    DEFAULT_FALLBACK_PREFIX, DEFAULT_FLUSH_THRESHOLD, DEFAULT_LOG_LEVEL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_BATCH_LENGTH, DEFAULT_MAX_REINGEST, MAX_RECORDS_PER_CALL, MAX_REQUEST_BYTES,
    MAX_RETURN_BYTES,
};
use crate::error::ReingestError;
use crate::retrier::RetryStrategy;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Settings of a re-ingestion run. Built once, shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Stream recycled events are delivered to.
    pub delivery_stream: String,
    /// Highest `reingest` value still recycled. Anything above is diverted.
    pub max_reingest: u64,
    pub retry_strategy: RetryStrategy,
    /// Buffered records that trigger a mid-run flush.
    pub flush_threshold: usize,
    pub max_records_per_call: usize,
    pub max_request_bytes: usize,
    /// Prefix of the object key diverted events are written under.
    pub fallback_prefix: String,
    pub log_level: String,
}

impl PipelineConfig {
    #[must_use]
    pub fn new(delivery_stream: impl Into<String>) -> Self {
        PipelineConfig {
            delivery_stream: delivery_stream.into(),
            max_reingest: DEFAULT_MAX_REINGEST,
            retry_strategy: RetryStrategy::default(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            max_records_per_call: MAX_RECORDS_PER_CALL,
            max_request_bytes: MAX_REQUEST_BYTES,
            fallback_prefix: DEFAULT_FALLBACK_PREFIX.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ReingestError> {
        let delivery_stream = required_env("REINGEST_DELIVERY_STREAM")?;
        let max_attempts = parse_env("REINGEST_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS);
        let retry_strategy = match env::var("REINGEST_RETRY_BACKOFF_MS") {
            Ok(_) => RetryStrategy::LinearBackoff(
                max_attempts,
                parse_env("REINGEST_RETRY_BACKOFF_MS", 0),
            ),
            Err(_) => RetryStrategy::Immediate(max_attempts),
        };

        let config = PipelineConfig {
            delivery_stream,
            max_reingest: parse_env("REINGEST_MAX_INGEST", DEFAULT_MAX_REINGEST),
            retry_strategy,
            flush_threshold: parse_env("REINGEST_FLUSH_THRESHOLD", DEFAULT_FLUSH_THRESHOLD),
            max_records_per_call: parse_env("REINGEST_MAX_RECORDS_PER_CALL", MAX_RECORDS_PER_CALL),
            max_request_bytes: parse_env("REINGEST_MAX_REQUEST_BYTES", MAX_REQUEST_BYTES),
            fallback_prefix: env::var("REINGEST_FALLBACK_PREFIX")
                .unwrap_or_else(|_| DEFAULT_FALLBACK_PREFIX.to_string()),
            log_level: env::var("REINGEST_LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReingestError> {
        if self.delivery_stream.trim().is_empty() {
            return Err(ReingestError::Config(
                "REINGEST_DELIVERY_STREAM cannot be empty".to_string(),
            ));
        }
        if self.flush_threshold == 0 {
            return Err(ReingestError::Config(
                "flush threshold must be greater than 0".to_string(),
            ));
        }
        if self.max_records_per_call == 0 || self.max_request_bytes == 0 {
            return Err(ReingestError::Config(
                "per-call record and byte limits must be greater than 0".to_string(),
            ));
        }
        if self.fallback_prefix.trim_matches('/').is_empty() {
            return Err(ReingestError::Config(
                "fallback prefix cannot be empty".to_string(),
            ));
        }
        validate_attempts(&self.retry_strategy)?;
        validate_log_level(&self.log_level)
    }

    /// Object key diverted events from `invocation_key` are written under.
    #[must_use]
    pub fn fallback_key(&self, invocation_key: &str) -> String {
        format!("{}/{invocation_key}", self.fallback_prefix.trim_end_matches('/'))
    }
}

/// Settings of the inline transformation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    pub host: String,
    pub index: String,
    pub source: String,
    pub sourcetype: String,
    /// Key of the event field copied into the envelope's `time`.
    pub timestamp_key: String,
    pub max_return_bytes: usize,
    pub max_batch_length: usize,
    pub retry_strategy: RetryStrategy,
}

impl TransformConfig {
    pub fn from_env() -> Result<Self, ReingestError> {
        let config = TransformConfig {
            host: required_env("SPLUNK_HOST")?,
            index: required_env("SPLUNK_INDEX")?,
            source: required_env("SPLUNK_SOURCE")?,
            sourcetype: required_env("SPLUNK_SOURCETYPE")?,
            timestamp_key: required_env("TIMESTAMP_KEY")?,
            max_return_bytes: parse_env("REINGEST_MAX_RETURN_BYTES", MAX_RETURN_BYTES),
            max_batch_length: parse_env("REINGEST_MAX_BATCH_LENGTH", DEFAULT_MAX_BATCH_LENGTH),
            retry_strategy: RetryStrategy::Immediate(parse_env(
                "REINGEST_MAX_ATTEMPTS",
                DEFAULT_MAX_ATTEMPTS,
            )),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReingestError> {
        if self.timestamp_key.is_empty() {
            return Err(ReingestError::Config(
                "TIMESTAMP_KEY cannot be empty".to_string(),
            ));
        }
        if self.max_return_bytes == 0 || self.max_batch_length == 0 {
            return Err(ReingestError::Config(
                "return size and batch length must be greater than 0".to_string(),
            ));
        }
        validate_attempts(&self.retry_strategy)
    }
}

/// Settings of the forwarding stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardConfig {
    /// Stream whole objects are forwarded to.
    pub delivery_stream: String,
    pub retry_strategy: RetryStrategy,
}

impl ForwardConfig {
    #[must_use]
    pub fn new(delivery_stream: impl Into<String>) -> Self {
        ForwardConfig {
            delivery_stream: delivery_stream.into(),
            retry_strategy: RetryStrategy::default(),
        }
    }

    pub fn from_env() -> Result<Self, ReingestError> {
        let config = ForwardConfig {
            delivery_stream: required_env("REINGEST_FORWARD_STREAM")?,
            retry_strategy: RetryStrategy::Immediate(parse_env(
                "REINGEST_MAX_ATTEMPTS",
                DEFAULT_MAX_ATTEMPTS,
            )),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReingestError> {
        if self.delivery_stream.trim().is_empty() {
            return Err(ReingestError::Config(
                "REINGEST_FORWARD_STREAM cannot be empty".to_string(),
            ));
        }
        validate_attempts(&self.retry_strategy)
    }
}

fn validate_attempts(strategy: &RetryStrategy) -> Result<(), ReingestError> {
    let attempts = match strategy {
        RetryStrategy::Immediate(attempts) | RetryStrategy::LinearBackoff(attempts, _) => {
            *attempts
        }
    };
    if attempts == 0 {
        return Err(ReingestError::Config(
            "max attempts must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_log_level(level: &str) -> Result<(), ReingestError> {
    if !VALID_LOG_LEVELS.contains(&level) {
        return Err(ReingestError::Config(format!(
            "Invalid log level '{level}'. Must be one of: {}",
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}

fn required_env(name: &str) -> Result<String, ReingestError> {
    env::var(name).map_err(|_| ReingestError::Config(format!("{name} environment variable not set")))
}

/// Reads `name`, falling back to `default` when unset or unparsable.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("{name} has invalid value '{value}'. Defaulted to {default}.");
            default
        }),
        Err(_) => default,
    }
}
