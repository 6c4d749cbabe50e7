// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Defaults and delivery stream limits.
//!
//! The stream accepts at most 500 records and 4 MiB per batch call, and the
//! transformation hook may return at most 6 MB. Everything else here is a
//! default that configuration can override.

/// Source assigned to re-ingested events that do not carry one.
pub const DEFAULT_SOURCE: &str = "aws:reingested";

/// Sourcetype assigned to re-ingested events that do not carry one.
pub const DEFAULT_SOURCETYPE: &str = "aws:firehose";

/// How many times an event may be recycled before it is diverted.
pub const DEFAULT_MAX_REINGEST: u64 = 2;

/// Submission attempts for one batch call, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Buffered records that trigger a mid-invocation flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 400;

/// Maximum records accepted by a single batch call.
pub const MAX_RECORDS_PER_CALL: usize = 500;

/// Maximum aggregate record bytes accepted by a single batch call.
pub const MAX_REQUEST_BYTES: usize = 4 * 1_024 * 1_024;

/// Maximum response size of the transformation hook.
pub const MAX_RETURN_BYTES: usize = 6_000_000;

/// Events per chunk when an oversized transformed record is split.
pub const DEFAULT_MAX_BATCH_LENGTH: usize = 500;

/// Key prefix under which diverted events are written to the fallback sink.
pub const DEFAULT_FALLBACK_PREFIX: &str = "SplashbackRawFailed";

/// Log level used when none is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";
