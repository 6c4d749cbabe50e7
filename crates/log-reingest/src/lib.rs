// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Log Reingest
//!
//! Transform, batch and retry pipeline for log records that bounced off a
//! delivery stream and have to be pushed through it again.
//!
//! ## Overview
//!
//! Three stages share the same building blocks:
//! - **Re-ingestion**: failed-delivery objects are read back, every event is
//!   re-tagged with a re-ingestion counter and either recycled into the
//!   stream or, once the counter passes the configured ceiling, diverted to a
//!   fallback sink so it cannot loop forever.
//! - **Transformation**: the stream's inline transformation hook wraps raw
//!   events in an intake envelope and re-ingests whatever would not fit in
//!   the hook's response.
//! - **Forwarding**: a stored object is pushed into the stream unchanged, as
//!   one record.
//!
//! ## Architecture
//!
//! - [`codec`]: gzip, base64 and the failed-delivery line framing
//! - [`event`]: wire model of log events and re-ingestion metadata
//! - [`transformer`]: per-unit parsing and enrichment
//! - [`guard`]: recycle-or-divert loop guard and fallback payloads
//! - [`batcher`]: count- and byte-bounded chunking
//! - [`transport`]: delivery stream client seam and the HTTP client
//! - [`retrier`]: bounded resubmission of rejected records
//! - [`pipeline`]: per-invocation orchestration of the re-ingestion stage
//! - [`transformation`]: the inline transformation stage
//! - [`forward`]: the forwarding stage
//! - [`sources`] / [`sinks`]: collaborator seams for reading inputs and
//!   writing fallback payloads

#![deny(clippy::all)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(clippy::module_name_repetitions)]

pub mod batcher;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod forward;
pub mod guard;
pub mod invocation;
pub mod logger;
pub mod pipeline;
pub mod retrier;
pub mod sinks;
pub mod sources;
pub mod transformation;
pub mod transformer;
pub mod transport;

pub use error::ReingestError;
