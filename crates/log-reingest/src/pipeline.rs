// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Orchestration of one re-ingestion invocation.
//!
//! 1. The failed-delivery object is read back. Each of its lines frames one
//!    message body as `{"rawData": "<base64>"}`.
//! 2. Every message body is transformed unit by unit.
//! 3. Each transformed event is either recycled, gzip-compressed into its own
//!    delivery record and buffered, or diverted into the fallback payload of
//!    its origin.
//! 4. The buffer is flushed whenever it reaches the flush threshold, and once
//!    more at the end of the run.
//! 5. Diverted events are written out, one object per origin, after all
//!    streaming delivery succeeded.
//!
//! Any error aborts the invocation. Records flushed before the error stay
//! delivered, so a retried invocation may deliver them again.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::batcher::{Batcher, Framing};
use crate::codec;
use crate::config::PipelineConfig;
use crate::error::ReingestError;
use crate::event::TransformedEvent;
use crate::guard::{FallbackPayloads, RecycleDecision, ReingestionGuard};
use crate::retrier::Retrier;
use crate::sinks::FallbackSink;
use crate::sources::{ObjectLocation, SourceReader};
use crate::transformer::Transformer;
use crate::transport::{DeliveryRecord, StreamTransport};

/// What a finished invocation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvocationSummary {
    pub recycled: usize,
    pub diverted: usize,
    pub flushes: usize,
    pub fallback_writes: usize,
}

/// Accumulator threaded through a single invocation.
#[derive(Debug, Default)]
pub struct PipelineRunState {
    /// Records buffered since the last flush.
    pub stream_count: usize,
    pub record_batch: Vec<DeliveryRecord>,
    pub fallback: FallbackPayloads,
    pub sent_to_fallback: bool,
    pub summary: InvocationSummary,
}

impl PipelineRunState {
    fn buffer(&mut self, record: DeliveryRecord) {
        self.record_batch.push(record);
        self.stream_count += 1;
        self.summary.recycled += 1;
    }

    fn divert(&mut self, event: &TransformedEvent) -> Result<(), ReingestError> {
        self.fallback
            .append(&event.fields.origin_location, &event.event)?;
        self.sent_to_fallback = true;
        self.summary.diverted += 1;
        Ok(())
    }

    fn take_batch(&mut self) -> Vec<DeliveryRecord> {
        self.stream_count = 0;
        std::mem::take(&mut self.record_batch)
    }
}

pub struct ReingestPipeline {
    config: Arc<PipelineConfig>,
    source: Arc<dyn SourceReader + Send + Sync>,
    sink: Arc<dyn FallbackSink + Send + Sync>,
    retrier: Retrier,
    guard: ReingestionGuard,
    batcher: Batcher,
}

impl ReingestPipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        transport: Arc<dyn StreamTransport + Send + Sync>,
        source: Arc<dyn SourceReader + Send + Sync>,
        sink: Arc<dyn FallbackSink + Send + Sync>,
    ) -> Result<Self, ReingestError> {
        config.validate()?;
        let retrier = Retrier::new(transport, config.retry_strategy);
        let guard = ReingestionGuard::new(config.max_reingest);
        let batcher = Batcher::new(config.max_records_per_call, Some(config.max_request_bytes))
            .with_framing(Framing::NONE);
        Ok(ReingestPipeline {
            config,
            source,
            sink,
            retrier,
            guard,
            batcher,
        })
    }

    pub async fn run(&self, location: &ObjectLocation) -> Result<InvocationSummary, ReingestError> {
        info!(
            "REINGEST | Processing s3://{}/{}",
            location.bucket, location.key
        );
        let body = codec::into_utf8(self.source.read(location).await?)?;
        let transformer = Transformer::new(location.bucket.as_str());
        let mut state = PipelineRunState::default();

        for (index, line) in body.split('\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            let message = codec::decode_raw_data_line(line, index + 1)?;
            let events = transformer.transform(&message).map_err(|source| {
                ReingestError::InvalidMessage {
                    line: index + 1,
                    source: Box::new(source),
                }
            })?;
            for event in events {
                self.route(&mut state, event).await?;
            }
        }

        self.finalize(&mut state, location).await?;
        info!(
            "REINGEST | Recycled {} events, diverted {} events",
            state.summary.recycled, state.summary.diverted
        );
        Ok(state.summary)
    }

    async fn route(
        &self,
        state: &mut PipelineRunState,
        event: TransformedEvent,
    ) -> Result<(), ReingestError> {
        match self.guard.decide(&event.fields) {
            RecycleDecision::Divert => state.divert(&event)?,
            RecycleDecision::Recycle => {
                state.buffer(DeliveryRecord::new(codec::encode_json_record(&event)?));
                if state.stream_count >= self.config.flush_threshold {
                    self.flush(state).await?;
                }
            }
        }
        Ok(())
    }

    async fn flush(&self, state: &mut PipelineRunState) -> Result<(), ReingestError> {
        let records = state.take_batch();
        if records.is_empty() {
            return Ok(());
        }
        debug!("REINGEST | Flushing {} records", records.len());
        for chunk in self.batcher.batch(records) {
            self.retrier
                .deliver(&self.config.delivery_stream, chunk)
                .await?;
        }
        state.summary.flushes += 1;
        Ok(())
    }

    async fn finalize(
        &self,
        state: &mut PipelineRunState,
        location: &ObjectLocation,
    ) -> Result<(), ReingestError> {
        self.flush(state).await?;

        if !state.sent_to_fallback {
            return Ok(());
        }
        warn!("REINGEST | Events exceeded the re-ingestion limit, writing them to the fallback sink");
        let object_key = self.config.fallback_key(&location.key);
        for (origin, payload) in std::mem::take(&mut state.fallback).into_payloads() {
            info!("REINGEST | Writing diverted events to {origin} with key {object_key}");
            self.sink
                .write(&origin, &object_key, payload.into_bytes())
                .await?;
            state.summary.fallback_writes += 1;
        }
        Ok(())
    }
}
