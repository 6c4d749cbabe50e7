// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Inline transformation hook of the delivery stream.
//!
//! Raw events are wrapped in an intake envelope:
//!
//! ```json
//! {"host":"...","index":"...","source":"...","sourcetype":"...","time":<event[timestamp_key]>,"event":{...}}
//! ```
//!
//! Events that already carry a `sourcetype` went through this hook before and
//! pass unchanged. The hook's response is size limited, so records that would
//! push it past `max_return_bytes` are re-ingested into the stream instead and
//! reported back as dropped.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::batcher::{encode_json_array, BatchItem, Batcher, Framing};
use crate::codec::{self, RawRecord};
use crate::config::TransformConfig;
use crate::constants::{MAX_RECORDS_PER_CALL, MAX_REQUEST_BYTES};
use crate::error::ReingestError;
use crate::event::LogEvent;
use crate::invocation::{
    DeliveryStreamArn, FirehoseTransformationEvent, FirehoseTransformationResponse,
    RecordResult, TransformedRecord,
};
use crate::retrier::Retrier;
use crate::transport::{DeliveryRecord, StreamTransport};

#[derive(Serialize)]
struct IntakeEnvelope<'a> {
    host: &'a str,
    index: &'a str,
    source: &'a str,
    sourcetype: &'a str,
    time: Value,
    event: Value,
}

/// Wraps raw events in the intake envelope.
#[derive(Debug, Clone)]
pub struct Enricher {
    config: Arc<TransformConfig>,
}

impl Enricher {
    #[must_use]
    pub fn new(config: Arc<TransformConfig>) -> Self {
        Enricher { config }
    }

    /// Returns the serialized event for one unit, without a trailing newline.
    ///
    /// Units that already carry a `sourcetype` are returned as they came in.
    pub fn enrich_unit(&self, unit: &str, line: usize) -> Result<String, ReingestError> {
        let object = match LogEvent::parse(unit, line)? {
            event if event.sourcetype().is_some() => return Ok(unit.to_string()),
            LogEvent::Raw(object) => object,
            enriched @ LogEvent::Enriched(_) => enriched.into_object()?,
        };
        self.wrap(object)
    }

    fn wrap(&self, object: Map<String, Value>) -> Result<String, ReingestError> {
        let time = object
            .get(&self.config.timestamp_key)
            .cloned()
            .ok_or_else(|| ReingestError::MissingTimestamp {
                key: self.config.timestamp_key.clone(),
            })?;
        serde_json::to_string(&IntakeEnvelope {
            host: &self.config.host,
            index: &self.config.index,
            source: &self.config.source,
            sourcetype: &self.config.sourcetype,
            time,
            event: Value::Object(object),
        })
        .map_err(|e| ReingestError::Decode(format!("failed to serialize event: {e}")))
    }

    /// Enriches every unit of a body. Each output unit ends with a newline.
    pub fn enrich_body(&self, body: &str) -> Result<String, ReingestError> {
        let mut enriched = String::with_capacity(body.len());
        for (index, unit) in body.split('\n').enumerate() {
            if unit.trim().is_empty() {
                continue;
            }
            enriched.push_str(&self.enrich_unit(unit, index + 1)?);
            enriched.push('\n');
        }
        Ok(enriched)
    }
}

/// A record after enrichment, before it is encoded into the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRecord {
    pub record_id: String,
    pub data: String,
}

impl BatchItem for ProcessedRecord {
    /// Counts the id too, it is part of the response entry.
    fn encoded_len(&self) -> usize {
        self.data.len() + self.record_id.len()
    }
}

pub struct TransformationStage {
    config: Arc<TransformConfig>,
    enricher: Enricher,
    retrier: Retrier,
}

impl TransformationStage {
    pub fn new(
        config: Arc<TransformConfig>,
        transport: Arc<dyn StreamTransport + Send + Sync>,
    ) -> Result<Self, ReingestError> {
        config.validate()?;
        Ok(TransformationStage {
            enricher: Enricher::new(Arc::clone(&config)),
            retrier: Retrier::new(transport, config.retry_strategy),
            config,
        })
    }

    pub async fn handle(
        &self,
        event: FirehoseTransformationEvent,
    ) -> Result<FirehoseTransformationResponse, ReingestError> {
        info!("TRANSFORM | Received {} records", event.records.len());
        let arn = DeliveryStreamArn::parse(&event.delivery_stream_arn)?;

        let processed = event
            .records
            .into_iter()
            .map(|record| self.process_record(record.into()))
            .collect::<Result<Vec<_>, _>>()?;

        let (returned, overflow) = self.partition(processed);
        if !overflow.is_empty() {
            self.reingest(&arn, &overflow).await?;
        }

        info!(
            "TRANSFORM | {} records returned by handler, {} records reingested",
            returned.len(),
            overflow.len()
        );
        let records = returned
            .into_iter()
            .map(|record| TransformedRecord {
                record_id: record.record_id,
                result: RecordResult::Ok,
                data: Some(codec::encode_base64(record.data.as_bytes())),
            })
            .chain(overflow.into_iter().map(|record| TransformedRecord {
                record_id: record.record_id,
                result: RecordResult::Dropped,
                data: None,
            }))
            .collect();
        Ok(FirehoseTransformationResponse { records })
    }

    fn process_record(&self, record: RawRecord) -> Result<ProcessedRecord, ReingestError> {
        let body = record.decode_body()?;
        Ok(ProcessedRecord {
            data: self.enricher.enrich_body(&body)?,
            record_id: record.record_id,
        })
    }

    /// Splits records into the prefix that fits in the response and the rest.
    fn partition(
        &self,
        processed: Vec<ProcessedRecord>,
    ) -> (Vec<ProcessedRecord>, Vec<ProcessedRecord>) {
        let max = self.config.max_return_bytes;
        let mut chunks = Batcher::new(usize::MAX, Some(max))
            .with_framing(Framing::NONE)
            .batch(processed)
            .into_iter();

        let Some(first) = chunks.next() else {
            return (Vec::new(), Vec::new());
        };
        let first_size: usize = first.iter().map(BatchItem::encoded_len).sum();
        let overflow: Vec<ProcessedRecord> = chunks.flatten().collect();
        if first_size > max {
            let mut all = first;
            all.extend(overflow);
            return (Vec::new(), all);
        }
        (first, overflow)
    }

    async fn reingest(
        &self,
        arn: &DeliveryStreamArn,
        overflow: &[ProcessedRecord],
    ) -> Result<(), ReingestError> {
        let per_chunk = Batcher::new(self.config.max_batch_length, None);
        let mut records: Vec<DeliveryRecord> = Vec::new();
        for record in overflow {
            let units: Vec<String> = record
                .data
                .split('\n')
                .filter(|unit| !unit.is_empty())
                .map(str::to_string)
                .collect();
            for chunk in per_chunk.batch(units) {
                records.push(encode_json_array(&chunk)?);
            }
        }
        debug!(
            "TRANSFORM | Reingesting {} chunks into {} ({})",
            records.len(),
            arn.stream_name,
            arn.region
        );

        let per_call = Batcher::new(MAX_RECORDS_PER_CALL, Some(MAX_REQUEST_BYTES))
            .with_framing(Framing::NONE);
        for call in per_call.batch(records) {
            self.retrier.deliver(&arn.stream_name, call).await?;
        }
        Ok(())
    }
}
