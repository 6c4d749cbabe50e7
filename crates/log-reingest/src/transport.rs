// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery stream transport.
//!
//! [`StreamTransport`] is the seam the retrier submits through. A transport
//! never fails outright: connection problems are reported as
//! [`DeliveryOutcome::TransportError`] and handled by the retry path.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::batcher::BatchItem;
use crate::codec;
use crate::error::ReingestError;

/// One compressed record submitted to the delivery stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub data: Vec<u8>,
}

impl DeliveryRecord {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        DeliveryRecord { data }
    }
}

impl BatchItem for DeliveryRecord {
    fn encoded_len(&self) -> usize {
        self.data.len()
    }
}

/// A rejected entry, identified by its position in the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub index: usize,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Accepted,
    PartiallyFailed(Vec<FailedRecord>),
    TransportError(String),
}

#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn submit_batch(&self, destination: &str, records: &[DeliveryRecord])
        -> DeliveryOutcome;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRecordBatchRequest {
    pub delivery_stream_name: String,
    pub records: Vec<WireRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireRecord {
    /// Base64 of the record bytes.
    pub data: String,
}

impl PutRecordBatchRequest {
    #[must_use]
    pub fn new(destination: &str, records: &[DeliveryRecord]) -> Self {
        PutRecordBatchRequest {
            delivery_stream_name: destination.to_string(),
            records: records
                .iter()
                .map(|record| WireRecord {
                    data: codec::encode_base64(&record.data),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRecordBatchResponse {
    #[serde(default)]
    pub failed_put_count: u64,
    #[serde(default)]
    pub request_responses: Vec<RecordResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordResponse {
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RecordResponse {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error_code.is_some() || self.error_message.is_some()
    }
}

impl PutRecordBatchResponse {
    /// Maps per-entry responses back onto the submitted positions.
    #[must_use]
    pub fn into_outcome(self) -> DeliveryOutcome {
        if self.failed_put_count == 0 {
            return DeliveryOutcome::Accepted;
        }
        let failed: Vec<FailedRecord> = self
            .request_responses
            .into_iter()
            .enumerate()
            .filter(|(_, response)| response.is_failed())
            .map(|(index, response)| FailedRecord {
                index,
                error_code: response.error_code,
            })
            .collect();
        if failed.is_empty() {
            DeliveryOutcome::Accepted
        } else {
            DeliveryOutcome::PartiallyFailed(failed)
        }
    }
}

/// Transport posting `PutRecordBatch` JSON documents to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ReingestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReingestError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpTransport {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn submit_batch(
        &self,
        destination: &str,
        records: &[DeliveryRecord],
    ) -> DeliveryOutcome {
        let request = PutRecordBatchRequest::new(destination, records);
        debug!(
            "REINGEST | Posting {} records for {destination} to {}",
            records.len(),
            self.endpoint
        );
        let resp = match self.client.post(&self.endpoint).json(&request).send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!("REINGEST | Failed to reach delivery endpoint: {e}");
                return DeliveryOutcome::TransportError(e.to_string());
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("REINGEST | {status}: Delivery endpoint rejected the batch: {body}");
            return DeliveryOutcome::TransportError(format!("{status}: {body}"));
        }

        match resp.json::<PutRecordBatchResponse>().await {
            Ok(response) => response.into_outcome(),
            Err(e) => DeliveryOutcome::TransportError(format!("invalid delivery response: {e}")),
        }
    }
}
