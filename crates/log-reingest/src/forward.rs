// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwarding of a stored object into the delivery stream.
//!
//! The object is sent as it is stored, as a single record. Nothing is
//! decompressed or parsed on the way.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ForwardConfig;
use crate::error::ReingestError;
use crate::retrier::Retrier;
use crate::sources::{ObjectLocation, SourceReader};
use crate::transport::{DeliveryRecord, StreamTransport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForwardSummary {
    pub bytes: usize,
    /// Transport calls made, zero when there was nothing to send.
    pub attempts: u32,
}

pub struct ForwardStage {
    config: Arc<ForwardConfig>,
    source: Arc<dyn SourceReader + Send + Sync>,
    retrier: Retrier,
}

impl ForwardStage {
    pub fn new(
        config: Arc<ForwardConfig>,
        transport: Arc<dyn StreamTransport + Send + Sync>,
        source: Arc<dyn SourceReader + Send + Sync>,
    ) -> Result<Self, ReingestError> {
        config.validate()?;
        Ok(ForwardStage {
            retrier: Retrier::new(transport, config.retry_strategy),
            config,
            source,
        })
    }

    pub async fn forward(
        &self,
        location: &ObjectLocation,
    ) -> Result<ForwardSummary, ReingestError> {
        let object = self.source.read_raw(location).await?;
        if object.is_empty() {
            warn!(
                "FORWARD | s3://{}/{} is empty, nothing to forward",
                location.bucket, location.key
            );
            return Ok(ForwardSummary::default());
        }

        let bytes = object.len();
        let attempts = self
            .retrier
            .deliver(&self.config.delivery_stream, vec![DeliveryRecord::new(object)])
            .await?;
        info!(
            "FORWARD | Forwarded {bytes} bytes of s3://{}/{} to {}",
            location.bucket, location.key, self.config.delivery_stream
        );
        Ok(ForwardSummary { bytes, attempts })
    }
}
