// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::error::ReingestError;
use crate::sources::resolve;

/// Durable storage for diverted events.
#[async_trait]
pub trait FallbackSink: Send + Sync {
    async fn write(
        &self,
        origin: &str,
        object_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), ReingestError>;
}

/// Writes fallback payloads to `<root>/<origin>/<object_key>`.
#[derive(Debug, Clone)]
pub struct FsFallbackSink {
    root: PathBuf,
}

impl FsFallbackSink {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsFallbackSink { root: root.into() }
    }
}

#[async_trait]
impl FallbackSink for FsFallbackSink {
    async fn write(
        &self,
        origin: &str,
        object_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), ReingestError> {
        let path = resolve(&self.root, origin, object_key).map_err(ReingestError::Fallback)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = payload.len();
        tokio::fs::write(&path, payload)
            .await
            .map_err(|e| ReingestError::Fallback(format!("{}: {e}", path.display())))?;
        info!("REINGEST | Wrote {size} bytes of diverted events to {}", path.display());
        Ok(())
    }
}
