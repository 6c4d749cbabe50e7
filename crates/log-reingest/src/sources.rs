// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::codec;
use crate::error::ReingestError;

/// Where a failed-delivery object lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        ObjectLocation {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Returns the object exactly as stored.
    async fn read_raw(&self, location: &ObjectLocation) -> Result<Vec<u8>, ReingestError>;

    /// Returns the decompressed body of a gzip object.
    async fn read(&self, location: &ObjectLocation) -> Result<Vec<u8>, ReingestError> {
        codec::gunzip(&self.read_raw(location).await?)
    }
}

/// Reads gzip objects from `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsSourceReader {
    root: PathBuf,
}

impl FsSourceReader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsSourceReader { root: root.into() }
    }
}

#[async_trait]
impl SourceReader for FsSourceReader {
    async fn read_raw(&self, location: &ObjectLocation) -> Result<Vec<u8>, ReingestError> {
        let path = resolve(&self.root, &location.bucket, &location.key)
            .map_err(ReingestError::Source)?;
        debug!("Reading source object {}", path.display());
        tokio::fs::read(&path)
            .await
            .map_err(|e| ReingestError::Source(format!("{}: {e}", path.display())))
    }
}

/// Joins `bucket` and `key` under `root`, refusing anything that escapes it.
pub(crate) fn resolve(root: &Path, bucket: &str, key: &str) -> Result<PathBuf, String> {
    let relative = Path::new(bucket).join(key);
    let escapes = relative.components().any(|component| {
        !matches!(component, Component::Normal(_) | Component::CurDir)
    });
    if bucket.is_empty() || key.is_empty() || escapes {
        return Err(format!("refusing to resolve '{bucket}/{key}'"));
    }
    Ok(root.join(relative))
}
