// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory collaborators for pipeline tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log_reingest::{
    codec,
    sinks::FallbackSink,
    sources::{ObjectLocation, SourceReader},
    transport::{DeliveryOutcome, DeliveryRecord, StreamTransport},
    ReingestError,
};

/// Transport replaying queued outcomes, accepting everything once they run out
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<DeliveryOutcome>>,
    calls: Mutex<Vec<(String, Vec<DeliveryRecord>)>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn accepting() -> Arc<Self> {
        Arc::new(ScriptedTransport::default())
    }

    pub fn with_outcomes(outcomes: Vec<DeliveryOutcome>) -> Arc<Self> {
        Arc::new(ScriptedTransport {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, Vec<DeliveryRecord>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Every record of every call, in submission order
    pub fn submitted(&self) -> Vec<DeliveryRecord> {
        self.calls()
            .into_iter()
            .flat_map(|(_, records)| records)
            .collect()
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn submit_batch(&self, destination: &str, records: &[DeliveryRecord]) -> DeliveryOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((destination.to_string(), records.to_vec()));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DeliveryOutcome::Accepted)
    }
}

/// Source holding stored objects in memory
#[allow(dead_code)]
#[derive(Default)]
pub struct MemorySource {
    objects: HashMap<(String, String), Vec<u8>>,
}

#[allow(dead_code)]
impl MemorySource {
    /// Stores `body` gzip-compressed, the way failed-delivery objects are kept
    pub fn with_object(location: &ObjectLocation, body: impl Into<Vec<u8>>) -> Arc<Self> {
        let compressed = codec::gzip(&body.into()).expect("gzip failed");
        Self::with_raw_object(location, compressed)
    }

    /// Stores `bytes` as they are
    pub fn with_raw_object(location: &ObjectLocation, bytes: impl Into<Vec<u8>>) -> Arc<Self> {
        let mut objects = HashMap::new();
        objects.insert(
            (location.bucket.clone(), location.key.clone()),
            bytes.into(),
        );
        Arc::new(MemorySource { objects })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(MemorySource::default())
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn read_raw(&self, location: &ObjectLocation) -> Result<Vec<u8>, ReingestError> {
        self.objects
            .get(&(location.bucket.clone(), location.key.clone()))
            .cloned()
            .ok_or_else(|| {
                ReingestError::Source(format!("no such object {}/{}", location.bucket, location.key))
            })
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackWrite {
    pub origin: String,
    pub object_key: String,
    pub payload: String,
}

/// Sink recording every write
#[allow(dead_code)]
#[derive(Default)]
pub struct MemorySink {
    writes: Mutex<Vec<FallbackWrite>>,
}

#[allow(dead_code)]
impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(MemorySink::default())
    }

    pub fn writes(&self) -> Vec<FallbackWrite> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl FallbackSink for MemorySink {
    async fn write(
        &self,
        origin: &str,
        object_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), ReingestError> {
        self.writes.lock().unwrap().push(FallbackWrite {
            origin: origin.to_string(),
            object_key: object_key.to_string(),
            payload: String::from_utf8(payload).unwrap(),
        });
        Ok(())
    }
}
