// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::sync::Arc;

use common::mocks::{MemorySource, ScriptedTransport};
use log_reingest::{
    config::ForwardConfig,
    forward::{ForwardStage, ForwardSummary},
    invocation::S3Notification,
    retrier::RetryStrategy,
    sources::ObjectLocation,
    transport::{DeliveryOutcome, DeliveryRecord, FailedRecord},
    ReingestError,
};
use serde_json::json;

const STREAM: &str = "splunk-stream";

fn config() -> ForwardConfig {
    ForwardConfig {
        retry_strategy: RetryStrategy::Immediate(3),
        ..ForwardConfig::new(STREAM)
    }
}

fn stage(transport: &Arc<ScriptedTransport>, source: Arc<MemorySource>) -> ForwardStage {
    ForwardStage::new(Arc::new(config()), transport.clone(), source).unwrap()
}

#[tokio::test]
async fn object_is_forwarded_as_stored() {
    let notification: S3Notification = serde_json::from_value(json!({
        "Records": [{"s3": {"bucket": {"name": "audit-bucket"}, "object": {"key": "logs/2024+01.json"}}}]
    }))
    .unwrap();
    let location = notification.object_location().unwrap();
    let object = b"{\"someData\":1234}\n{\"someData\":5678}\n".to_vec();
    let source = MemorySource::with_raw_object(
        &ObjectLocation::new("audit-bucket", "logs/2024 01.json"),
        object.clone(),
    );
    let transport = ScriptedTransport::accepting();

    let summary = stage(&transport, source).forward(&location).await.unwrap();

    assert_eq!(
        summary,
        ForwardSummary {
            bytes: object.len(),
            attempts: 1,
        }
    );
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, STREAM);
    assert_eq!(calls[0].1, vec![DeliveryRecord::new(object)]);
}

#[tokio::test]
async fn compressed_object_is_not_decompressed() {
    let location = ObjectLocation::new("audit-bucket", "logs/batch.gz");
    let source = MemorySource::with_object(&location, b"{\"a\":1}\n".to_vec());
    let transport = ScriptedTransport::accepting();

    stage(&transport, source).forward(&location).await.unwrap();

    let sent = &transport.submitted()[0].data;
    assert_eq!(&sent[..2], &[0x1f, 0x8b]);
}

#[tokio::test]
async fn rejected_record_is_retried() {
    let location = ObjectLocation::new("audit-bucket", "logs/batch.json");
    let source = MemorySource::with_raw_object(&location, b"payload".to_vec());
    let transport = ScriptedTransport::with_outcomes(vec![DeliveryOutcome::PartiallyFailed(vec![
        FailedRecord {
            index: 0,
            error_code: Some("ServiceUnavailable".to_string()),
        },
    ])]);

    let summary = stage(&transport, source).forward(&location).await.unwrap();

    assert_eq!(summary.attempts, 2);
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn exhausted_delivery_is_an_error() {
    let location = ObjectLocation::new("audit-bucket", "logs/batch.json");
    let source = MemorySource::with_raw_object(&location, b"payload".to_vec());
    let failing = DeliveryOutcome::TransportError("throttled".to_string());
    let transport =
        ScriptedTransport::with_outcomes(vec![failing.clone(), failing.clone(), failing]);

    let error = stage(&transport, source)
        .forward(&location)
        .await
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "Could not put records after 3 attempts. throttled"
    );
}

#[tokio::test]
async fn empty_object_sends_nothing() {
    let location = ObjectLocation::new("audit-bucket", "logs/empty.json");
    let source = MemorySource::with_raw_object(&location, Vec::new());
    let transport = ScriptedTransport::accepting();

    let summary = stage(&transport, source).forward(&location).await.unwrap();

    assert_eq!(summary, ForwardSummary::default());
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn missing_object_is_a_source_error() {
    let transport = ScriptedTransport::accepting();

    let error = stage(&transport, MemorySource::empty())
        .forward(&ObjectLocation::new("audit-bucket", "nope"))
        .await
        .unwrap_err();

    assert!(matches!(error, ReingestError::Source(_)));
    assert!(transport.calls().is_empty());
}

#[test]
fn blank_stream_is_rejected() {
    let result = ForwardStage::new(
        Arc::new(ForwardConfig::new(" ")),
        ScriptedTransport::accepting(),
        MemorySource::empty(),
    );
    assert!(matches!(result, Err(ReingestError::Config(_))));
}
