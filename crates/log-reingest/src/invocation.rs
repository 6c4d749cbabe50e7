// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Invocation envelopes: the object-created notification that starts a
//! re-ingestion run, and the request/response pair of the stream's inline
//! transformation hook.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::codec::RawRecord;
use crate::error::ReingestError;
use crate::sources::ObjectLocation;

#[derive(Debug, Clone, Deserialize)]
pub struct S3Notification {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3NotificationRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3NotificationRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    pub key: String,
}

impl S3Notification {
    /// Location of the object named by the first notification record.
    ///
    /// Keys arrive form-encoded: `+` stands for a space and the rest is
    /// percent-encoded.
    pub fn object_location(&self) -> Result<ObjectLocation, ReingestError> {
        let first = self
            .records
            .first()
            .ok_or_else(|| ReingestError::Decode("notification has no records".to_string()))?;
        let key = unquote_plus(&first.s3.object.key)?;
        Ok(ObjectLocation::new(first.s3.bucket.name.clone(), key))
    }
}

fn unquote_plus(value: &str) -> Result<String, ReingestError> {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ReingestError::Decode(format!("invalid object key '{value}': {e}")))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirehoseTransformationEvent {
    pub delivery_stream_arn: String,
    #[serde(default)]
    pub records: Vec<FirehoseRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirehoseRecord {
    pub record_id: String,
    /// Base64 of a gzip-compressed newline-delimited JSON body.
    pub data: String,
}

impl From<FirehoseRecord> for RawRecord {
    fn from(record: FirehoseRecord) -> Self {
        RawRecord {
            record_id: record.record_id,
            data: record.data.into_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordResult {
    Ok,
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedRecord {
    pub record_id: String,
    pub result: RecordResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirehoseTransformationResponse {
    pub records: Vec<TransformedRecord>,
}

/// Region and stream name of a delivery stream ARN, e.g.
/// `arn:aws:firehose:eu-west-2:123456789012:deliverystream/my-stream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryStreamArn {
    pub region: String,
    pub stream_name: String,
}

impl DeliveryStreamArn {
    pub fn parse(arn: &str) -> Result<Self, ReingestError> {
        let region = capture(r":(\w+-\w+-\w+):", arn)?;
        let stream_name = capture(r"/(.+)$", arn)?;
        Ok(DeliveryStreamArn {
            region,
            stream_name,
        })
    }
}

fn capture(pattern: &str, arn: &str) -> Result<String, ReingestError> {
    let regex = Regex::new(pattern)
        .map_err(|e| ReingestError::Config(format!("invalid ARN pattern {pattern}: {e}")))?;
    regex
        .captures(arn)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ReingestError::Config(format!("malformed delivery stream ARN: {arn}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_location_from_notification() {
        let notification: S3Notification = serde_json::from_value(json!({
            "Records": [
                {"s3": {"bucket": {"name": "bucket-A"}, "object": {"key": "failed/some+file%3D1.gz"}}},
                {"s3": {"bucket": {"name": "ignored"}, "object": {"key": "ignored"}}}
            ]
        }))
        .unwrap();
        assert_eq!(
            notification.object_location().unwrap(),
            ObjectLocation::new("bucket-A", "failed/some file=1.gz")
        );
    }

    #[test]
    fn test_notification_without_records() {
        let notification: S3Notification = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            notification.object_location(),
            Err(ReingestError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_delivery_stream_arn() {
        let arn = DeliveryStreamArn::parse(
            "arn:aws:firehose:eu-west-2:123456789012:deliverystream/splunk-stream",
        )
        .unwrap();
        assert_eq!(arn.region, "eu-west-2");
        assert_eq!(arn.stream_name, "splunk-stream");
    }

    #[test]
    fn test_malformed_arn_is_config_error() {
        assert!(matches!(
            DeliveryStreamArn::parse("not-an-arn"),
            Err(ReingestError::Config(_))
        ));
    }

    #[test]
    fn test_transformation_event_shape() {
        let event: FirehoseTransformationEvent = serde_json::from_value(json!({
            "invocationId": "inv-1",
            "deliveryStreamArn": "arn:aws:firehose:eu-west-2:1:deliverystream/s",
            "region": "eu-west-2",
            "records": [{"recordId": "r1", "approximateArrivalTimestamp": 1, "data": "H4sI"}]
        }))
        .unwrap();
        let raw: RawRecord = event.records[0].clone().into();
        assert_eq!(raw.record_id, "r1");
        assert_eq!(raw.data, b"H4sI");
    }

    #[test]
    fn test_dropped_record_has_no_data() {
        let response = FirehoseTransformationResponse {
            records: vec![
                TransformedRecord {
                    record_id: "r1".to_string(),
                    result: RecordResult::Ok,
                    data: Some("e30=".to_string()),
                },
                TransformedRecord {
                    record_id: "r2".to_string(),
                    result: RecordResult::Dropped,
                    data: None,
                },
            ],
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"records": [
                {"recordId": "r1", "result": "Ok", "data": "e30="},
                {"recordId": "r2", "result": "Dropped"}
            ]})
        );
    }
}
