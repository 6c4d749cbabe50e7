// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use log_reingest::{codec, invocation::FirehoseRecord, transport::DeliveryRecord};
use serde_json::Value;

/// Frames one message body the way failed-delivery objects store it
#[allow(dead_code)]
pub fn failed_delivery_line(message: &str) -> String {
    serde_json::json!({ "rawData": codec::encode_base64(message.as_bytes()) }).to_string()
}

/// Builds a decompressed failed-delivery object from message bodies
#[allow(dead_code)]
pub fn failed_delivery_object(messages: &[String]) -> Vec<u8> {
    let mut body = String::new();
    for message in messages {
        body.push_str(&failed_delivery_line(message));
        body.push('\n');
    }
    body.into_bytes()
}

/// Decompresses and parses one delivered record
#[allow(dead_code)]
pub fn decode_record(record: &DeliveryRecord) -> Value {
    let json = codec::gunzip(&record.data).expect("record is not gzip");
    serde_json::from_slice(&json).expect("record is not JSON")
}

/// Builds a transformation hook record from a newline-delimited body
#[allow(dead_code)]
pub fn firehose_record(record_id: &str, body: &str) -> FirehoseRecord {
    FirehoseRecord {
        record_id: record_id.to_string(),
        data: codec::encode_base64(&codec::gzip(body.as_bytes()).expect("gzip failed")),
    }
}
