// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Record envelope encoding.
//!
//! Records travel gzip-compressed, and both the transformation hook and the
//! failed-delivery objects wrap them in base64. Failed-delivery objects hold one
//! `{"rawData": "<base64>"}` JSON line per record.

use std::io::{Read, Write};

use base64::Engine;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};

use crate::error::ReingestError;

/// Opaque payload plus identifier as delivered by the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub record_id: String,
    pub data: Vec<u8>,
}

impl RawRecord {
    /// Decodes a base64 gzip payload into its text body.
    pub fn decode_body(&self) -> Result<String, ReingestError> {
        let compressed = decode_base64(&self.data)?;
        let body = gunzip(&compressed)?;
        into_utf8(body)
    }
}

#[derive(Deserialize)]
struct RawDataLine {
    #[serde(rename = "rawData")]
    raw_data: String,
}

pub fn gzip(data: &[u8]) -> Result<Vec<u8>, ReingestError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn gunzip(data: &[u8]) -> Result<Vec<u8>, ReingestError> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ReingestError::Decode(format!("invalid gzip stream: {e}")))?;
    Ok(decompressed)
}

#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

pub fn decode_base64(data: impl AsRef<[u8]>) -> Result<Vec<u8>, ReingestError> {
    base64::engine::general_purpose::STANDARD
        .decode(data.as_ref())
        .map_err(|e| ReingestError::Decode(format!("invalid base64 payload: {e}")))
}

pub fn into_utf8(bytes: Vec<u8>) -> Result<String, ReingestError> {
    String::from_utf8(bytes)
        .map_err(|e| ReingestError::Decode(format!("payload is not valid UTF-8: {e}")))
}

/// Extracts the message carried by one failed-delivery line.
///
/// `line` is the 1-based position of the line in its object and is only used
/// for error reporting.
pub fn decode_raw_data_line(raw_line: &str, line: usize) -> Result<String, ReingestError> {
    let framed: RawDataLine = serde_json::from_str(raw_line)
        .map_err(|source| ReingestError::MalformedUnit { line, source })?;
    into_utf8(decode_base64(framed.raw_data)?)
}

/// Serializes a single value as JSON and compresses it into one record payload.
pub fn encode_json_record<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, ReingestError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| ReingestError::Decode(format!("failed to serialize record: {e}")))?;
    gzip(&json)
}
