// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire model of log events flowing through the pipeline.
//!
//! A JSON unit is classified exactly once, when it is parsed:
//!
//! - [`LogEvent::Raw`]: none of `source`, `sourcetype` or `fields` is present,
//!   the unit has never been through this pipeline.
//! - [`LogEvent::Enriched`]: at least one of them is present, the unit was
//!   produced by an earlier pass and its metadata must be carried forward.
//!
//! Re-ingested events are always re-serialized as a [`TransformedEvent`]:
//!
//! ```json
//! {"sourcetype":"aws:firehose","source":"aws:reingested","event":{...},"fields":{"reingest":1,"originLocation":"bucket-A"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ReingestError;

const METADATA_KEYS: [&str; 3] = ["source", "sourcetype", "fields"];

/// Re-ingestion counter and the location the event was first ingested from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReingestionFields {
    pub reingest: u64,
    /// Older producers wrote this as `origin_bucket_name`.
    #[serde(rename = "originLocation", alias = "origin_bucket_name")]
    pub origin_location: String,
}

impl ReingestionFields {
    /// Fields for an event entering the re-ingestion loop for the first time.
    #[must_use]
    pub fn first_ingestion(origin_location: impl Into<String>) -> Self {
        Self {
            reingest: 1,
            origin_location: origin_location.into(),
        }
    }

    /// Fields for the next recycle pass. The origin never changes.
    #[must_use]
    pub fn next_hop(&self) -> Self {
        Self {
            reingest: self.reingest.saturating_add(1),
            origin_location: self.origin_location.clone(),
        }
    }
}

/// An event carrying pipeline metadata from an earlier pass.
///
/// Keys outside the metadata set (`host`, `index`, `time`, ...) are kept in
/// `extra` so the event can be written back field-for-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<ReingestionFields>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Raw(Map<String, Value>),
    Enriched(EnrichedEvent),
}

impl LogEvent {
    /// Parses one newline-delimited JSON unit.
    ///
    /// `line` is the 1-based position of the unit in its body, reported back
    /// in [`ReingestError::MalformedUnit`].
    pub fn parse(unit: &str, line: usize) -> Result<Self, ReingestError> {
        let object: Map<String, Value> = serde_json::from_str(unit)
            .map_err(|source| ReingestError::MalformedUnit { line, source })?;
        Self::from_object(object, line)
    }

    pub fn from_object(object: Map<String, Value>, line: usize) -> Result<Self, ReingestError> {
        let has_metadata = METADATA_KEYS
            .iter()
            .any(|key| object.get(*key).is_some_and(|value| !value.is_null()));
        if !has_metadata {
            return Ok(LogEvent::Raw(object));
        }
        serde_json::from_value(Value::Object(object))
            .map(LogEvent::Enriched)
            .map_err(|source| ReingestError::MalformedUnit { line, source })
    }

    #[must_use]
    pub fn sourcetype(&self) -> Option<&str> {
        match self {
            LogEvent::Raw(_) => None,
            LogEvent::Enriched(enriched) => enriched.sourcetype.as_deref(),
        }
    }

    /// Returns the unit as the JSON object it was parsed from.
    pub fn into_object(self) -> Result<Map<String, Value>, ReingestError> {
        match self {
            LogEvent::Raw(object) => Ok(object),
            LogEvent::Enriched(enriched) => match serde_json::to_value(enriched) {
                Ok(Value::Object(object)) => Ok(object),
                Ok(_) => Err(ReingestError::Decode(
                    "enriched event did not serialize to an object".to_string(),
                )),
                Err(e) => Err(ReingestError::Decode(format!(
                    "failed to serialize enriched event: {e}"
                ))),
            },
        }
    }
}

/// Event ready to be recycled into the delivery stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedEvent {
    pub sourcetype: String,
    pub source: String,
    pub event: Value,
    pub fields: ReingestionFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_raw_unit() {
        let event = LogEvent::parse(r#"{"someData":1234,"@timestamp":1234567890}"#, 1).unwrap();
        match event {
            LogEvent::Raw(object) => assert_eq!(object["someData"], json!(1234)),
            LogEvent::Enriched(_) => panic!("expected a raw unit"),
        }
    }

    #[test]
    fn test_parse_enriched_unit() {
        let unit = json!({
            "source": "auditLogs",
            "sourcetype": "auditLogs:json",
            "event": {"key": "value"},
            "fields": {"originLocation": "test-bucket", "reingest": 1},
            "host": "GitHub_Enterprise"
        })
        .to_string();
        let event = LogEvent::parse(&unit, 1).unwrap();
        let LogEvent::Enriched(enriched) = event else {
            panic!("expected an enriched unit");
        };
        assert_eq!(enriched.source.as_deref(), Some("auditLogs"));
        assert_eq!(enriched.sourcetype.as_deref(), Some("auditLogs:json"));
        assert_eq!(
            enriched.fields,
            Some(ReingestionFields {
                reingest: 1,
                origin_location: "test-bucket".to_string()
            })
        );
        assert_eq!(enriched.extra["host"], json!("GitHub_Enterprise"));
    }

    #[test]
    fn test_parse_legacy_origin_key() {
        let unit = r#"{"event":{},"fields":{"origin_bucket_name":"legacy-bucket","reingest":3}}"#;
        let LogEvent::Enriched(enriched) = LogEvent::parse(unit, 1).unwrap() else {
            panic!("expected an enriched unit");
        };
        assert_eq!(
            enriched.fields.unwrap().origin_location,
            "legacy-bucket".to_string()
        );
    }

    #[test]
    fn test_null_metadata_is_raw() {
        let event = LogEvent::parse(r#"{"event":{"a":1},"fields":null}"#, 1).unwrap();
        assert!(matches!(event, LogEvent::Raw(_)));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let result = LogEvent::parse("[1,2,3]", 2);
        assert!(matches!(
            result,
            Err(ReingestError::MalformedUnit { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_fields() {
        let result = LogEvent::parse(r#"{"event":{},"fields":{"reingest":"many"}}"#, 5);
        assert!(matches!(
            result,
            Err(ReingestError::MalformedUnit { line: 5, .. })
        ));
    }

    #[test]
    fn test_transformed_event_key_order() {
        let event = TransformedEvent {
            sourcetype: "aws:firehose".to_string(),
            source: "aws:reingested".to_string(),
            event: json!({"key": "value"}),
            fields: ReingestionFields::first_ingestion("bucket-A"),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"sourcetype":"aws:firehose","source":"aws:reingested","event":{"key":"value"},"fields":{"reingest":1,"originLocation":"bucket-A"}}"#
        );
    }

    #[test]
    fn test_next_hop_keeps_origin() {
        let fields = ReingestionFields::first_ingestion("bucket-A");
        let next = fields.next_hop();
        assert_eq!(next.reingest, 2);
        assert_eq!(next.origin_location, "bucket-A");
    }

    #[test]
    fn test_into_object_roundtrip_for_enriched() {
        let unit = json!({"sourcetype": "st", "event": {"k": 1}, "time": 12});
        let event = LogEvent::parse(&unit.to_string(), 1).unwrap();
        let object = event.into_object().unwrap();
        assert_eq!(Value::Object(object), unit);
    }
}
