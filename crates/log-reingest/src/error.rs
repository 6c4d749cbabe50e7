// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors that abort a re-ingestion or transformation invocation.
///
/// Every variant is fatal for the invocation. Transport failures are not
/// listed: they feed the retry path and only surface as
/// [`ReingestError::RetryExhausted`].
#[derive(Debug, thiserror::Error)]
pub enum ReingestError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed log unit on line {line}: {source}")]
    MalformedUnit {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A unit inside the message framed on `line` of the source object.
    #[error("Message on line {line} of the source object is invalid: {source}")]
    InvalidMessage {
        line: usize,
        #[source]
        source: Box<ReingestError>,
    },

    #[error("Log unit on line {line} has no event body")]
    MissingEventBody { line: usize },

    #[error("Log event has no '{key}' timestamp field")]
    MissingTimestamp { key: String },

    #[error("Failed to decode record: {0}")]
    Decode(String),

    #[error("Could not put records after {attempts} attempts. {detail}")]
    RetryExhausted { attempts: u32, detail: String },

    #[error("Failed to read source object: {0}")]
    Source(String),

    #[error("Failed to write fallback payload: {0}")]
    Fallback(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ReingestError::Config("REINGEST_DELIVERY_STREAM is not set".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: REINGEST_DELIVERY_STREAM is not set"
        );
    }

    #[test]
    fn test_retry_exhausted_display() {
        let error = ReingestError::RetryExhausted {
            attempts: 3,
            detail: "Individual error codes: ServiceUnavailable, InternalFailure".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Could not put records after 3 attempts. Individual error codes: ServiceUnavailable, InternalFailure"
        );
    }

    #[test]
    fn test_malformed_unit_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error = ReingestError::MalformedUnit { line: 4, source };
        assert!(error.to_string().starts_with("Malformed log unit on line 4"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_invalid_message_names_both_lines() {
        let error = ReingestError::InvalidMessage {
            line: 2,
            source: Box::new(ReingestError::MissingEventBody { line: 3 }),
        };
        assert_eq!(
            error.to_string(),
            "Message on line 2 of the source object is invalid: Log unit on line 3 has no event body"
        );
    }
}
