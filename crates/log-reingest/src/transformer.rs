// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-unit transformation of re-ingested message bodies.
//!
//! A message body is newline-delimited JSON. Every unit becomes one
//! [`TransformedEvent`] whose re-ingestion counter is one higher than the
//! unit's own, or `1` when the unit has never been recycled.

use tracing::debug;

use crate::constants::{DEFAULT_SOURCE, DEFAULT_SOURCETYPE};
use crate::error::ReingestError;
use crate::event::{LogEvent, ReingestionFields, TransformedEvent};

#[derive(Debug, Clone)]
pub struct Transformer {
    /// Location the current invocation read its records from. Assigned as the
    /// origin of units that do not carry one yet.
    origin_location: String,
}

impl Transformer {
    #[must_use]
    pub fn new(origin_location: impl Into<String>) -> Self {
        Transformer {
            origin_location: origin_location.into(),
        }
    }

    /// Transforms every unit of a message body.
    ///
    /// Blank lines are skipped. The first malformed unit aborts the whole
    /// body: dropping it could lose the metadata that stops it from looping.
    pub fn transform(&self, raw_body: &str) -> Result<Vec<TransformedEvent>, ReingestError> {
        let events = raw_body
            .split('\n')
            .enumerate()
            .filter(|(_, unit)| !unit.trim().is_empty())
            .map(|(index, unit)| self.transform_unit(unit, index + 1))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("REINGEST | Transformed {} log units", events.len());
        Ok(events)
    }

    pub fn transform_unit(&self, unit: &str, line: usize) -> Result<TransformedEvent, ReingestError> {
        match LogEvent::parse(unit, line)? {
            LogEvent::Raw(mut object) => {
                let event = object
                    .remove("event")
                    .ok_or(ReingestError::MissingEventBody { line })?;
                Ok(TransformedEvent {
                    sourcetype: DEFAULT_SOURCETYPE.to_string(),
                    source: DEFAULT_SOURCE.to_string(),
                    event,
                    fields: ReingestionFields::first_ingestion(self.origin_location.as_str()),
                })
            }
            LogEvent::Enriched(enriched) => {
                let event = enriched
                    .event
                    .ok_or(ReingestError::MissingEventBody { line })?;
                let fields = match enriched.fields {
                    Some(fields) => fields.next_hop(),
                    None => ReingestionFields::first_ingestion(self.origin_location.as_str()),
                };
                Ok(TransformedEvent {
                    sourcetype: enriched
                        .sourcetype
                        .unwrap_or_else(|| DEFAULT_SOURCETYPE.to_string()),
                    source: enriched
                        .source
                        .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                    event,
                    fields,
                })
            }
        }
    }
}
