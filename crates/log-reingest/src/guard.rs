// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Loop guard for re-ingested events.
//!
//! Every recycle pass increments an event's `reingest` counter. Once the
//! counter passes `max_reingest` the event is diverted: only its body is kept
//! and written, newline-terminated, to a fallback payload grouped by the
//! location the event was originally ingested from.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ReingestError;
use crate::event::ReingestionFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecycleDecision {
    Recycle,
    Divert,
}

#[derive(Debug, Clone, Copy)]
pub struct ReingestionGuard {
    max_reingest: u64,
}

impl ReingestionGuard {
    #[must_use]
    pub fn new(max_reingest: u64) -> Self {
        ReingestionGuard { max_reingest }
    }

    #[must_use]
    pub fn decide(&self, fields: &ReingestionFields) -> RecycleDecision {
        if fields.reingest > self.max_reingest {
            RecycleDecision::Divert
        } else {
            RecycleDecision::Recycle
        }
    }
}

/// Diverted event bodies, newline-delimited, keyed by origin location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackPayloads {
    payloads: BTreeMap<String, String>,
}

impl FallbackPayloads {
    pub fn append(&mut self, origin_location: &str, event: &Value) -> Result<(), ReingestError> {
        let line = serde_json::to_string(event)
            .map_err(|e| ReingestError::Decode(format!("failed to serialize event body: {e}")))?;
        let payload = self
            .payloads
            .entry(origin_location.to_string())
            .or_default();
        payload.push_str(&line);
        payload.push('\n');
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Number of distinct origins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    #[must_use]
    pub fn get(&self, origin_location: &str) -> Option<&str> {
        self.payloads.get(origin_location).map(String::as_str)
    }

    pub fn into_payloads(self) -> impl Iterator<Item = (String, String)> {
        self.payloads.into_iter()
    }
}
