// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Count- and byte-bounded partitioning of ordered items into chunks.
//!
//! A chunk is closed as soon as adding the next item would break either
//! limit. Byte sizes are projected from the start of the chunk and include
//! the framing the chunk is serialized with, so a JSON array chunk accounts
//! for its brackets and separating commas:
//!
//! ```json
//! [{"event":1},{"event":2}]
//! ```

use tracing::warn;

use crate::codec;
use crate::error::ReingestError;
use crate::transport::DeliveryRecord;

/// Anything that knows its own encoded size.
pub trait BatchItem {
    fn encoded_len(&self) -> usize;
}

impl BatchItem for String {
    fn encoded_len(&self) -> usize {
        self.len()
    }
}

impl BatchItem for Vec<u8> {
    fn encoded_len(&self) -> usize {
        self.len()
    }
}

/// Bytes a serialized chunk adds around and between its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    /// Fixed cost of a chunk, e.g. `[` and `]`.
    pub enclosing: usize,
    /// Cost between two consecutive items, e.g. `,`.
    pub separator: usize,
}

impl Framing {
    pub const NONE: Framing = Framing {
        enclosing: 0,
        separator: 0,
    };

    pub const JSON_ARRAY: Framing = Framing {
        enclosing: 2,
        separator: 1,
    };
}

#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    max_items: usize,
    max_bytes: Option<usize>,
    framing: Framing,
}

impl Batcher {
    /// A `max_items` of zero is treated as one.
    #[must_use]
    pub fn new(max_items: usize, max_bytes: Option<usize>) -> Self {
        Batcher {
            max_items: max_items.max(1),
            max_bytes,
            framing: Framing::JSON_ARRAY,
        }
    }

    #[must_use]
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Splits `items` into ordered chunks respecting both limits.
    pub fn batch<T: BatchItem>(&self, items: Vec<T>) -> Vec<Vec<T>> {
        let mut chunks = Vec::new();
        let mut current: Vec<T> = Vec::new();
        let mut current_bytes = self.framing.enclosing;

        for item in items {
            let size = item.encoded_len();
            let projected = if current.is_empty() {
                current_bytes + size
            } else {
                current_bytes + self.framing.separator + size
            };

            let over_count = current.len() >= self.max_items;
            let over_bytes = self.max_bytes.is_some_and(|max| projected > max);
            if !current.is_empty() && (over_count || over_bytes) {
                chunks.push(std::mem::take(&mut current));
                current_bytes = self.framing.enclosing;
            }

            if let Some(max) = self.max_bytes {
                let alone = self.framing.enclosing + size;
                if alone > max {
                    warn!(
                        "BATCHER | Item of {size} bytes exceeds the {max} byte chunk limit, sending it alone"
                    );
                }
            }

            if current.is_empty() {
                current_bytes += size;
            } else {
                current_bytes += self.framing.separator + size;
            }
            current.push(item);
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// Joins already serialized JSON values into one JSON array.
#[must_use]
pub fn serialize_json_array<S: AsRef<str>>(items: &[S]) -> String {
    let capacity = items.iter().map(|item| item.as_ref().len() + 1).sum::<usize>() + 2;
    let mut buffer = String::with_capacity(capacity);
    buffer.push('[');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            buffer.push(',');
        }
        buffer.push_str(item.as_ref());
    }
    buffer.push(']');
    buffer
}

/// Serializes a chunk as a JSON array and compresses it into one record.
pub fn encode_json_array<S: AsRef<str>>(items: &[S]) -> Result<DeliveryRecord, ReingestError> {
    let array = serialize_json_array(items);
    Ok(DeliveryRecord::new(codec::gzip(array.as_bytes())?))
}
