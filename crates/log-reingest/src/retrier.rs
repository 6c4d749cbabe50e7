// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded resubmission of the records a transport rejected.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::constants::DEFAULT_MAX_ATTEMPTS;
use crate::error::ReingestError;
use crate::transport::{DeliveryOutcome, DeliveryRecord, StreamTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Resubmit right away, up to the given number of calls.
    Immediate(u32),
    /// Up to the given number of calls, waiting a fixed number of
    /// milliseconds before each resubmission.
    LinearBackoff(u32, u64),
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Immediate(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryStrategy {
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryStrategy::Immediate(attempts) | RetryStrategy::LinearBackoff(attempts, _) => {
                (*attempts).max(1)
            }
        }
    }

    #[must_use]
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RetryStrategy::Immediate(_) => None,
            RetryStrategy::LinearBackoff(_, delay_ms) => Some(Duration::from_millis(*delay_ms)),
        }
    }
}

#[derive(Clone)]
pub struct Retrier {
    transport: Arc<dyn StreamTransport + Send + Sync>,
    strategy: RetryStrategy,
}

impl Retrier {
    #[must_use]
    pub fn new(transport: Arc<dyn StreamTransport + Send + Sync>, strategy: RetryStrategy) -> Self {
        Retrier {
            transport,
            strategy,
        }
    }

    /// Delivers `records`, resubmitting only rejected ones.
    ///
    /// Returns the number of transport calls made. Empty input makes none.
    pub async fn deliver(
        &self,
        destination: &str,
        records: Vec<DeliveryRecord>,
    ) -> Result<u32, ReingestError> {
        let max_attempts = self.strategy.max_attempts();
        let mut pending = records;
        let mut attempts = 0;

        while !pending.is_empty() {
            attempts += 1;
            let submitted = pending.len();
            let outcome = self.transport.submit_batch(destination, &pending).await;

            let (failed, detail) = match outcome {
                DeliveryOutcome::Accepted => break,
                DeliveryOutcome::TransportError(message) => (pending, message),
                DeliveryOutcome::PartiallyFailed(entries) => {
                    let codes: Vec<String> = entries
                        .iter()
                        .filter_map(|entry| entry.error_code.clone())
                        .collect();
                    let detail = format!("Individual error codes: {}", codes.join(", "));
                    // A failure we cannot place fails the whole call.
                    if entries.iter().any(|entry| entry.index >= submitted) {
                        warn!(
                            "RETRIER | Failure reported outside the {submitted} submitted records, resubmitting all of them"
                        );
                        (pending, detail)
                    } else {
                        let mut slots: Vec<Option<DeliveryRecord>> =
                            pending.into_iter().map(Some).collect();
                        let failed: Vec<DeliveryRecord> = entries
                            .iter()
                            .filter_map(|entry| slots.get_mut(entry.index).and_then(Option::take))
                            .collect();
                        (failed, detail)
                    }
                }
            };

            if failed.is_empty() {
                break;
            }

            if attempts >= max_attempts {
                error!(
                    "RETRIER | {} of {submitted} records still failing after {attempts} attempts",
                    failed.len()
                );
                return Err(ReingestError::RetryExhausted {
                    attempts: max_attempts,
                    detail,
                });
            }

            warn!(
                "RETRIER | {} of {submitted} records failed on attempt {attempts}, retrying: {detail}",
                failed.len()
            );
            if let Some(delay) = self.strategy.delay() {
                tokio::time::sleep(delay).await;
            }
            pending = failed;
        }

        debug!("RETRIER | Delivered to {destination} in {attempts} attempts");
        Ok(attempts)
    }
}
