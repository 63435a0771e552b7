// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching log sink.
//!
//! Collects formatted log lines and ships them as one message when any of the
//! [`FlushPolicy`] triggers fires:
//!
//! - a record at or above the flush severity (warnings and errors go out at once)
//! - the buffer reaching its entry limit
//! - the flush interval elapsing since the previous flush
//!
//! A batch is drained and enqueued for delivery under the buffer lock, so
//! concurrent flushes never see the same line twice and batches reach the
//! delivery queue in the order they were drained. Enqueueing never blocks.
//! Nothing here returns an error to the caller; failures go to the crate's
//! `tracing` output.

use crate::batch::{FlushPolicy, LogBuffer};
use crate::config::RelayConfig;
use crate::delivery::DeliveryHandle;
use crate::severity::Severity;
use crate::sink::OutboundMessage;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::error;

#[derive(Debug)]
pub struct BatchingLogSink {
    buffer: Mutex<LogBuffer>,
    policy: FlushPolicy,
    min_level: Severity,
    username: String,
    delivery: DeliveryHandle,
}

impl BatchingLogSink {
    #[must_use]
    pub fn new(config: &RelayConfig, delivery: DeliveryHandle) -> Self {
        Self {
            buffer: Mutex::new(LogBuffer::new(config.max_message_length)),
            policy: FlushPolicy {
                flush_level: config.flush_level,
                max_entries: config.max_batch_entries,
                interval: config.flush_interval,
            },
            min_level: config.log_level,
            username: config.username.clone(),
            delivery,
        }
    }

    /// Buffers one formatted line and flushes if the policy says so.
    ///
    /// Records below the configured minimum severity are ignored.
    pub fn record(&self, text: &str, severity: Severity) {
        self.record_with(severity, || text.to_string());
    }

    /// Like [`BatchingLogSink::record`], with the line built under the buffer
    /// lock.
    fn record_with(&self, severity: Severity, line: impl FnOnce() -> String) {
        if severity < self.min_level {
            return;
        }

        let mut buffer = self.lock();
        buffer.push(line());
        if self
            .policy
            .should_flush(severity, buffer.len(), buffer.since_last_flush())
        {
            self.send(buffer.drain());
        }
    }

    /// Ships everything buffered so far. No-op when the buffer is empty.
    pub fn flush(&self) {
        let mut buffer = self.lock();
        self.send(buffer.drain());
    }

    /// Flushes only when the interval has elapsed since the previous flush.
    pub fn flush_if_due(&self) {
        let mut buffer = self.lock();
        if !buffer.is_empty() && buffer.since_last_flush() >= self.policy.interval {
            self.send(buffer.drain());
        }
    }

    /// Number of lines waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    // Callers hold the buffer lock, so batches are enqueued in drain order.
    fn send(&self, batch: Option<String>) {
        let Some(batch) = batch else {
            return;
        };
        let message = OutboundMessage::code_block(&batch, &self.username);
        if let Err(e) = self.delivery.deliver(message) {
            error!("Dropping log batch: {}", e);
        }
    }

    // A panic while holding the lock leaves the buffer in a usable state,
    // so poisoning is ignored rather than propagated to callers.
    fn lock(&self) -> MutexGuard<'_, LogBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
