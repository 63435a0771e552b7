// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background delivery of outbound messages.
//!
//! Producers (the batching log sink, the progress dispatcher) hold a cloneable
//! [`DeliveryHandle`] and enqueue messages without waiting on the network. A
//! single [`DeliveryService`] task owns the [`Sink`] and delivers messages one
//! at a time in the order they were enqueued.
//!
//! Failures are logged here, on the crate's own `tracing` target, and the
//! message is dropped: no retry, no requeue.

use crate::error::DeliveryError;
use crate::sink::{OutboundMessage, Sink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

#[derive(Debug)]
pub enum DeliveryCommand {
    Deliver(OutboundMessage),
    /// Acknowledged once every message enqueued before it has been attempted.
    Drain(oneshot::Sender<()>),
    Shutdown,
}

/// Running totals of delivery attempts.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryStatsSnapshot {
    pub delivered: u64,
    pub failed: u64,
}

impl DeliveryStats {
    #[must_use]
    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    tx: mpsc::UnboundedSender<DeliveryCommand>,
    stats: Arc<DeliveryStats>,
}

impl DeliveryHandle {
    /// Enqueues a message. Only fails once the service has stopped.
    pub fn deliver(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        self.tx
            .send(DeliveryCommand::Deliver(message))
            .map_err(|_| DeliveryError::ChannelClosed)
    }

    /// Waits until every message enqueued so far has been attempted.
    pub async fn drain(&self) -> Result<(), DeliveryError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(DeliveryCommand::Drain(response_tx))
            .map_err(|_| DeliveryError::ChannelClosed)?;

        response_rx.await.map_err(|_| DeliveryError::ChannelClosed)
    }

    pub fn shutdown(&self) -> Result<(), DeliveryError> {
        self.tx
            .send(DeliveryCommand::Shutdown)
            .map_err(|_| DeliveryError::ChannelClosed)
    }

    #[must_use]
    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.stats.snapshot()
    }
}

pub struct DeliveryService<S> {
    sink: S,
    timeout: Duration,
    stats: Arc<DeliveryStats>,
    rx: mpsc::UnboundedReceiver<DeliveryCommand>,
}

impl<S: Sink> DeliveryService<S> {
    /// Creates the service and its handle. The service does nothing until
    /// [`DeliveryService::run`] is spawned.
    pub fn new(sink: S, timeout: Duration) -> (Self, DeliveryHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(DeliveryStats::default());

        let service = Self {
            sink,
            timeout,
            stats: Arc::clone(&stats),
            rx,
        };

        let handle = DeliveryHandle { tx, stats };

        (service, handle)
    }

    pub async fn run(mut self) {
        debug!("Delivery service started");

        while let Some(command) = self.rx.recv().await {
            match command {
                DeliveryCommand::Deliver(message) => self.deliver(&message).await,

                DeliveryCommand::Drain(response_tx) => {
                    if response_tx.send(()).is_err() {
                        debug!("Drain requester went away before acknowledgement");
                    }
                }

                DeliveryCommand::Shutdown => {
                    debug!("Delivery service shutting down");
                    break;
                }
            }
        }

        // Anything enqueued before shutdown still gets its attempt
        while let Ok(command) = self.rx.try_recv() {
            match command {
                DeliveryCommand::Deliver(message) => self.deliver(&message).await,
                DeliveryCommand::Drain(response_tx) => {
                    let _ = response_tx.send(());
                }
                DeliveryCommand::Shutdown => {}
            }
        }

        debug!("Delivery service stopped");
    }

    async fn deliver(&self, message: &OutboundMessage) {
        let outcome = match tokio::time::timeout(self.timeout, self.sink.deliver(message)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                if e.is_permanent() {
                    error!("Failed to deliver message, dropping it: {}", e);
                } else {
                    warn!("Failed to deliver message, dropping it: {}", e);
                }
            }
        }
    }
}
