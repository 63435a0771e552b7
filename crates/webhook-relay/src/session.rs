// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Relay session lifecycle.
//!
//! A [`Session`] owns everything one relay needs: the delivery service, the
//! batching log sink, the progress dispatcher and a ticker that flushes quiet
//! log buffers once the interval elapses. Nothing is installed globally; the
//! host decides where to plug in [`Session::layer`] and [`Session::writer`].
//!
//! ```rust,ignore
//! let session = Session::start_webhook(RelayConfig::from_env()?)?;
//! tracing_subscriber::registry().with(session.layer()).init();
//!
//! session
//!     .run("train", |mut out| async move {
//!         writeln!(out, "starting")?;
//!         train(&mut out).await
//!     })
//!     .await?;
//!
//! session.finish().await;
//! ```

use crate::config::RelayConfig;
use crate::delivery::{DeliveryHandle, DeliveryService, DeliveryStatsSnapshot};
use crate::error::RelayError;
use crate::layer::WebhookLayer;
use crate::log_sink::BatchingLogSink;
use crate::progress::{ProgressDispatcher, ProgressWriter};
use crate::severity::Severity;
use crate::sink::Sink;
use crate::webhook::WebhookSink;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub struct Session {
    delivery: DeliveryHandle,
    logs: Arc<BatchingLogSink>,
    progress: Arc<ProgressDispatcher>,
    cancel_token: CancellationToken,
    service_task: JoinHandle<()>,
    ticker_task: JoinHandle<()>,
}

impl Session {
    /// Validates `config` and starts delivering through `sink`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<S: Sink + 'static>(config: RelayConfig, sink: S) -> Result<Self, RelayError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RelayError::Runtime(e.to_string()))?;

        let (service, delivery) = DeliveryService::new(sink, config.request_timeout);
        let service_task = runtime.spawn(service.run());

        let logs = Arc::new(BatchingLogSink::new(&config, delivery.clone()));
        let progress = Arc::new(ProgressDispatcher::new(&config, delivery.clone()));

        let cancel_token = CancellationToken::new();
        let ticker_task = runtime.spawn(flush_ticker(
            Arc::clone(&logs),
            config.flush_interval,
            cancel_token.clone(),
        ));

        debug!("Relay session started for {}", config.username);

        Ok(Self {
            delivery,
            logs,
            progress,
            cancel_token,
            service_task,
            ticker_task,
        })
    }

    /// Starts a session delivering to the configured webhook URL.
    pub fn start_webhook(config: RelayConfig) -> Result<Self, RelayError> {
        let sink = WebhookSink::from_config(&config)?;
        Self::start(config, sink)
    }

    #[must_use]
    pub fn logs(&self) -> Arc<BatchingLogSink> {
        Arc::clone(&self.logs)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressDispatcher> {
        Arc::clone(&self.progress)
    }

    /// A fresh stream writer feeding the progress dispatcher.
    #[must_use]
    pub fn writer(&self) -> ProgressWriter {
        ProgressWriter::new(Arc::clone(&self.progress))
    }

    #[must_use]
    pub fn layer(&self) -> WebhookLayer {
        WebhookLayer::new(Arc::clone(&self.logs))
    }

    #[must_use]
    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.delivery.stats()
    }

    /// Ships buffered logs and waits until every queued message has been
    /// attempted.
    pub async fn flush(&self) {
        self.logs.flush();
        if let Err(e) = self.delivery.drain().await {
            error!("Failed to drain delivery queue: {}", e);
        }
    }

    /// Runs `op` with a [`ProgressWriter`] standing in for its output stream.
    ///
    /// However `op` ends, the writer is dropped (emitting any partial line) and
    /// buffered logs are flushed; a panic is covered by a drop guard. On return,
    /// the delivery queue is drained before the result is handed back. An error
    /// from `op` is recorded as `Error in {name}: {error}` and returned
    /// unchanged.
    pub async fn run<F, Fut, T, E>(&self, name: &str, op: F) -> Result<T, E>
    where
        F: FnOnce(ProgressWriter) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let guard = FlushGuard {
            logs: Arc::clone(&self.logs),
        };

        let result = op(self.writer()).await;
        if let Err(e) = &result {
            self.logs
                .record(&format!("Error in {name}: {e}"), Severity::Error);
        }

        drop(guard);
        if let Err(e) = self.delivery.drain().await {
            error!("Failed to drain delivery queue: {}", e);
        }
        result
    }

    /// Flushes, delivers everything still queued and stops the session.
    pub async fn finish(mut self) -> DeliveryStatsSnapshot {
        self.cancel_token.cancel();
        if let Err(e) = (&mut self.ticker_task).await {
            debug!("Flush ticker ended abnormally: {}", e);
        }

        self.logs.flush();
        if let Err(e) = self.delivery.shutdown() {
            error!("Failed to stop delivery service: {}", e);
        }
        if let Err(e) = (&mut self.service_task).await {
            error!("Delivery service ended abnormally: {}", e);
        }

        let stats = self.delivery.stats();
        debug!(
            "Relay session finished: {} delivered, {} failed",
            stats.delivered, stats.failed
        );
        stats
    }
}

impl Drop for Session {
    // Stops the ticker when a session is dropped without `finish`. The
    // delivery service exits once the last handle to it is gone.
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Flushes on drop, so unwinding out of a wrapped operation still ships logs.
struct FlushGuard {
    logs: Arc<BatchingLogSink>,
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        self.logs.flush();
    }
}

async fn flush_ticker(
    logs: Arc<BatchingLogSink>,
    period: std::time::Duration,
    cancel_token: CancellationToken,
) {
    // A zero period would make the ticker spin
    let mut ticker = interval(period.max(std::time::Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => logs.flush_if_due(),
        }
    }
}
