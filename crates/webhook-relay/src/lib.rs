// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Webhook Relay
//!
//! Relays application logs and terminal progress bars to a chat webhook
//! without flooding it.
//!
//! ## Overview
//!
//! Two producers share one delivery path:
//! - **Logs**: [`BatchingLogSink`] buffers formatted records and ships them as
//!   a single code-block message when a severe record arrives, the batch fills
//!   up, or the flush interval elapses. Oversized batches keep their newest tail.
//! - **Progress**: [`ProgressDispatcher`] parses progress-bar redraws and only
//!   announces evenly spaced checkpoints; other output lines pass through
//!   verbatim.
//!
//! Both enqueue onto a [`DeliveryHandle`]; a background [`DeliveryService`]
//! owns the [`Sink`] and delivers in order. Delivery failures never reach the
//! caller: they are reported on this crate's `tracing` output and the message
//! is dropped.
//!
//! ## Wiring
//!
//! [`Session`] bundles the pieces. Plug [`Session::layer`] into a
//! `tracing_subscriber` registry to forward application events, and hand
//! [`Session::writer`] (or [`Session::run`]) to code that prints progress.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod config;
pub mod delivery;
pub mod error;
pub mod layer;
pub mod log_sink;
pub mod progress;
pub mod session;
pub mod severity;
pub mod sink;
pub mod webhook;

pub use config::RelayConfig;
pub use delivery::{DeliveryHandle, DeliveryService, DeliveryStatsSnapshot};
pub use error::{DeliveryError, RelayError};
pub use layer::WebhookLayer;
pub use log_sink::BatchingLogSink;
pub use progress::{ProgressDispatcher, ProgressWriter};
pub use session::Session;
pub use severity::Severity;
pub use sink::{MemorySink, OutboundMessage, Sink};
pub use webhook::WebhookSink;
