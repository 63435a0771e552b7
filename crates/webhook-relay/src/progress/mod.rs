// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Progress-bar relay.
//!
//! A terminal progress bar redraws many times per second; relaying every redraw
//! would flood a rate-limited webhook. The [`ProgressDispatcher`] parses each
//! line it is given and only announces evenly spaced checkpoints (0%, 10%, …,
//! 100% by default), each as its own message with a compact bar:
//!
//! ```text
//! Processing: [==========----------] [50/100 | 00:05<00:05]
//! ```
//!
//! Lines that are not progress updates are relayed verbatim, one message per
//! non-empty line, with no batching.
//!
//! # Concurrency
//!
//! A dispatcher tracks a single logical progress stream. It is `Sync` so it can
//! be shared, but interleaving two different bars through the same dispatcher
//! will mix their checkpoints.

mod parser;
mod session;
mod writer;

pub use parser::{looks_like_progress, parse, ProgressUpdate};
pub use session::{render_bar, Announcement, ProgressSession, BAR_WIDTH};
pub use writer::ProgressWriter;

use crate::config::RelayConfig;
use crate::delivery::DeliveryHandle;
use crate::sink::OutboundMessage;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

#[derive(Debug)]
pub struct ProgressDispatcher {
    session: Mutex<ProgressSession>,
    username: String,
    delivery: DeliveryHandle,
}

impl ProgressDispatcher {
    #[must_use]
    pub fn new(config: &RelayConfig, delivery: DeliveryHandle) -> Self {
        Self {
            session: Mutex::new(ProgressSession::new(
                &config.progress_description,
                config.progress_intervals,
            )),
            username: config.username.clone(),
            delivery,
        }
    }

    /// Handles one line of output.
    ///
    /// Progress lines may produce a checkpoint announcement; malformed progress
    /// lines are dropped silently. Any other non-blank line is relayed trimmed.
    pub fn write(&self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        if !looks_like_progress(trimmed) {
            self.send(trimmed);
            return;
        }

        let Some(update) = parse(trimmed) else {
            debug!("Ignoring unparseable progress line");
            return;
        };

        let announcement = self.lock().observe(&update);
        if let Some(announcement) = announcement {
            self.send(&announcement.render());
        }
    }

    /// Starts tracking a new progress run.
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Copy of the current tracking state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSession {
        self.lock().clone()
    }

    fn send(&self, text: &str) {
        let message = OutboundMessage::code_block(text, &self.username);
        if let Err(e) = self.delivery.deliver(message) {
            error!("Dropping progress message: {}", e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
