// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration.
//!
//! [`WebhookLayer`] forwards application events into a [`BatchingLogSink`].
//! Each event becomes one line: the `message` field followed by the remaining
//! fields as `key=value` pairs.
//!
//! ```text
//! info!(rows = 42, "import finished")  ->  "import finished rows=42"
//! ```
//!
//! Events emitted by this crate or by the HTTP stack it delivers through are
//! never forwarded. They are the fallback diagnostic channel, and feeding
//! them back into the sink would loop whenever the sink itself is failing.

use crate::log_sink::BatchingLogSink;
use crate::severity::Severity;
use std::fmt::{self, Write};
use std::sync::Arc;
use tracing_core::field::{Field, Visit};
use tracing_core::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Targets whose events stay local.
const LOCAL_TARGETS: &[&str] = &[
    "webhook_relay",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "tokio",
];

#[derive(Debug, Clone)]
pub struct WebhookLayer {
    logs: Arc<BatchingLogSink>,
}

impl WebhookLayer {
    #[must_use]
    pub fn new(logs: Arc<BatchingLogSink>) -> Self {
        Self { logs }
    }
}

impl<S: Subscriber> Layer<S> for WebhookLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_local_target(metadata.target()) {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let line = visitor.finish();
        if line.is_empty() {
            return;
        }

        self.logs.record(&line, Severity::from(metadata.level()));
    }
}

fn is_local_target(target: &str) -> bool {
    LOCAL_TARGETS.iter().any(|local| {
        target
            .strip_prefix(local)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        // Writing into a String cannot fail
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}
