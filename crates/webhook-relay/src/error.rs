// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Errors raised while setting up a relay session.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Outcome of a single failed delivery attempt.
///
/// Delivery is best-effort: these are reported on the fallback channel and
/// never retried.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sink responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("delivery timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("delivery channel closed")]
    ChannelClosed,
}

impl DeliveryError {
    /// 4xx responses will not succeed if sent again.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
    }
}
