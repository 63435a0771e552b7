// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The remote endpoint abstraction every component delivers through.

use crate::error::DeliveryError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// A single message handed to a [`Sink`].
///
/// Serializes to the webhook payload shape `{"content": ..., "username": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub content: String,
    pub username: String,
}

impl OutboundMessage {
    /// Wraps `text` in a code fence so the remote side renders it monospaced.
    #[must_use]
    pub fn code_block(text: &str, username: &str) -> Self {
        Self {
            content: format!("```\n{text}\n```"),
            username: username.to_string(),
        }
    }

    /// Returns the text inside the code fence, or the raw content if it has none.
    #[must_use]
    pub fn body(&self) -> &str {
        self.content
            .strip_prefix("```\n")
            .and_then(|rest| rest.strip_suffix("\n```"))
            .unwrap_or(&self.content)
    }
}

/// Remote endpoint messages are delivered to.
///
/// Implementations report failures through [`DeliveryError`]; callers treat
/// every error as final and never retry.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for Arc<S> {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        (**self).deliver(message).await
    }
}

/// Sink that keeps every message in memory.
///
/// Clones share the same storage, so a test can hand one clone to a session
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fenced bodies of the delivered messages, in delivery order.
    #[must_use]
    pub fn bodies(&self) -> Vec<String> {
        self.messages()
            .iter()
            .map(|m| m.body().to_string())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}
