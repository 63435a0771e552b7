// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP webhook transport.
//!
//! Posts each [`OutboundMessage`] as a JSON body to a single webhook URL. A
//! response outside the 2xx range is a failed delivery; the body is kept in the
//! error so rate-limit details end up in the fallback diagnostics.

use crate::config::RelayConfig;
use crate::error::{DeliveryError, RelayError};
use crate::sink::{OutboundMessage, Sink};
use async_trait::async_trait;
use core::time::Duration;
use std::time::Instant;
use tracing::{debug, error};

/// Sink that posts messages to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl WebhookSink {
    /// Builds a sink from the session configuration.
    ///
    /// Fails when no webhook URL is configured or the URL does not parse.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let Some(url) = config.webhook_url.as_deref() else {
            return Err(RelayError::InvalidConfig(
                "RELAY_WEBHOOK_URL is required".to_string(),
            ));
        };
        let url = reqwest::Url::parse(url)
            .map_err(|e| RelayError::InvalidConfig(format!("Invalid webhook URL: {e}")))?;
        Ok(Self {
            client: get_client(config),
            url,
        })
    }

    /// Builds a sink around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, url: reqwest::Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Sink for WebhookSink {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let time = Instant::now();
        let resp = self
            .client
            .post(self.url.clone())
            .json(message)
            .send()
            .await?;
        let status = resp.status();

        if status.is_success() {
            debug!(
                "WEBHOOK | Delivered {} chars in {} ms",
                message.content.chars().count(),
                time.elapsed().as_millis()
            );
            return Ok(());
        }

        // Only read the body on failure
        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Creates an HTTP client with the configured timeout and proxy.
///
/// An unusable proxy setting is logged and the client falls back to a direct
/// connection, so a bad proxy never disables delivery altogether.
#[must_use]
pub fn get_client(config: &RelayConfig) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "WEBHOOK | Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "WEBHOOK | Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(config: &RelayConfig, allow_proxy: bool) -> Result<reqwest::Client, reqwest::Error> {
    let mut client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            client = client.proxy(reqwest::Proxy::https(https_uri.as_str())?);
        }
    }

    client.build()
}
