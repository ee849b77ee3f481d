// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message handlers used by `pairline serve`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use pairline_config::model::InboundConfig;
use pairline_core::traits::inbound::InboundHandler;
use pairline_core::types::InboundMessage;
use pairline_core::PairlineError;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs each inbound message as JSON to a webhook.
pub struct WebhookHandler {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookHandler {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self, PairlineError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| PairlineError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl InboundHandler for WebhookHandler {
    async fn on_inbound_message(&self, message: InboundMessage) -> Result<(), PairlineError> {
        let mut request = self.client.post(&self.url).json(&message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| PairlineError::Protocol {
            message: format!("webhook delivery failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(PairlineError::Protocol {
                message: format!("webhook answered {status}"),
                source: None,
            });
        }

        debug!(tenant_id = %message.tenant_id, message_id = %message.id, "inbound message delivered to webhook");
        Ok(())
    }
}

/// Logs inbound messages when no webhook is configured.
pub struct LogHandler;

#[async_trait]
impl InboundHandler for LogHandler {
    async fn on_inbound_message(&self, message: InboundMessage) -> Result<(), PairlineError> {
        info!(
            tenant_id = %message.tenant_id,
            message_id = %message.id,
            sender_id = %message.sender_id,
            chars = message.content.chars().count(),
            "inbound message"
        );
        Ok(())
    }
}

/// The handler selected by `[inbound]`.
pub fn from_config(config: &InboundConfig) -> Result<Arc<dyn InboundHandler>, PairlineError> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookHandler::new(
            url.clone(),
            config.webhook_token.clone(),
        )?)),
        None => Ok(Arc::new(LogHandler)),
    }
}
