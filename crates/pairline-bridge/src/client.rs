// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`ProtocolClient`] backed by a WebSocket protocol sidecar.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::SinkExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use pairline_config::model::BridgeConfig;
use pairline_core::error::LinkError;
use pairline_core::traits::adapter::PluginAdapter;
use pairline_core::traits::protocol::{ProtocolClient, ProtocolLink};
use pairline_core::types::{AdapterType, Credential, HealthStatus, Strategy, TenantId};
use pairline_core::PairlineError;

use crate::frame::ClientFrame;
use crate::link::spawn_link;

/// Events buffered per link before the socket task waits on the session.
const EVENT_BUFFER: usize = 64;

/// Opens one sidecar WebSocket per tenant link.
pub struct BridgeClient {
    url: String,
    connect_timeout: Duration,
    last_error: Mutex<Option<String>>,
}

impl BridgeClient {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            last_error: Mutex::new(None),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn record(&self, outcome: Result<(), &LinkError>) {
        if let Ok(mut last) = self.last_error.lock() {
            *last = outcome.err().map(|e| e.to_string());
        }
    }

    async fn connect(
        &self,
        tenant: &TenantId,
        strategy: &Strategy,
        credential: Option<&Credential>,
    ) -> Result<ProtocolLink, LinkError> {
        let timeout = self.connect_timeout.min(strategy.connect_timeout());
        let (mut socket, _response) = tokio::time::timeout(timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| LinkError::Timeout { duration: timeout })?
            .map_err(|e| LinkError::Protocol(format!("sidecar connect failed: {e}")))?;

        let open = ClientFrame::open(
            tenant.as_str(),
            strategy,
            credential.map(|c| c.key_material.as_slice()),
        );
        let json = serde_json::to_string(&open)
            .map_err(|e| LinkError::Protocol(format!("failed to encode open frame: {e}")))?;
        socket
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| LinkError::Protocol(format!("sidecar open failed: {e}")))?;

        let (events, control) = spawn_link(tenant.clone(), socket, EVENT_BUFFER);
        Ok(ProtocolLink {
            events,
            control: Box::new(control),
        })
    }
}

#[async_trait]
impl PluginAdapter for BridgeClient {
    fn name(&self) -> &str {
        "ws-bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Protocol
    }

    /// Degraded while the most recent open failed.
    async fn health_check(&self) -> Result<HealthStatus, PairlineError> {
        let last = self
            .last_error
            .lock()
            .map_err(|_| PairlineError::Internal("bridge health lock poisoned".to_string()))?
            .clone();
        Ok(match last {
            None => HealthStatus::Healthy,
            Some(error) => HealthStatus::Degraded(format!("last sidecar open failed: {error}")),
        })
    }

    async fn shutdown(&self) -> Result<(), PairlineError> {
        debug!(url = %self.url, "bridge client shut down");
        Ok(())
    }
}

#[async_trait]
impl ProtocolClient for BridgeClient {
    async fn open(
        &self,
        tenant: &TenantId,
        strategy: &Strategy,
        credential: Option<&Credential>,
    ) -> Result<ProtocolLink, LinkError> {
        match self.connect(tenant, strategy, credential).await {
            Ok(link) => {
                self.record(Ok(()));
                info!(
                    tenant_id = %tenant,
                    strategy = %strategy.name,
                    resume = credential.is_some(),
                    "bridge link opened"
                );
                Ok(link)
            }
            Err(e) => {
                self.record(Err(&e));
                warn!(tenant_id = %tenant, strategy = %strategy.name, error = %e, "bridge link open failed");
                Err(e)
            }
        }
    }
}
