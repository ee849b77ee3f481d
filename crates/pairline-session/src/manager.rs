// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Facade over the registry and dispatcher used by the gateway and binary.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use pairline_config::PairlineConfig;
use pairline_core::traits::credential::CredentialStore;
use pairline_core::traits::inbound::InboundHandler;
use pairline_core::traits::protocol::ProtocolClient;
use pairline_core::types::{
    HealthStatus, MessageId, OutboundMessage, SessionSnapshot, StateTransition, TenantId,
};
use pairline_core::{PairlineError, SendError};

use crate::actor::{SessionHandle, SessionServices, SessionSettings};
use crate::classifier::DisconnectClassifier;
use crate::dispatcher::{EventDispatcher, InboundFanout};
use crate::registry::SessionRegistry;
use crate::shutdown;
use crate::strategy::StrategyCatalog;

/// Aggregated health of the manager's collaborators.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub protocol: HealthStatus,
    pub credentials: HealthStatus,
    pub active_sessions: usize,
    pub tenants: usize,
}

impl HealthReport {
    /// True when no collaborator reports `Unhealthy`.
    pub fn is_serving(&self) -> bool {
        !matches!(self.protocol, HealthStatus::Unhealthy(_))
            && !matches!(self.credentials, HealthStatus::Unhealthy(_))
    }
}

/// Entry point for tenant session management.
pub struct SessionManager {
    services: SessionServices,
    registry: Arc<SessionRegistry>,
    dispatcher: EventDispatcher,
}

impl SessionManager {
    pub fn new(services: SessionServices, handler: Arc<dyn InboundHandler>) -> Self {
        let inbound = Arc::new(InboundFanout::new(
            handler,
            services.settings.inbound_queue_capacity,
        ));
        let registry = Arc::new(SessionRegistry::new(services.clone(), inbound));
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));
        Self {
            services,
            registry,
            dispatcher,
        }
    }

    /// Builds the manager from loaded configuration.
    pub fn from_config(
        config: &PairlineConfig,
        protocol: Arc<dyn ProtocolClient>,
        credentials: Arc<dyn CredentialStore>,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Self, PairlineError> {
        let catalog = StrategyCatalog::from_config(&config.strategies)?;
        let services = SessionServices::new(
            protocol,
            credentials,
            catalog,
            DisconnectClassifier::from_config(&config.classifier),
            SessionSettings::from_config(config),
        );
        Ok(Self::new(services, handler))
    }

    /// Starts (or returns) the tenant's actor and returns its current status.
    ///
    /// Never waits for pairing or connection.
    pub async fn create_session(&self, tenant: &TenantId) -> SessionSnapshot {
        self.registry.get_or_create(tenant).await.status()
    }

    pub fn session_status(&self, tenant: &TenantId) -> Result<SessionSnapshot, PairlineError> {
        self.registry
            .get(tenant)
            .map(|handle| handle.status())
            .ok_or_else(|| PairlineError::SessionNotFound(tenant.to_string()))
    }

    pub async fn stop_session(&self, tenant: &TenantId) -> Result<(), PairlineError> {
        self.registry.stop(tenant).await
    }

    /// Deactivates the tenant: stops the actor and wipes its credential.
    pub async fn destroy_session(&self, tenant: &TenantId) -> Result<bool, PairlineError> {
        self.registry.destroy(tenant, true).await
    }

    pub async fn send(
        &self,
        tenant: &TenantId,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<MessageId, SendError> {
        let message = OutboundMessage {
            recipient: recipient.into(),
            content: content.into(),
        };
        self.dispatcher.send(tenant, message).await
    }

    pub fn list_sessions(&self) -> Vec<SessionSnapshot> {
        self.registry.list()
    }

    /// Transition stream of the tenant's current actor.
    pub fn subscribe(&self, tenant: &TenantId) -> Option<broadcast::Receiver<StateTransition>> {
        self.registry.get(tenant).map(|handle| handle.subscribe())
    }

    pub fn handle(&self, tenant: &TenantId) -> Option<Arc<SessionHandle>> {
        self.registry.get(tenant)
    }

    pub fn active_sessions(&self) -> usize {
        self.services.active_sessions()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Creates an actor for every tenant with a stored credential.
    ///
    /// Returns the tenants that were started.
    pub async fn resume_stored(&self) -> Result<Vec<TenantId>, PairlineError> {
        let tenants = self.services.credentials.list().await?;
        for tenant in &tenants {
            self.registry.get_or_create(tenant).await;
        }
        info!(count = tenants.len(), "resumed stored sessions");
        Ok(tenants)
    }

    pub async fn health(&self) -> HealthReport {
        let protocol = self
            .services
            .protocol
            .health_check()
            .await
            .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
        let credentials = self
            .services
            .credentials
            .health_check()
            .await
            .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
        HealthReport {
            protocol,
            credentials,
            active_sessions: self.active_sessions(),
            tenants: self.registry.len(),
        }
    }

    /// Stops every actor within the configured grace period, then shuts the
    /// protocol client down.
    pub async fn shutdown(&self) {
        shutdown::drain_sessions(&self.registry, self.services.settings.stop_grace).await;
        if let Err(e) = self.services.protocol.shutdown().await {
            warn!(error = %e, "protocol client shutdown failed");
        }
    }
}
