// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event dispatch between tenant actors and the outside world.
//!
//! Inbound: each tenant gets a bounded queue drained by its own consumer
//! task, which calls the injected [`InboundHandler`] in arrival order. A
//! failed delivery is retried before the queue moves on, so handlers must
//! tolerate duplicates. A full queue pushes back on the tenant's actor and
//! nobody else.
//! Outbound: sends are routed to the tenant's actor, which serializes them.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pairline_core::traits::inbound::InboundHandler;
use pairline_core::types::{InboundMessage, MessageId, OutboundMessage, SessionState, TenantId};
use pairline_core::SendError;

use crate::metrics;
use crate::registry::SessionRegistry;

/// Deliveries per message before it is dropped.
const DELIVERY_ATTEMPTS: u32 = 3;

/// Delay before the second delivery; grows linearly after that.
const REDELIVERY_DELAY: Duration = Duration::from_millis(200);

/// Per-tenant inbound queues feeding one shared handler.
pub struct InboundFanout {
    handler: Arc<dyn InboundHandler>,
    capacity: usize,
    queues: DashMap<TenantId, mpsc::Sender<InboundMessage>>,
}

impl InboundFanout {
    pub fn new(handler: Arc<dyn InboundHandler>, capacity: usize) -> Self {
        Self {
            handler,
            capacity: capacity.max(1),
            queues: DashMap::new(),
        }
    }

    /// Sender for the tenant's queue, starting its consumer on first use.
    pub fn attach(&self, tenant: &TenantId) -> mpsc::Sender<InboundMessage> {
        match self.queues.entry(tenant.clone()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => entry.get().clone(),
            entry => {
                let (tx, rx) = mpsc::channel(self.capacity);
                tokio::spawn(consume(tenant.clone(), Arc::clone(&self.handler), rx));
                entry.insert(tx.clone());
                tx
            }
        }
    }

    /// Drops the queue. The consumer drains what is left, then exits.
    pub fn detach(&self, tenant: &TenantId) {
        self.queues.remove(tenant);
    }

    /// Tenants with a live queue.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }
}

async fn consume(
    tenant: TenantId,
    handler: Arc<dyn InboundHandler>,
    mut rx: mpsc::Receiver<InboundMessage>,
) {
    while let Some(message) = rx.recv().await {
        deliver(&tenant, handler.as_ref(), message).await;
    }
    debug!(tenant_id = %tenant, "inbound queue closed");
}

async fn deliver(tenant: &TenantId, handler: &dyn InboundHandler, message: InboundMessage) {
    for attempt in 1..=DELIVERY_ATTEMPTS {
        match handler.on_inbound_message(message.clone()).await {
            Ok(()) => {
                metrics::record_inbound();
                return;
            }
            Err(e) if attempt < DELIVERY_ATTEMPTS => {
                warn!(
                    tenant_id = %tenant,
                    message_id = %message.id,
                    attempt,
                    error = %e,
                    "inbound handler failed, redelivering"
                );
                tokio::time::sleep(REDELIVERY_DELAY * attempt).await;
            }
            Err(e) => {
                warn!(
                    tenant_id = %tenant,
                    message_id = %message.id,
                    error = %e,
                    "inbound handler failed, dropping message"
                );
            }
        }
    }
}

/// Routes outbound sends to the owning actor.
pub struct EventDispatcher {
    registry: Arc<SessionRegistry>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends through the tenant's actor. Unknown tenants are `NotConnected`.
    pub async fn send(
        &self,
        tenant: &TenantId,
        message: OutboundMessage,
    ) -> Result<MessageId, SendError> {
        match self.registry.get(tenant) {
            Some(handle) => handle.send(message).await,
            None => Err(SendError::NotConnected {
                state: SessionState::Idle,
            }),
        }
    }
}
