// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-keyed table of connection actors.
//!
//! Every mutating operation takes the tenant's guard first, so operations on
//! one tenant are serialized while different tenants run in parallel. Reads
//! never take the guard.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use pairline_core::types::{SessionSnapshot, TenantId};
use pairline_core::PairlineError;

use crate::actor::{SessionHandle, SessionServices};
use crate::dispatcher::InboundFanout;

/// Injectable registry holding at most one running actor per tenant.
pub struct SessionRegistry {
    services: SessionServices,
    inbound: Arc<InboundFanout>,
    /// Per-tenant operation guards. Kept for the registry's lifetime.
    guards: DashMap<TenantId, Arc<Mutex<()>>>,
    handles: DashMap<TenantId, Arc<SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(services: SessionServices, inbound: Arc<InboundFanout>) -> Self {
        Self {
            services,
            inbound,
            guards: DashMap::new(),
            handles: DashMap::new(),
        }
    }

    fn guard(&self, tenant: &TenantId) -> Arc<Mutex<()>> {
        Arc::clone(self.guards.entry(tenant.clone()).or_default().value())
    }

    /// Returns the tenant's running actor, spawning one if there is none.
    ///
    /// Concurrent callers for the same tenant all get the same handle. A
    /// stopped or failed actor is replaced by a fresh one.
    pub async fn get_or_create(&self, tenant: &TenantId) -> Arc<SessionHandle> {
        let guard = self.guard(tenant);
        let _lock = guard.lock().await;

        if let Some(existing) = self.get(tenant)
            && existing.is_running()
        {
            return existing;
        }

        let handle = SessionHandle::spawn(
            tenant.clone(),
            self.services.clone(),
            self.inbound.attach(tenant),
        );
        self.handles.insert(tenant.clone(), Arc::clone(&handle));
        info!(tenant_id = %tenant, "session actor created");
        handle
    }

    /// The tenant's current handle, running or not.
    pub fn get(&self, tenant: &TenantId) -> Option<Arc<SessionHandle>> {
        self.handles.get(tenant).map(|entry| Arc::clone(entry.value()))
    }

    /// Stops the tenant's actor and keeps its entry, which then reads `Idle`.
    pub async fn stop(&self, tenant: &TenantId) -> Result<(), PairlineError> {
        let guard = self.guard(tenant);
        let _lock = guard.lock().await;

        let handle = self
            .get(tenant)
            .ok_or_else(|| PairlineError::SessionNotFound(tenant.to_string()))?;
        handle.stop(self.services.settings.stop_grace).await;
        Ok(())
    }

    /// Deactivates the actor and removes the entry. With `wipe_credential` the
    /// tenant's credential unit is deleted too.
    ///
    /// Returns whether an entry existed.
    pub async fn destroy(
        &self,
        tenant: &TenantId,
        wipe_credential: bool,
    ) -> Result<bool, PairlineError> {
        let guard = self.guard(tenant);
        let _lock = guard.lock().await;

        let removed = self.handles.remove(tenant).map(|(_, handle)| handle);
        if let Some(handle) = &removed {
            handle.deactivate(self.services.settings.stop_grace).await;
        }
        self.inbound.detach(tenant);
        if wipe_credential {
            self.services.credentials.delete(tenant).await?;
        }

        info!(tenant_id = %tenant, existed = removed.is_some(), wipe_credential, "session destroyed");
        Ok(removed.is_some())
    }

    /// Snapshots of every tenant, ordered by tenant id.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<SessionSnapshot> = self
            .handles
            .iter()
            .map(|entry| entry.value().status())
            .collect();
        snapshots.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        snapshots
    }

    /// All handles, for shutdown.
    pub fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.handles
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn services(&self) -> &SessionServices {
        &self.services
    }
}
