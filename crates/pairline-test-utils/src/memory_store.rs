// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory credential store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use pairline_core::traits::adapter::PluginAdapter;
use pairline_core::traits::credential::CredentialStore;
use pairline_core::types::{AdapterType, Credential, HealthStatus, TenantId};
use pairline_core::PairlineError;

/// Credential store backed by a map, with a switch to simulate corrupt units.
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: Mutex<HashMap<TenantId, Credential>>,
    corrupt: Mutex<HashSet<TenantId>>,
    saves: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a credential without counting it as a save.
    pub async fn insert(&self, credential: Credential) {
        self.credentials
            .lock()
            .await
            .insert(credential.tenant_id.clone(), credential);
    }

    /// Current credential for `tenant`, bypassing corruption.
    pub async fn get(&self, tenant: &TenantId) -> Option<Credential> {
        self.credentials.lock().await.get(tenant).cloned()
    }

    /// Make `load` report the tenant's unit as corrupt until it is deleted or saved.
    pub async fn mark_corrupt(&self, tenant: &TenantId) {
        self.corrupt.lock().await.insert(tenant.clone());
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MemoryCredentialStore {
    fn name(&self) -> &str {
        "memory-credentials"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CredentialStore
    }

    async fn health_check(&self) -> Result<HealthStatus, PairlineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PairlineError> {
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, tenant: &TenantId) -> Result<Option<Credential>, PairlineError> {
        if self.corrupt.lock().await.contains(tenant) {
            return Err(PairlineError::CredentialCorrupt {
                tenant_id: tenant.to_string(),
                reason: "marked corrupt".to_string(),
            });
        }
        Ok(self.credentials.lock().await.get(tenant).cloned())
    }

    async fn save(&self, tenant: &TenantId, credential: &Credential) -> Result<(), PairlineError> {
        self.corrupt.lock().await.remove(tenant);
        self.credentials
            .lock()
            .await
            .insert(tenant.clone(), credential.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, tenant: &TenantId) -> Result<(), PairlineError> {
        self.corrupt.lock().await.remove(tenant);
        self.credentials.lock().await.remove(tenant);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TenantId>, PairlineError> {
        let mut tenants: Vec<TenantId> = self.credentials.lock().await.keys().cloned().collect();
        tenants.sort();
        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn credential(tenant: &str) -> Credential {
        Credential {
            tenant_id: TenantId::parse(tenant).unwrap(),
            key_material: vec![1, 2, 3],
            version: 1,
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn corrupt_unit_fails_load_until_deleted() {
        let store = MemoryCredentialStore::new();
        let cred = credential("acme");
        store.insert(cred.clone()).await;
        store.mark_corrupt(&cred.tenant_id).await;

        assert!(matches!(
            store.load(&cred.tenant_id).await,
            Err(PairlineError::CredentialCorrupt { .. })
        ));

        store.delete(&cred.tenant_id).await.unwrap();
        assert_eq!(store.load(&cred.tenant_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_is_sorted_and_counts_saves() {
        let store = MemoryCredentialStore::new();
        for tenant in ["beta", "acme"] {
            let cred = credential(tenant);
            store.save(&cred.tenant_id, &cred).await.unwrap();
        }
        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|t| t.0).collect();
        assert_eq!(names, ["acme", "beta"]);
        assert_eq!(store.save_count(), 2);
    }
}
