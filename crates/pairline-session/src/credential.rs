// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed credential store.
//!
//! Layout: `<root>/<tenant_id>/credential.json`. Each tenant owns one
//! directory, so a unit can be listed, backed up or wiped on its own.
//! Writes go to a temp file in the tenant directory and are renamed over
//! the live file after an fsync.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use pairline_core::traits::adapter::PluginAdapter;
use pairline_core::traits::credential::CredentialStore;
use pairline_core::types::{AdapterType, Credential, HealthStatus, TenantId};
use pairline_core::PairlineError;

const CREDENTIAL_FILE: &str = "credential.json";
const TEMP_FILE: &str = "credential.json.tmp";

/// Stores one JSON credential unit per tenant under a root directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the tenant's unit.
    pub fn unit_dir(&self, tenant: &TenantId) -> PathBuf {
        self.root.join(tenant.as_str())
    }

    /// Path of the tenant's credential file.
    pub fn unit_path(&self, tenant: &TenantId) -> PathBuf {
        self.unit_dir(tenant).join(CREDENTIAL_FILE)
    }

    /// Copy the tenant's credential file to `destination`.
    ///
    /// Returns [`PairlineError::SessionNotFound`] when the tenant has no unit.
    pub async fn backup(&self, tenant: &TenantId, destination: &Path) -> Result<u64, PairlineError> {
        let source = self.unit_path(tenant);
        match fs::copy(&source, destination).await {
            Ok(bytes) => {
                debug!(tenant_id = %tenant, destination = %destination.display(), "credential backed up");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PairlineError::SessionNotFound(tenant.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PluginAdapter for FileCredentialStore {
    fn name(&self) -> &str {
        "file-credentials"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CredentialStore
    }

    async fn health_check(&self) -> Result<HealthStatus, PairlineError> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Unhealthy(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HealthStatus::Degraded(
                format!("{} does not exist yet", self.root.display()),
            )),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), PairlineError> {
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self, tenant: &TenantId) -> Result<Option<Credential>, PairlineError> {
        let path = self.unit_path(tenant);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let credential: Credential =
            serde_json::from_slice(&content).map_err(|e| PairlineError::CredentialCorrupt {
                tenant_id: tenant.to_string(),
                reason: e.to_string(),
            })?;

        if &credential.tenant_id != tenant {
            return Err(PairlineError::CredentialCorrupt {
                tenant_id: tenant.to_string(),
                reason: format!("unit belongs to tenant {}", credential.tenant_id),
            });
        }
        if credential.key_material.is_empty() {
            return Err(PairlineError::CredentialCorrupt {
                tenant_id: tenant.to_string(),
                reason: "empty key material".to_string(),
            });
        }

        Ok(Some(credential))
    }

    async fn save(&self, tenant: &TenantId, credential: &Credential) -> Result<(), PairlineError> {
        let dir = self.unit_dir(tenant);
        fs::create_dir_all(&dir).await?;

        let content = serde_json::to_vec_pretty(credential).map_err(|e| PairlineError::Storage {
            source: Box::new(e),
        })?;

        let temp_path = dir.join(TEMP_FILE);
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&temp_path, dir.join(CREDENTIAL_FILE)).await?;
        debug!(tenant_id = %tenant, version = credential.version, "credential saved");
        Ok(())
    }

    async fn delete(&self, tenant: &TenantId) -> Result<(), PairlineError> {
        match fs::remove_dir_all(self.unit_dir(tenant)).await {
            Ok(()) => {
                debug!(tenant_id = %tenant, "credential deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<TenantId>, PairlineError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tenants = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Ok(tenant) = TenantId::parse(&name) else {
                continue;
            };
            if fs::try_exists(entry.path().join(CREDENTIAL_FILE))
                .await
                .unwrap_or(false)
            {
                tenants.push(tenant);
            }
        }
        tenants.sort();
        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    fn credential(raw: &str, version: u32) -> Credential {
        Credential {
            tenant_id: tenant(raw),
            key_material: format!("keys-{raw}-{version}").into_bytes(),
            version,
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let cred = credential("acme", 1);

        store.save(&cred.tenant_id, &cred).await.unwrap();
        assert_eq!(store.load(&cred.tenant_id).await.unwrap(), Some(cred.clone()));
        assert!(!store.unit_dir(&cred.tenant_id).join(TEMP_FILE).exists());
    }

    #[tokio::test]
    async fn missing_unit_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("not-created"));
        assert_eq!(store.load(&tenant("acme")).await.unwrap(), None);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_is_reported_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let acme = tenant("acme");
        std::fs::create_dir_all(store.unit_dir(&acme)).unwrap();
        std::fs::write(store.unit_path(&acme), b"{\"tenant_id\": \"ac").unwrap();

        assert!(matches!(
            store.load(&acme).await,
            Err(PairlineError::CredentialCorrupt { .. })
        ));
    }

    #[tokio::test]
    async fn unit_of_another_tenant_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let beta = credential("beta", 1);
        let acme = tenant("acme");
        std::fs::create_dir_all(store.unit_dir(&acme)).unwrap();
        std::fs::write(store.unit_path(&acme), serde_json::to_vec(&beta).unwrap()).unwrap();

        assert!(matches!(
            store.load(&acme).await,
            Err(PairlineError::CredentialCorrupt { .. })
        ));
    }

    #[tokio::test]
    async fn overwrite_replaces_whole_unit() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let v1 = credential("acme", 1);
        let v2 = credential("acme", 2);

        store.save(&v1.tenant_id, &v1).await.unwrap();
        store.save(&v2.tenant_id, &v2).await.unwrap();
        assert_eq!(store.load(&v1.tenant_id).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn stale_temp_file_does_not_affect_load() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let cred = credential("acme", 1);
        store.save(&cred.tenant_id, &cred).await.unwrap();

        // A crash between write and rename leaves only the temp file behind.
        std::fs::write(store.unit_dir(&cred.tenant_id).join(TEMP_FILE), b"partial").unwrap();
        assert_eq!(store.load(&cred.tenant_id).await.unwrap(), Some(cred));
    }

    #[tokio::test]
    async fn delete_is_isolated_per_tenant() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let acme = credential("acme", 1);
        let beta = credential("beta", 1);
        store.save(&acme.tenant_id, &acme).await.unwrap();
        store.save(&beta.tenant_id, &beta).await.unwrap();

        store.delete(&acme.tenant_id).await.unwrap();
        store.delete(&acme.tenant_id).await.unwrap();

        assert_eq!(store.load(&acme.tenant_id).await.unwrap(), None);
        assert_eq!(store.load(&beta.tenant_id).await.unwrap(), Some(beta.clone()));
        assert_eq!(store.list().await.unwrap(), vec![beta.tenant_id]);
    }

    #[tokio::test]
    async fn list_skips_foreign_entries() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let cred = credential("acme", 1);
        store.save(&cred.tenant_id, &cred).await.unwrap();
        std::fs::create_dir_all(dir.path().join("empty-tenant")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        assert_eq!(store.list().await.unwrap(), vec![cred.tenant_id]);
    }

    #[tokio::test]
    async fn backup_copies_unit() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("creds"));
        let cred = credential("acme", 3);
        store.save(&cred.tenant_id, &cred).await.unwrap();

        let target = dir.path().join("acme-backup.json");
        store.backup(&cred.tenant_id, &target).await.unwrap();
        let restored: Credential =
            serde_json::from_slice(&std::fs::read(&target).unwrap()).unwrap();
        assert_eq!(restored, cred);

        assert!(matches!(
            store.backup(&tenant("ghost"), &target).await,
            Err(PairlineError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn health_reflects_root_directory() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);

        let missing = FileCredentialStore::new(dir.path().join("missing"));
        assert!(matches!(
            missing.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
