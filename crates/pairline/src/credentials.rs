// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pairline credentials` maintenance commands.
//!
//! Operate on the credential directory directly, so they also work while
//! the gateway is down. Deleting the unit of a running tenant only takes
//! effect on its next reconnect.

use std::path::Path;

use pairline_core::traits::credential::CredentialStore;
use pairline_core::types::TenantId;
use pairline_core::PairlineError;
use pairline_session::FileCredentialStore;

/// Lists tenants with a stored credential.
pub async fn run_list(store: &FileCredentialStore) -> Result<(), PairlineError> {
    let tenants = store.list().await?;
    if tenants.is_empty() {
        println!("no stored credentials in {}", store.root().display());
        return Ok(());
    }

    for tenant in tenants {
        match store.load(&tenant).await {
            Ok(Some(credential)) => println!(
                "{:<24} v{:<4} saved {}",
                tenant,
                credential.version,
                credential.saved_at.to_rfc3339()
            ),
            Ok(None) => println!("{tenant:<24} (missing)"),
            Err(e) => println!("{tenant:<24} unreadable: {e}"),
        }
    }
    Ok(())
}

/// Deletes one tenant's credential unit.
pub async fn run_delete(store: &FileCredentialStore, tenant: &str) -> Result<(), PairlineError> {
    let tenant = TenantId::parse(tenant)?;
    if !store.unit_dir(&tenant).exists() {
        return Err(PairlineError::SessionNotFound(tenant.to_string()));
    }
    store.delete(&tenant).await?;
    println!("deleted credential for {tenant}");
    Ok(())
}

/// Copies one tenant's credential unit to `destination`.
pub async fn run_backup(
    store: &FileCredentialStore,
    tenant: &str,
    destination: &Path,
) -> Result<(), PairlineError> {
    let tenant = TenantId::parse(tenant)?;
    let bytes = store.backup(&tenant, destination).await?;
    println!(
        "backed up credential for {tenant} to {} ({bytes} bytes)",
        destination.display()
    );
    Ok(())
}
