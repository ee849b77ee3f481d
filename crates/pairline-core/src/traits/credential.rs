// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable per-tenant credential persistence.

use async_trait::async_trait;

use crate::error::PairlineError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Credential, TenantId};

/// Stores one credential unit per tenant.
///
/// Implementations must make `save` atomic with respect to crashes: a reader
/// sees either the previous credential or the new one, never a partial write.
/// Operations on one tenant never touch another tenant's unit.
#[async_trait]
pub trait CredentialStore: PluginAdapter {
    /// Loads the tenant's credential.
    ///
    /// Returns `Ok(None)` when none is stored and
    /// [`PairlineError::CredentialCorrupt`] when one exists but cannot be decoded.
    async fn load(&self, tenant: &TenantId) -> Result<Option<Credential>, PairlineError>;

    /// Replaces the tenant's credential.
    async fn save(&self, tenant: &TenantId, credential: &Credential) -> Result<(), PairlineError>;

    /// Removes the tenant's credential. Deleting a missing credential is not an error.
    async fn delete(&self, tenant: &TenantId) -> Result<(), PairlineError>;

    /// Lists tenants that have a stored credential unit.
    async fn list(&self) -> Result<Vec<TenantId>, PairlineError>;
}
