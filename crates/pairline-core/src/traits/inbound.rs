// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hook for the external message-handling collaborator.

use async_trait::async_trait;

use crate::error::PairlineError;
use crate::types::InboundMessage;

/// Receives inbound messages from connected tenants.
///
/// Delivery is at-least-once: the same message id may arrive more than once
/// and implementations must handle it idempotently. Retries and backpressure
/// beyond the per-tenant queue are the handler's own concern.
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    async fn on_inbound_message(&self, message: InboundMessage) -> Result<(), PairlineError>;
}
