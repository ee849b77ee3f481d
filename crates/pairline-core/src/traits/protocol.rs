// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary to the chat-protocol client library.
//!
//! The wire protocol itself is out of scope. The session core only needs to
//! open a link with a given strategy and credential, observe its events, and
//! push a few commands into it.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::LinkError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CloseReason, Credential, InboundMessage, MessageId, OutboundMessage, Strategy, TenantId};

/// Events emitted by an open protocol link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// A new pairing payload (the QR content) pushed by the protocol.
    PairingCode(String),
    /// Handshake completed. Carries the key material to persist.
    Authenticated {
        phone_number: String,
        key_material: Vec<u8>,
    },
    /// Key material rotated while connected.
    CredentialsUpdated(Vec<u8>),
    /// An inbound chat message.
    Message(InboundMessage),
    /// The transport closed. No further events follow.
    Closed(CloseReason),
}

/// Commands accepted by an open link.
#[async_trait]
pub trait LinkControl: Send + Sync {
    /// Asks the protocol for a fresh pairing payload.
    async fn request_pairing_code(&self) -> Result<String, LinkError>;

    /// Sends a message and resolves once the transport acknowledges it.
    async fn send(&self, message: &OutboundMessage) -> Result<MessageId, LinkError>;

    /// Closes the transport. Idempotent.
    async fn close(&self) -> Result<(), LinkError>;
}

/// An open connection: an event stream plus a control handle.
pub struct ProtocolLink {
    pub events: mpsc::Receiver<ProtocolEvent>,
    pub control: Box<dyn LinkControl>,
}

impl std::fmt::Debug for ProtocolLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolLink").finish_non_exhaustive()
    }
}

/// Opens protocol links for tenants.
#[async_trait]
pub trait ProtocolClient: PluginAdapter {
    /// Opens a link using `strategy`.
    ///
    /// With `credential` the link resumes an existing pairing; without it the
    /// link starts a fresh pairing and expects `request_pairing_code` calls.
    async fn open(
        &self,
        tenant: &TenantId,
        strategy: &Strategy,
        credential: Option<&Credential>,
    ) -> Result<ProtocolLink, LinkError>;
}
