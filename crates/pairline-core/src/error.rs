// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Pairline gateway.

use std::time::Duration;

use thiserror::Error;

use crate::types::{CloseReason, SessionState};

/// The primary error type used across Pairline traits and core operations.
#[derive(Debug, Error)]
pub enum PairlineError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential storage errors (I/O failure, permission problems).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Protocol client errors (sidecar unreachable, malformed frames).
    #[error("protocol error: {message}")]
    Protocol {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A stored credential could not be decoded.
    #[error("credential for tenant {tenant_id} is corrupt: {reason}")]
    CredentialCorrupt { tenant_id: String, reason: String },

    /// A tenant identifier is not usable as a storage key.
    #[error("invalid tenant id `{0}`")]
    InvalidTenantId(String),

    /// No session exists for the tenant.
    #[error("no session for tenant {0}")]
    SessionNotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors returned synchronously to callers of `send`.
///
/// The core never retries a failed send; retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The tenant's session is not in the `Connected` state.
    #[error("session is not connected (state: {state})")]
    NotConnected { state: SessionState },

    /// The transport did not acknowledge the message in time.
    #[error("send not acknowledged within {duration:?}")]
    Timeout { duration: Duration },

    /// The transport rejected the message.
    #[error("transport rejected message: {0}")]
    Transport(String),

    /// The actor stopped before the send could complete.
    #[error("session closed")]
    SessionClosed,
}

/// Failures reported by a protocol link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The underlying transport closed.
    #[error("link closed: {0}")]
    Closed(CloseReason),

    /// A protocol operation did not complete in time.
    #[error("link operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Any other protocol-level failure.
    #[error("link error: {0}")]
    Protocol(String),
}

impl LinkError {
    /// The close reason used for disconnect classification.
    pub fn close_reason(&self, during_handshake: bool) -> CloseReason {
        match self {
            LinkError::Closed(reason) => reason.clone(),
            LinkError::Timeout { duration } => CloseReason {
                code: None,
                message: format!("timed out after {duration:?}"),
                during_handshake,
            },
            LinkError::Protocol(message) => CloseReason {
                code: None,
                message: message.clone(),
                during_handshake,
            },
        }
    }
}

impl From<std::io::Error> for PairlineError {
    fn from(err: std::io::Error) -> Self {
        PairlineError::Storage {
            source: Box::new(err),
        }
    }
}
