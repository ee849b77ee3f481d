// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON frames exchanged with the protocol sidecar.
//!
//! Every frame is a text WebSocket message holding one object tagged by
//! `type`. Key material travels as standard base64.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pairline_core::types::Strategy;

/// Frames sent from the gateway to the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every connection.
    Open {
        tenant_id: String,
        strategy: Strategy,
        /// Base64 key material of the stored credential, when resuming.
        #[serde(skip_serializing_if = "Option::is_none")]
        credential: Option<String>,
    },
    RequestPairing {
        request_id: String,
    },
    Send {
        request_id: String,
        recipient: String,
        content: String,
    },
    Close,
}

/// Frames sent from the sidecar to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarFrame {
    /// A pairing payload. Carries `request_id` when it answers a request.
    PairingCode {
        #[serde(default)]
        request_id: Option<String>,
        code: String,
    },
    Authenticated {
        phone_number: String,
        key_material: String,
    },
    CredentialsUpdated {
        key_material: String,
    },
    Message {
        id: String,
        sender_id: String,
        content: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    SendAck {
        request_id: String,
        message_id: String,
    },
    /// A request failed. Without `request_id` it is only logged.
    Error {
        #[serde(default)]
        request_id: Option<String>,
        message: String,
    },
    Closed {
        #[serde(default)]
        code: Option<u16>,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        during_handshake: Option<bool>,
    },
}

impl ClientFrame {
    pub fn open(tenant_id: &str, strategy: &Strategy, key_material: Option<&[u8]>) -> Self {
        ClientFrame::Open {
            tenant_id: tenant_id.to_string(),
            strategy: strategy.clone(),
            credential: key_material.map(encode_key),
        }
    }
}

pub fn encode_key(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_key(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded.as_bytes())
}
