// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the session core, the protocol bridge and the gateway.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::PairlineError;

/// Maximum length of a tenant identifier.
const MAX_TENANT_ID_LEN: usize = 128;

/// Identifier of a business tenant. Also the name of its credential unit on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    /// Validates `raw` as a tenant id.
    ///
    /// Allowed: ASCII alphanumerics, `-`, `_` and `.`, not starting with `.`.
    pub fn parse(raw: &str) -> Result<Self, PairlineError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_TENANT_ID_LEN
            && !raw.starts_with('.')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(PairlineError::InvalidTenantId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a message, as assigned by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Protocol,
    CredentialStore,
    Observability,
}

/// Lifecycle states of a tenant's connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not connected and not trying to connect.
    Idle,
    /// Loading credentials and opening the transport.
    Initializing,
    /// Waiting for a device to scan the pairing code.
    AwaitingPairing,
    /// Resuming with stored credentials.
    Authenticating,
    /// Handshake complete; messages flow both ways.
    Connected,
    /// Transport closed; about to decide what happens next.
    Disconnected,
    /// Waiting out the reconnect delay.
    ReconnectPending,
    /// Terminal. Needs an explicit fresh creation.
    Failed,
}

impl SessionState {
    /// `Failed` is the only terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Failed)
    }
}

/// Classification of a transport closure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The device was unpaired or the account logged out. Permanent.
    LoggedOut,
    /// The stored credential was rejected by the server.
    CredentialCorrupt,
    /// Environment or compatibility failure, typically a close before the
    /// handshake completed. Retried with the next strategy.
    Abnormal,
    /// Ordinary network drop. Retried with the same strategy.
    Transient,
}

/// Why a session stopped trying, surfaced as `last_error` in status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PairingTimeout,
    AbnormalDisconnect,
    TransientNetworkError,
    CredentialCorrupt,
    StrategyExhausted,
    RetryBudgetExhausted,
    LoggedOut,
    Deactivated,
    Internal,
}

impl From<ErrorClass> for FailureReason {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::LoggedOut => FailureReason::LoggedOut,
            ErrorClass::CredentialCorrupt => FailureReason::CredentialCorrupt,
            ErrorClass::Abnormal => FailureReason::AbnormalDisconnect,
            ErrorClass::Transient => FailureReason::TransientNetworkError,
        }
    }
}

/// What the transport reported when it closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    /// Protocol or WebSocket status code, when one was given.
    pub code: Option<u16>,
    pub message: String,
    /// True when the close happened before the handshake completed.
    pub during_handshake: bool,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Client identity advertised to the protocol server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub platform: String,
    pub browser: String,
    pub version: String,
}

/// A named, immutable bundle of connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub connect_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    pub keepalive_secs: u64,
    pub identity: ClientIdentity,
    /// Request full history sync on login.
    pub sync_full_history: bool,
    /// Use the legacy-compatible frame encoding.
    pub legacy_encoding: bool,
}

impl Strategy {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// Durable authentication material for one tenant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub tenant_id: TenantId,
    /// Opaque key material produced by the protocol layer.
    #[serde(with = "base64_bytes")]
    pub key_material: Vec<u8>,
    /// Incremented on every save.
    pub version: u32,
    pub saved_at: DateTime<Utc>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("tenant_id", &self.tenant_id)
            .field("key_material", &format_args!("[{} bytes]", self.key_material.len()))
            .field("version", &self.version)
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// How a connection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Connected,
    Failed,
    PairingTimeout,
    Cancelled,
}

/// Diagnostic record of one connection attempt. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAttempt {
    pub tenant_id: TenantId,
    pub strategy_name: String,
    pub strategy_index: usize,
    pub started_at: DateTime<Utc>,
    /// `None` while the attempt is still in progress.
    pub outcome: Option<AttemptOutcome>,
    pub error_class: Option<ErrorClass>,
}

/// Read-only snapshot of a tenant's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub tenant_id: TenantId,
    pub state: SessionState,
    pub phone_number: Option<String>,
    pub qr_payload: Option<String>,
    pub qr_generated_at: Option<DateTime<Utc>>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
    pub active_strategy_index: usize,
    pub active_strategy: Option<String>,
    pub last_error: Option<FailureReason>,
    pub recent_attempts: Vec<ConnectionAttempt>,
}

impl SessionSnapshot {
    /// A fresh, idle snapshot.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            state: SessionState::Idle,
            phone_number: None,
            qr_payload: None,
            qr_generated_at: None,
            last_connected_at: None,
            reconnect_attempts: 0,
            active_strategy_index: 0,
            active_strategy: None,
            last_error: None,
            recent_attempts: Vec::new(),
        }
    }
}

/// One state change of a session, broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub tenant_id: TenantId,
    pub from: SessionState,
    pub to: SessionState,
    pub strategy_index: usize,
    pub at: DateTime<Utc>,
}

/// A message received on a tenant's connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Protocol message id; handlers deduplicate on it.
    pub id: String,
    pub tenant_id: TenantId,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A message to send on a tenant's connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_accepts_safe_names() {
        for raw in ["acme", "beta-2", "tenant_01", "a.b"] {
            assert!(TenantId::parse(raw).is_ok(), "{raw} should be accepted");
        }
    }

    #[test]
    fn tenant_id_rejects_path_like_names() {
        for raw in ["", "../etc", ".hidden", "a/b", "a b", "ü"] {
            assert!(TenantId::parse(raw).is_err(), "{raw:?} should be rejected");
        }
        let long = "x".repeat(MAX_TENANT_ID_LEN + 1);
        assert!(TenantId::parse(&long).is_err());
    }

    #[test]
    fn session_state_snake_case() {
        assert_eq!(SessionState::AwaitingPairing.to_string(), "awaiting_pairing");
        assert_eq!(
            serde_json::to_string(&SessionState::ReconnectPending).unwrap(),
            "\"reconnect_pending\""
        );
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
    }

    #[test]
    fn credential_key_material_is_base64_in_json() {
        let cred = Credential {
            tenant_id: TenantId("acme".into()),
            key_material: vec![0, 1, 2, 255],
            version: 3,
            saved_at: Utc::now(),
        };
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["key_material"], "AAEC/w==");
        let back: Credential = serde_json::from_value(json).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn credential_debug_hides_key_material() {
        let cred = Credential {
            tenant_id: TenantId("acme".into()),
            key_material: b"secret".to_vec(),
            version: 1,
            saved_at: Utc::now(),
        };
        let debug = format!("{cred:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[6 bytes]"));
    }

    #[test]
    fn error_class_maps_to_failure_reason() {
        assert_eq!(
            FailureReason::from(ErrorClass::Abnormal),
            FailureReason::AbnormalDisconnect
        );
        assert_eq!(
            FailureReason::from(ErrorClass::LoggedOut),
            FailureReason::LoggedOut
        );
    }

    #[test]
    fn close_reason_display_includes_code() {
        let reason = CloseReason {
            code: Some(1006),
            message: "abnormal closure".into(),
            during_handshake: true,
        };
        assert_eq!(reason.to_string(), "abnormal closure (code 1006)");
    }
}
