// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Pairline gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;
use std::time::Duration;

use pairline_core::types::{ClientIdentity, Strategy};
use serde::{Deserialize, Serialize};

/// Top-level Pairline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PairlineConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Where per-tenant credential units live.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// QR pairing flow settings.
    #[serde(default)]
    pub pairing: PairingConfig,

    /// Backoff and retry caps.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Close-code classification.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Per-tenant actor limits and timeouts.
    #[serde(default)]
    pub session: SessionConfig,

    /// Optional replacement for the built-in strategy catalog.
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,

    /// Protocol sidecar connection.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Management HTTP surface.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Inbound message forwarding.
    #[serde(default)]
    pub inbound: InboundConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in logs and health output.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "pairline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Credential storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Directory holding one subdirectory per tenant.
    #[serde(default = "default_credentials_directory")]
    pub directory: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            directory: default_credentials_directory(),
        }
    }
}

fn default_credentials_directory() -> String {
    dirs::data_dir()
        .map(|p| p.join("pairline").join("credentials"))
        .unwrap_or_else(|| PathBuf::from("./credentials"))
        .display()
        .to_string()
}

/// Pairing (QR) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PairingConfig {
    /// Seconds between pairing code refreshes while unscanned.
    #[serde(default = "default_qr_refresh_interval_secs")]
    pub qr_refresh_interval_secs: u64,

    /// Refreshes allowed before the pairing times out.
    #[serde(default = "default_max_qr_refreshes")]
    pub max_qr_refreshes: u32,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            qr_refresh_interval_secs: default_qr_refresh_interval_secs(),
            max_qr_refreshes: default_max_qr_refreshes(),
        }
    }
}

impl PairingConfig {
    pub fn qr_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.qr_refresh_interval_secs)
    }
}

fn default_qr_refresh_interval_secs() -> u64 {
    20
}

fn default_max_qr_refreshes() -> u32 {
    5
}

/// Reconnection backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Relative jitter applied to every delay (0.2 = ±20%).
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,

    /// Failed attempts allowed since the last successful connection.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wall-clock budget for retries since the first failure.
    #[serde(default = "default_max_elapsed_secs")]
    pub max_elapsed_secs: u64,

    /// Full passes over the strategy catalog before giving up.
    #[serde(default = "default_max_strategy_cycles")]
    pub max_strategy_cycles: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: default_jitter_ratio(),
            max_attempts: default_max_attempts(),
            max_elapsed_secs: default_max_elapsed_secs(),
            max_strategy_cycles: default_max_strategy_cycles(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter_ratio() -> f64 {
    0.2
}

fn default_max_attempts() -> u32 {
    20
}

fn default_max_elapsed_secs() -> u64 {
    1_800
}

fn default_max_strategy_cycles() -> u32 {
    3
}

/// Disconnect classification rules.
///
/// The signal that separates an environment-induced close from an ordinary
/// drop differs between hosting setups, so it is configured rather than fixed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Codes treated as abnormal (advance to the next strategy).
    #[serde(default = "default_abnormal_close_codes")]
    pub abnormal_close_codes: Vec<u16>,

    /// Codes meaning the device was unpaired.
    #[serde(default = "default_logged_out_codes")]
    pub logged_out_codes: Vec<u16>,

    /// Codes meaning the stored credential was rejected.
    #[serde(default = "default_bad_session_codes")]
    pub bad_session_codes: Vec<u16>,

    /// Treat any close before handshake completion as abnormal.
    #[serde(default = "default_true")]
    pub handshake_close_is_abnormal: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            abnormal_close_codes: default_abnormal_close_codes(),
            logged_out_codes: default_logged_out_codes(),
            bad_session_codes: default_bad_session_codes(),
            handshake_close_is_abnormal: true,
        }
    }
}

fn default_abnormal_close_codes() -> Vec<u16> {
    vec![1006, 428]
}

fn default_logged_out_codes() -> Vec<u16> {
    vec![401]
}

fn default_bad_session_codes() -> Vec<u16> {
    vec![500]
}

fn default_true() -> bool {
    true
}

/// Per-tenant actor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Time allowed for a send acknowledgement.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Time allowed for an actor to wind down on stop.
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,

    /// Bounded inbound queue per tenant.
    #[serde(default = "default_inbound_queue_capacity")]
    pub inbound_queue_capacity: usize,

    /// Bounded command queue per tenant (sends, stop).
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,

    /// Connection attempts kept for diagnostics.
    #[serde(default = "default_attempt_history")]
    pub attempt_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: default_send_timeout_secs(),
            stop_grace_secs: default_stop_grace_secs(),
            inbound_queue_capacity: default_inbound_queue_capacity(),
            command_queue_capacity: default_command_queue_capacity(),
            attempt_history: default_attempt_history(),
        }
    }
}

fn default_send_timeout_secs() -> u64 {
    15
}

fn default_stop_grace_secs() -> u64 {
    5
}

fn default_inbound_queue_capacity() -> usize {
    256
}

fn default_command_queue_capacity() -> usize {
    64
}

fn default_attempt_history() -> usize {
    16
}

/// One entry of a custom strategy catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub name: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Advertised client as `[platform, browser, version]`.
    #[serde(default = "default_browser")]
    pub browser: [String; 3],

    #[serde(default)]
    pub sync_full_history: bool,

    #[serde(default)]
    pub legacy_encoding: bool,
}

impl StrategyConfig {
    pub fn to_strategy(&self) -> Strategy {
        let [platform, browser, version] = self.browser.clone();
        Strategy {
            name: self.name.clone(),
            connect_timeout_secs: self.connect_timeout_secs,
            handshake_timeout_secs: self.handshake_timeout_secs,
            keepalive_secs: self.keepalive_secs,
            identity: ClientIdentity {
                platform,
                browser,
                version,
            },
            sync_full_history: self.sync_full_history,
            legacy_encoding: self.legacy_encoding,
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_handshake_timeout_secs() -> u64 {
    60
}

fn default_keepalive_secs() -> u64 {
    30
}

fn default_browser() -> [String; 3] {
    [
        "Pairline".to_string(),
        "Chrome".to_string(),
        "1.0.0".to_string(),
    ]
}

/// Protocol sidecar configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// WebSocket endpoint of the protocol sidecar.
    #[serde(default = "default_bridge_url")]
    pub url: String,

    #[serde(default = "default_bridge_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            connect_timeout_secs: default_bridge_connect_timeout_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:3781/link".to_string()
}

fn default_bridge_connect_timeout_secs() -> u64 {
    10
}

/// Management HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for `/v1/*`. `None` rejects every request.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3780
}

/// Inbound message forwarding configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InboundConfig {
    /// URL receiving a JSON POST per inbound message. Unset: messages are only logged.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Optional bearer token sent with webhook calls.
    #[serde(default)]
    pub webhook_token: Option<String>,
}
