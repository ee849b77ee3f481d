// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde attributes cannot express: ordering between
//! delays, ratio ranges, non-zero timeouts, unique strategy names.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::PairlineConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing on the first one.
pub fn validate_config(config: &PairlineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.credentials.directory.trim().is_empty() {
        invalid("credentials.directory must not be empty".to_string());
    }

    if config.pairing.qr_refresh_interval_secs == 0 {
        invalid("pairing.qr_refresh_interval_secs must be greater than 0".to_string());
    }
    if config.pairing.max_qr_refreshes == 0 {
        invalid("pairing.max_qr_refreshes must be at least 1".to_string());
    }

    let reconnect = &config.reconnect;
    if reconnect.base_delay_ms == 0 {
        invalid("reconnect.base_delay_ms must be greater than 0".to_string());
    }
    if reconnect.base_delay_ms > reconnect.max_delay_ms {
        invalid(format!(
            "reconnect.base_delay_ms ({}) must not exceed reconnect.max_delay_ms ({})",
            reconnect.base_delay_ms, reconnect.max_delay_ms
        ));
    }
    if !(0.0..1.0).contains(&reconnect.jitter_ratio) {
        invalid(format!(
            "reconnect.jitter_ratio must be in [0, 1), got {}",
            reconnect.jitter_ratio
        ));
    }
    if reconnect.max_attempts == 0 {
        invalid("reconnect.max_attempts must be at least 1".to_string());
    }
    if reconnect.max_strategy_cycles == 0 {
        invalid("reconnect.max_strategy_cycles must be at least 1".to_string());
    }

    if config.session.send_timeout_secs == 0 {
        invalid("session.send_timeout_secs must be greater than 0".to_string());
    }
    if config.session.inbound_queue_capacity == 0 {
        invalid("session.inbound_queue_capacity must be greater than 0".to_string());
    }
    if config.session.command_queue_capacity == 0 {
        invalid("session.command_queue_capacity must be greater than 0".to_string());
    }

    let mut seen = HashSet::new();
    for (i, strategy) in config.strategies.iter().enumerate() {
        if strategy.name.trim().is_empty() {
            invalid(format!("strategies[{i}].name must not be empty"));
        } else if !seen.insert(strategy.name.as_str()) {
            invalid(format!(
                "duplicate strategy name `{}` in [[strategies]]",
                strategy.name
            ));
        }
        if strategy.connect_timeout_secs == 0 || strategy.handshake_timeout_secs == 0 {
            invalid(format!(
                "strategies[{i}] timeouts must be greater than 0"
            ));
        }
    }

    if config.gateway.enabled && config.gateway.host.trim().is_empty() {
        invalid("gateway.host must not be empty".to_string());
    }

    if !config.bridge.url.starts_with("ws://") && !config.bridge.url.starts_with("wss://") {
        invalid(format!(
            "bridge.url must be a ws:// or wss:// URL, got `{}`",
            config.bridge.url
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
