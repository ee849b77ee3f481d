// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered catalog of connection strategies.
//!
//! The catalog is fixed once built. The reconnection scheduler walks it by
//! index; index 0 is used for every fresh pairing.

use pairline_config::model::StrategyConfig;
use pairline_core::types::{ClientIdentity, Strategy};
use pairline_core::PairlineError;

/// An immutable, non-empty sequence of strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyCatalog {
    strategies: Vec<Strategy>,
}

impl StrategyCatalog {
    /// Builds a catalog from explicit strategies. Fails when empty.
    pub fn new(strategies: Vec<Strategy>) -> Result<Self, PairlineError> {
        if strategies.is_empty() {
            return Err(PairlineError::Config(
                "strategy catalog must contain at least one strategy".to_string(),
            ));
        }
        Ok(Self { strategies })
    }

    /// The built-in catalog, from most conservative to most compatible.
    pub fn builtin() -> Self {
        Self {
            strategies: vec![
                builtin_strategy("conservative", 60, 90, 30, ("Pairline", "Chrome", "1.0.0"), true, false),
                builtin_strategy("alternate-identity", 45, 60, 25, ("Ubuntu", "Firefox", "22.04.4"), true, false),
                builtin_strategy("minimal-features", 30, 45, 20, ("Pairline", "Desktop", "1.0.0"), false, false),
                builtin_strategy("legacy-encoding", 30, 60, 30, ("Windows", "Edge", "10.0.22631"), false, true),
            ],
        }
    }

    /// Uses `[[strategies]]` from the config, or the built-in catalog when none are given.
    pub fn from_config(configs: &[StrategyConfig]) -> Result<Self, PairlineError> {
        if configs.is_empty() {
            return Ok(Self::builtin());
        }
        Self::new(configs.iter().map(StrategyConfig::to_strategy).collect())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategy at `index`, wrapping past the end.
    pub fn get(&self, index: usize) -> &Strategy {
        &self.strategies[index % self.strategies.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name.as_str()).collect()
    }
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_strategy(
    name: &str,
    connect_timeout_secs: u64,
    handshake_timeout_secs: u64,
    keepalive_secs: u64,
    (platform, browser, version): (&str, &str, &str),
    sync_full_history: bool,
    legacy_encoding: bool,
) -> Strategy {
    Strategy {
        name: name.to_string(),
        connect_timeout_secs,
        handshake_timeout_secs,
        keepalive_secs,
        identity: ClientIdentity {
            platform: platform.to_string(),
            browser: browser.to_string(),
            version: version.to_string(),
        },
        sync_full_history,
        legacy_encoding,
    }
}
