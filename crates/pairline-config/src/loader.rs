// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./pairline.toml` > `~/.config/pairline/pairline.toml`
//! > `/etc/pairline/pairline.toml`, with `PAIRLINE_` environment overrides.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PairlineConfig;

/// Config sections reachable through `PAIRLINE_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "agent",
    "credentials",
    "pairing",
    "reconnect",
    "classifier",
    "session",
    "bridge",
    "gateway",
    "inbound",
];

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/pairline/pairline.toml";

/// Config file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "pairline.toml";

/// `~/.config/pairline/pairline.toml`, when a config dir is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pairline").join("pairline.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pairline/pairline.toml`
/// 3. `~/.config/pairline/pairline.toml`
/// 4. `./pairline.toml`
/// 5. `PAIRLINE_*` environment variables
pub fn load_config() -> Result<PairlineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PairlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PairlineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PairlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PairlineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PairlineConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps `PAIRLINE_RECONNECT_MAX_DELAY_MS` to `reconnect.max_delay_ms`.
///
/// Only the leading section name becomes a dot; underscores inside key
/// names are preserved. Variables without a known section are left as-is
/// and rejected by `deny_unknown_fields`.
fn env_provider() -> Env {
    Env::prefixed("PAIRLINE_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
