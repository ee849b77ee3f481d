// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Disconnect classification.
//!
//! Which close codes mean "logged out", "bad session" or "environment
//! problem" varies by deployment, so every rule comes from `[classifier]`.

use pairline_config::model::ClassifierConfig;
use pairline_core::types::{CloseReason, ErrorClass};

/// Maps a transport [`CloseReason`] to an [`ErrorClass`].
#[derive(Debug, Clone)]
pub struct DisconnectClassifier {
    logged_out_codes: Vec<u16>,
    bad_session_codes: Vec<u16>,
    abnormal_close_codes: Vec<u16>,
    handshake_close_is_abnormal: bool,
}

impl DisconnectClassifier {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            logged_out_codes: config.logged_out_codes.clone(),
            bad_session_codes: config.bad_session_codes.clone(),
            abnormal_close_codes: config.abnormal_close_codes.clone(),
            handshake_close_is_abnormal: config.handshake_close_is_abnormal,
        }
    }

    /// Rules in priority order: logged out, bad session, abnormal code,
    /// close before handshake completion, and transient for everything else.
    pub fn classify(&self, reason: &CloseReason) -> ErrorClass {
        if let Some(code) = reason.code {
            if self.logged_out_codes.contains(&code) {
                return ErrorClass::LoggedOut;
            }
            if self.bad_session_codes.contains(&code) {
                return ErrorClass::CredentialCorrupt;
            }
            if self.abnormal_close_codes.contains(&code) {
                return ErrorClass::Abnormal;
            }
        }
        if reason.during_handshake && self.handshake_close_is_abnormal {
            return ErrorClass::Abnormal;
        }
        ErrorClass::Transient
    }
}

impl Default for DisconnectClassifier {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}
