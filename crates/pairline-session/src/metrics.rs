// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric hooks. Forward to `pairline-prometheus` when the `prometheus`
//! feature is enabled and compile to nothing otherwise.

#[cfg(feature = "prometheus")]
pub(crate) use pairline_prometheus::{
    record_attempt, record_inbound, record_send, record_transition, set_active_sessions,
};

#[cfg(not(feature = "prometheus"))]
mod noop {
    use pairline_core::types::{AttemptOutcome, SessionState};

    pub(crate) fn record_transition(_to: SessionState) {}
    pub(crate) fn record_attempt(_strategy: &str, _outcome: AttemptOutcome) {}
    pub(crate) fn set_active_sessions(_count: usize) {}
    pub(crate) fn record_inbound() {}
    pub(crate) fn record_send(_result: &'static str, _seconds: f64) {}
}

#[cfg(not(feature = "prometheus"))]
pub(crate) use noop::*;
