// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use pairline_core::types::{AttemptOutcome, SessionState};

/// Register all Pairline metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "pairline_state_transitions_total",
        "Session state transitions by target state"
    );
    describe_counter!(
        "pairline_connection_attempts_total",
        "Finished connection attempts by strategy and outcome"
    );
    describe_gauge!(
        "pairline_active_sessions",
        "Sessions whose actor is currently running"
    );
    describe_counter!(
        "pairline_inbound_messages_total",
        "Inbound messages handed to the handler"
    );
    describe_counter!(
        "pairline_outbound_messages_total",
        "Outbound sends by result"
    );
    describe_histogram!(
        "pairline_send_latency_seconds",
        "Time from send request to transport acknowledgement"
    );
}

/// Record a session entering `to`.
pub fn record_transition(to: SessionState) {
    metrics::counter!("pairline_state_transitions_total", "to" => to.to_string()).increment(1);
}

/// Record the end of a connection attempt.
pub fn record_attempt(strategy: &str, outcome: AttemptOutcome) {
    metrics::counter!(
        "pairline_connection_attempts_total",
        "strategy" => strategy.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set the number of running session actors.
pub fn set_active_sessions(count: usize) {
    metrics::gauge!("pairline_active_sessions").set(count as f64);
}

/// Record an inbound message delivery.
pub fn record_inbound() {
    metrics::counter!("pairline_inbound_messages_total").increment(1);
}

/// Record an outbound send and how long it took.
pub fn record_send(result: &'static str, seconds: f64) {
    metrics::counter!("pairline_outbound_messages_total", "result" => result).increment(1);
    metrics::histogram!("pairline_send_latency_seconds").record(seconds);
}
