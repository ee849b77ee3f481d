// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Pairline gateway.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text via [`PrometheusAdapter::render`], which the
//! gateway exposes on `/metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use pairline_core::traits::adapter::PluginAdapter;
use pairline_core::types::{AdapterType, HealthStatus};
use pairline_core::PairlineError;

pub use recording::{
    record_attempt, record_inbound, record_send, record_transition, register_metrics,
    set_active_sessions,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and keeps a handle for rendering.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, PairlineError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            PairlineError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// A cloneable render function for the gateway's `/metrics` route.
    pub fn render_fn(&self) -> std::sync::Arc<dyn Fn() -> String + Send + Sync> {
        let handle = self.handle.clone();
        std::sync::Arc::new(move || handle.render())
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, PairlineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PairlineError> {
        Ok(())
    }
}
