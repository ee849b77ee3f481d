// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pairline serve` command implementation.
//!
//! Wires the file credential store, the sidecar bridge and the inbound
//! handler into a [`SessionManager`], resumes every tenant with a stored
//! credential, serves the management gateway, and stops all sessions on
//! SIGINT or SIGTERM.

use std::sync::Arc;

use tracing::{info, warn};

use pairline_bridge::BridgeClient;
use pairline_config::PairlineConfig;
use pairline_core::PairlineError;
use pairline_session::{FileCredentialStore, SessionManager, shutdown};

use crate::inbound;

#[cfg(feature = "prometheus")]
use pairline_prometheus::PrometheusAdapter;

#[cfg(feature = "gateway")]
use pairline_gateway::{GatewayState, ServerConfig};

/// Runs the `pairline serve` command until a shutdown signal arrives.
pub async fn run_serve(config: PairlineConfig) -> Result<(), PairlineError> {
    init_tracing(&config.agent.log_level);
    info!(name = %config.agent.name, "starting pairline serve");

    #[cfg(feature = "prometheus")]
    let render = match PrometheusAdapter::new() {
        Ok(adapter) => Some(adapter.render_fn()),
        Err(e) => {
            warn!(error = %e, "prometheus metrics unavailable, continuing without /metrics");
            None
        }
    };
    #[cfg(not(feature = "prometheus"))]
    let render: Option<Arc<dyn Fn() -> String + Send + Sync>> = None;

    let credentials = Arc::new(FileCredentialStore::new(&config.credentials.directory));
    info!(directory = %config.credentials.directory, "credential store ready");

    let protocol = Arc::new(BridgeClient::from_config(&config.bridge));
    info!(url = %protocol.url(), "protocol bridge configured");

    let handler = inbound::from_config(&config.inbound)?;
    let manager = Arc::new(SessionManager::from_config(
        &config,
        protocol,
        credentials,
        handler,
    )?);

    match manager.resume_stored().await {
        Ok(tenants) if !tenants.is_empty() => {
            info!(count = tenants.len(), "resuming tenants with stored credentials");
        }
        Ok(_) => info!("no stored credentials to resume"),
        Err(e) => warn!(error = %e, "failed to list stored credentials"),
    }

    let cancel = shutdown::install_signal_handler();

    #[cfg(feature = "gateway")]
    let gateway = if config.gateway.enabled {
        let server = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        if config.gateway.bearer_token.is_none() {
            warn!("gateway.bearer_token is not set, every /v1 request will be rejected");
        }
        let state = GatewayState::new(
            Arc::clone(&manager),
            config.gateway.bearer_token.clone(),
            render.clone(),
        );
        let token = cancel.clone();
        Some(tokio::spawn(async move {
            pairline_gateway::start_server(&server, state, token).await
        }))
    } else {
        info!("gateway disabled by configuration");
        None
    };
    #[cfg(not(feature = "gateway"))]
    let _ = &render;

    cancel.cancelled().await;
    info!("shutting down");

    manager.shutdown().await;

    #[cfg(feature = "gateway")]
    {
        if let Some(task) = gateway {
            match task.await {
                Ok(Err(e)) => warn!(error = %e, "gateway exited with error"),
                Err(e) => warn!(error = %e, "gateway task panicked"),
                Ok(Ok(())) => {}
            }
        }
    }

    info!("pairline stopped");
    Ok(())
}

/// Installs the tracing subscriber. `RUST_LOG` wins over `agent.log_level`.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pairline={log_level},warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
