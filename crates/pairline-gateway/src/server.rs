// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use pairline_core::PairlineError;
use pairline_session::SessionManager;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// State for the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub manager: Arc<SessionManager>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(
        manager: Arc<SessionManager>,
        bearer_token: Option<String>,
        prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    ) -> Self {
        Self {
            manager,
            auth: AuthConfig { bearer_token },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render,
            },
        }
    }
}

/// Gateway server configuration (mirrors `GatewayConfig` from pairline-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the router.
///
/// - GET /health, GET /metrics (public)
/// - GET /v1/sessions
/// - POST | GET | DELETE /v1/sessions/{tenant}
/// - POST /v1/sessions/{tenant}/stop
/// - POST /v1/sessions/{tenant}/messages
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/sessions", get(handlers::list_sessions))
        .route(
            "/v1/sessions/{tenant}",
            post(handlers::create_session)
                .get(handlers::get_session)
                .delete(handlers::destroy_session),
        )
        .route("/v1/sessions/{tenant}/stop", post(handlers::stop_session))
        .route(
            "/v1/sessions/{tenant}/messages",
            post(handlers::send_message),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the gateway until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), PairlineError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PairlineError::Protocol {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| PairlineError::Protocol {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3780,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(debug.contains("3780"));
    }
}
