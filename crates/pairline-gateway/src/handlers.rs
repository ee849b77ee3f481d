// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the session management API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use pairline_core::types::{HealthStatus, SessionSnapshot, TenantId};
use pairline_core::{PairlineError, SendError};

use crate::server::GatewayState;

/// Request body for POST /v1/sessions/{tenant}/messages.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub recipient: String,
    pub content: String,
}

/// Response body for POST /v1/sessions/{tenant}/messages.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message_id: String,
}

/// Response body for GET /v1/sessions.
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSnapshot>,
}

/// Response body for DELETE /v1/sessions/{tenant}.
#[derive(Debug, Serialize)]
pub struct DestroyResponse {
    pub tenant_id: String,
    pub existed: bool,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub protocol: String,
    pub credentials: String,
    pub active_sessions: usize,
    pub tenants: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error carrying the HTTP status to answer with.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<PairlineError> for ApiError {
    fn from(err: PairlineError) -> Self {
        let status = match &err {
            PairlineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            PairlineError::InvalidTenantId(_) => StatusCode::BAD_REQUEST,
            PairlineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<SendError> for ApiError {
    fn from(err: SendError) -> Self {
        let status = match &err {
            SendError::NotConnected { .. } | SendError::SessionClosed => StatusCode::CONFLICT,
            SendError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            SendError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

fn tenant(raw: &str) -> Result<TenantId, ApiError> {
    Ok(TenantId::parse(raw)?)
}

fn health_label(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

/// POST /v1/sessions/{tenant}
///
/// Starts the tenant's actor (or returns the existing one). Answers before
/// pairing or connection completes.
pub async fn create_session(
    State(state): State<GatewayState>,
    Path(raw): Path<String>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let tenant = tenant(&raw)?;
    let snapshot = state.manager.create_session(&tenant).await;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// GET /v1/sessions/{tenant}
pub async fn get_session(
    State(state): State<GatewayState>,
    Path(raw): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let tenant = tenant(&raw)?;
    Ok(Json(state.manager.session_status(&tenant)?))
}

/// POST /v1/sessions/{tenant}/stop
pub async fn stop_session(
    State(state): State<GatewayState>,
    Path(raw): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let tenant = tenant(&raw)?;
    state.manager.stop_session(&tenant).await?;
    Ok(Json(state.manager.session_status(&tenant)?))
}

/// DELETE /v1/sessions/{tenant}
///
/// Deactivates the tenant: stops the actor and wipes its credential.
pub async fn destroy_session(
    State(state): State<GatewayState>,
    Path(raw): Path<String>,
) -> Result<Json<DestroyResponse>, ApiError> {
    let tenant = tenant(&raw)?;
    let existed = state.manager.destroy_session(&tenant).await?;
    Ok(Json(DestroyResponse {
        tenant_id: tenant.to_string(),
        existed,
    }))
}

/// POST /v1/sessions/{tenant}/messages
pub async fn send_message(
    State(state): State<GatewayState>,
    Path(raw): Path<String>,
    Json(body): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let tenant = tenant(&raw)?;
    let id = state
        .manager
        .send(&tenant, body.recipient, body.content)
        .await?;
    Ok(Json(SendResponse { message_id: id.0 }))
}

/// GET /v1/sessions
pub async fn list_sessions(State(state): State<GatewayState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.manager.list_sessions(),
    })
}

/// GET /health
///
/// Unauthenticated. Answers 503 when a collaborator is unhealthy.
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let report = state.manager.health().await;
    let serving = report.is_serving();
    let status = if !serving {
        "unhealthy"
    } else if matches!(report.protocol, HealthStatus::Degraded(_))
        || matches!(report.credentials, HealthStatus::Degraded(_))
    {
        "degraded"
    } else {
        "healthy"
    };

    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        protocol: health_label(&report.protocol),
        credentials: health_label(&report.credentials),
        active_sessions: report.active_sessions,
        tenants: report.tenants,
    };
    let code = if serving {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}

/// GET /metrics
///
/// Unauthenticated Prometheus text output, 404 when metrics are disabled.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => ApiError::new(StatusCode::NOT_FOUND, "metrics are not enabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairline_core::types::SessionState;

    #[test]
    fn send_errors_map_to_statuses() {
        let not_connected = ApiError::from(SendError::NotConnected {
            state: SessionState::AwaitingPairing,
        });
        assert_eq!(not_connected.status, StatusCode::CONFLICT);
        assert!(not_connected.message.contains("awaiting_pairing"));

        let timeout = ApiError::from(SendError::Timeout {
            duration: std::time::Duration::from_secs(15),
        });
        assert_eq!(timeout.status, StatusCode::GATEWAY_TIMEOUT);

        let transport = ApiError::from(SendError::Transport("rejected".into()));
        assert_eq!(transport.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn pairline_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(PairlineError::SessionNotFound("acme".into())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PairlineError::InvalidTenantId("../x".into())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PairlineError::Internal("boom".into())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn health_labels_include_reason() {
        assert_eq!(health_label(&HealthStatus::Healthy), "healthy");
        assert_eq!(
            health_label(&HealthStatus::Degraded("slow".into())),
            "degraded: slow"
        );
    }
}
