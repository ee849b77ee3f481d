// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pairline status` command implementation.
//!
//! Queries the running gateway for health and, when a bearer token is
//! configured, the per-tenant session list. Falls back gracefully when the
//! gateway is not running.

use std::io::IsTerminal;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pairline_config::PairlineConfig;
use pairline_core::PairlineError;

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    active_sessions: usize,
}

#[derive(Debug, Deserialize)]
struct SessionList {
    sessions: Vec<TenantSummary>,
}

/// One row of the tenant table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSummary {
    pub tenant_id: String,
    pub state: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub reconnect_attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub active_sessions: Option<usize>,
    pub tenants: Vec<TenantSummary>,
    pub gateway_host: String,
    pub gateway_port: u16,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `pairline status` command.
pub async fn run_status(config: &PairlineConfig, json: bool, plain: bool) -> Result<(), PairlineError> {
    let host = &config.gateway.host;
    let port = config.gateway.port;
    let base = format!("http://{host}:{port}");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| PairlineError::Internal(format!("failed to create HTTP client: {e}")))?;

    let health = match client.get(format!("{base}/health")).send().await {
        Ok(resp) => Some(resp.json::<HealthResponse>().await.map_err(|e| {
            PairlineError::Internal(format!("failed to parse health response: {e}"))
        })?),
        Err(_) => None,
    };

    let tenants = match (&health, &config.gateway.bearer_token) {
        (Some(_), Some(token)) => fetch_tenants(&client, &base, token).await,
        _ => Vec::new(),
    };

    let use_color = !plain && std::io::stdout().is_terminal();
    match health {
        Some(health) => {
            let uptime_human = format_uptime(health.uptime_secs);
            if json {
                print_json(&StatusResponse {
                    running: true,
                    status: health.status.clone(),
                    uptime_secs: Some(health.uptime_secs),
                    uptime_human: Some(uptime_human),
                    active_sessions: Some(health.active_sessions),
                    tenants,
                    gateway_host: host.clone(),
                    gateway_port: port,
                });
            } else {
                print_status_running(&health, &uptime_human, &tenants, use_color);
            }
        }
        None => {
            if json {
                print_json(&StatusResponse {
                    running: false,
                    status: "not running".to_string(),
                    uptime_secs: None,
                    uptime_human: None,
                    active_sessions: None,
                    tenants,
                    gateway_host: host.clone(),
                    gateway_port: port,
                });
            } else {
                print_status_offline(host, port, use_color);
            }
        }
    }

    Ok(())
}

async fn fetch_tenants(client: &reqwest::Client, base: &str, token: &str) -> Vec<TenantSummary> {
    let response = client
        .get(format!("{base}/v1/sessions"))
        .bearer_auth(token)
        .send()
        .await;
    match response {
        Ok(resp) if resp.status().is_success() => resp
            .json::<SessionList>()
            .await
            .map(|list| list.sessions)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn print_json(status: &StatusResponse) {
    println!(
        "{}",
        serde_json::to_string_pretty(status).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_status_running(
    health: &HealthResponse,
    uptime: &str,
    tenants: &[TenantSummary],
    use_color: bool,
) {
    println!();
    println!("  pairline status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        let status = if health.status == "healthy" {
            health.status.green()
        } else {
            health.status.yellow()
        };
        println!("    State:    {} {} (uptime: {})", "✓".green(), status, uptime);
    } else {
        println!("    State:    [OK] {} (uptime: {uptime})", health.status);
    }
    println!("    Sessions: {} running", health.active_sessions);

    if !tenants.is_empty() {
        println!();
        for tenant in tenants {
            println!("    {}", tenant_line(tenant));
        }
    }
    println!();
}

fn tenant_line(tenant: &TenantSummary) -> String {
    let mut line = format!("{:<24} {}", tenant.tenant_id, tenant.state);
    if let Some(phone) = &tenant.phone_number {
        line.push_str(&format!(" {phone}"));
    }
    if tenant.reconnect_attempts > 0 {
        line.push_str(&format!(" (attempt {})", tenant.reconnect_attempts));
    }
    if let Some(error) = &tenant.last_error {
        line.push_str(&format!(" last error: {error}"));
    }
    line
}

fn print_status_offline(host: &str, port: u16, use_color: bool) {
    println!();
    println!("  pairline status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!("    State:    {} {}", "✗".red(), "not running".red());
    } else {
        println!("    State:    [FAIL] not running");
    }

    println!("    Endpoint: http://{host}:{port}/health");
    println!();
    println!("  Start with: pairline serve");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uptime_minutes() {
        assert_eq!(format_uptime(120), "2m");
    }

    #[test]
    fn format_uptime_hours() {
        assert_eq!(format_uptime(3720), "1h 2m");
    }

    #[test]
    fn format_uptime_days() {
        assert_eq!(format_uptime(90060), "1d 1h 1m");
    }

    #[test]
    fn tenant_summary_reads_session_snapshot_json() {
        let json = r#"{"sessions":[{"tenant_id":"acme","state":"reconnect_pending",
            "phone_number":"+5511","qr_payload":null,"reconnect_attempts":2,
            "active_strategy_index":1,"last_error":"abnormal_disconnect","recent_attempts":[]}]}"#;
        let list: SessionList = serde_json::from_str(json).unwrap();
        let line = tenant_line(&list.sessions[0]);
        assert!(line.starts_with("acme"));
        assert!(line.contains("reconnect_pending +5511 (attempt 2)"));
        assert!(line.contains("last error: abnormal_disconnect"));
    }

    #[test]
    fn offline_status_serializes() {
        let resp = StatusResponse {
            running: false,
            status: "not running".to_string(),
            uptime_secs: None,
            uptime_human: None,
            active_sessions: None,
            tenants: Vec::new(),
            gateway_host: "127.0.0.1".to_string(),
            gateway_port: 3780,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"running\":false"));
        assert!(json.contains("\"uptime_secs\":null"));
    }
}
