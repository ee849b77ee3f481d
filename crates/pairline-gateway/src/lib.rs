// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP management surface for Pairline.
//!
//! Exposes create, status, stop, destroy, send and list over a bearer-token
//! protected REST API, plus unauthenticated `/health` and `/metrics`.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
