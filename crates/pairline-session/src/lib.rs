// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant session management for the Pairline gateway.
//!
//! Every tenant gets one connection actor that owns its protocol link. The
//! [`SessionRegistry`] guarantees at most one running actor per tenant, the
//! [`ReconnectScheduler`] decides when and with which [`StrategyCatalog`]
//! entry to retry, and the [`InboundFanout`] delivers inbound messages to the
//! injected handler through a bounded queue per tenant.
//!
//! [`SessionManager`] bundles all of it behind the operations the gateway
//! and the binary call.

pub mod actor;
pub mod classifier;
pub mod credential;
pub mod dispatcher;
pub mod manager;
mod metrics;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod strategy;

pub use actor::{SessionHandle, SessionServices, SessionSettings};
pub use classifier::DisconnectClassifier;
pub use credential::FileCredentialStore;
pub use dispatcher::{EventDispatcher, InboundFanout};
pub use manager::{HealthReport, SessionManager};
pub use registry::SessionRegistry;
pub use scheduler::{BackoffPolicy, ReconnectScheduler, RetryDecision};
pub use strategy::StrategyCatalog;
