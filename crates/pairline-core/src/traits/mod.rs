// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seams of the session core.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod credential;
pub mod inbound;
pub mod protocol;

pub use adapter::PluginAdapter;
pub use credential::CredentialStore;
pub use inbound::InboundHandler;
pub use protocol::{LinkControl, ProtocolClient, ProtocolEvent, ProtocolLink};
