// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket client for the Pairline protocol sidecar.
//!
//! The chat protocol itself runs in a separate sidecar process. This crate
//! speaks a small JSON frame protocol to it, one WebSocket per tenant link,
//! and exposes the result as a [`ProtocolClient`](pairline_core::ProtocolClient).

pub mod client;
pub mod frame;
pub mod link;

pub use client::BridgeClient;
pub use frame::{ClientFrame, SidecarFrame};
pub use link::BridgeLinkControl;
