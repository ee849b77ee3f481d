// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Pairline integration tests.
//!
//! Provides mock adapters for fast, deterministic, CI-runnable tests
//! without a protocol sidecar or a credentials directory.
//!
//! # Components
//!
//! - [`MockProtocol`] - Protocol client whose remote side is driven by the test
//! - [`MemoryCredentialStore`] - Map-backed credential store with corruption switch
//! - [`RecordingInboundHandler`] - Inbound handler that captures deliveries

pub mod memory_store;
pub mod mock_protocol;
pub mod recording_handler;

pub use memory_store::MemoryCredentialStore;
pub use mock_protocol::{MOCK_PHONE_NUMBER, MockLink, MockProtocol, OpenRecord};
pub use recording_handler::RecordingInboundHandler;
