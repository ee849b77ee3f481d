// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound handler that records what it receives.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use pairline_core::traits::inbound::InboundHandler;
use pairline_core::types::InboundMessage;
use pairline_core::PairlineError;

/// Captures inbound messages for assertions.
#[derive(Default)]
pub struct RecordingInboundHandler {
    received: Mutex<Vec<InboundMessage>>,
    notify: Notify,
    failures_left: AtomicUsize,
}

impl RecordingInboundHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` deliveries (they are still recorded).
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Everything received so far, in arrival order.
    pub async fn received(&self) -> Vec<InboundMessage> {
        self.received.lock().await.clone()
    }

    /// Wait until at least `count` messages have arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<InboundMessage> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let received = self.received.lock().await;
                if received.len() >= count {
                    return received.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl InboundHandler for RecordingInboundHandler {
    async fn on_inbound_message(&self, message: InboundMessage) -> Result<(), PairlineError> {
        self.received.lock().await.push(message);
        self.notify.notify_waiters();

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PairlineError::Internal("scripted handler failure".to_string()));
        }
        Ok(())
    }
}
