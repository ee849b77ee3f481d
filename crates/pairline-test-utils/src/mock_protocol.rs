// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted protocol client for deterministic session tests.
//!
//! `MockProtocol` implements `ProtocolClient` without any network. Every
//! opened link is recorded and exposed as a [`MockLink`] so a test can play
//! the remote side: scan the pairing code, deliver messages, or close the
//! transport with a chosen code.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify, mpsc};

use pairline_core::error::LinkError;
use pairline_core::traits::adapter::PluginAdapter;
use pairline_core::traits::protocol::{LinkControl, ProtocolClient, ProtocolEvent, ProtocolLink};
use pairline_core::types::{
    AdapterType, CloseReason, Credential, HealthStatus, InboundMessage, MessageId,
    OutboundMessage, Strategy, TenantId,
};
use pairline_core::PairlineError;

/// Phone number reported when a mock link authenticates.
pub const MOCK_PHONE_NUMBER: &str = "+551100000000";

/// One `open` call seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRecord {
    pub tenant: TenantId,
    pub strategy: String,
    /// Key material of the credential passed to `open`, if any.
    pub credential: Option<Vec<u8>>,
}

struct Inner {
    opens: Vec<OpenRecord>,
    links: Vec<MockLink>,
    open_failures: VecDeque<LinkError>,
    auto_resume: bool,
    send_delay: Option<Duration>,
    send_error: Option<String>,
}

/// A protocol client whose remote side is driven by the test.
pub struct MockProtocol {
    inner: Mutex<Inner>,
    opened: Notify,
}

impl MockProtocol {
    /// A mock that resumes automatically whenever a credential is supplied.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                opens: Vec::new(),
                links: Vec::new(),
                open_failures: VecDeque::new(),
                auto_resume: true,
                send_delay: None,
                send_error: None,
            }),
            opened: Notify::new(),
        }
    }

    /// When false, links opened with a credential stay in the handshake
    /// until the test emits an event.
    pub async fn set_auto_resume(&self, enabled: bool) {
        self.inner.lock().await.auto_resume = enabled;
    }

    /// Make the next `open` call fail with `err`. Calls queue up.
    pub async fn fail_next_open(&self, err: LinkError) {
        self.inner.lock().await.open_failures.push_back(err);
    }

    /// Delay every send acknowledgement on links opened afterwards.
    pub async fn set_send_delay(&self, delay: Duration) {
        self.inner.lock().await.send_delay = Some(delay);
    }

    /// Reject every send on links opened afterwards.
    pub async fn set_send_error(&self, reason: &str) {
        self.inner.lock().await.send_error = Some(reason.to_string());
    }

    /// All `open` calls so far, in order.
    pub async fn opens(&self) -> Vec<OpenRecord> {
        self.inner.lock().await.opens.clone()
    }

    /// Number of `open` calls so far.
    pub async fn open_count(&self) -> usize {
        self.inner.lock().await.opens.len()
    }

    /// Wait until at least `count` links have been opened.
    pub async fn wait_for_opens(&self, count: usize) {
        loop {
            let notified = self.opened.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.lock().await.opens.len() >= count {
                return;
            }
            notified.await;
        }
    }

    /// The most recently opened link for `tenant`.
    pub async fn latest_link(&self, tenant: &TenantId) -> Option<MockLink> {
        self.inner
            .lock()
            .await
            .links
            .iter()
            .rev()
            .find(|link| &link.shared.tenant == tenant)
            .cloned()
    }
}

impl Default for MockProtocol {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProtocol {
    fn name(&self) -> &str {
        "mock-protocol"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Protocol
    }

    async fn health_check(&self) -> Result<HealthStatus, PairlineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PairlineError> {
        Ok(())
    }
}

#[async_trait]
impl ProtocolClient for MockProtocol {
    async fn open(
        &self,
        tenant: &TenantId,
        strategy: &Strategy,
        credential: Option<&Credential>,
    ) -> Result<ProtocolLink, LinkError> {
        let mut inner = self.inner.lock().await;
        inner.opens.push(OpenRecord {
            tenant: tenant.clone(),
            strategy: strategy.name.clone(),
            credential: credential.map(|c| c.key_material.clone()),
        });
        self.opened.notify_waiters();

        if let Some(err) = inner.open_failures.pop_front() {
            return Err(err);
        }

        let (events_tx, events_rx) = mpsc::channel(64);
        let shared = Arc::new(LinkShared {
            tenant: tenant.clone(),
            strategy: strategy.name.clone(),
            events: events_tx,
            sent: Mutex::new(Vec::new()),
            pairing_requests: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            send_delay: inner.send_delay,
            send_error: inner.send_error.clone(),
        });

        if let Some(credential) = credential
            && inner.auto_resume
        {
            let _ = shared.events.try_send(ProtocolEvent::Authenticated {
                phone_number: MOCK_PHONE_NUMBER.to_string(),
                key_material: credential.key_material.clone(),
            });
        }

        inner.links.push(MockLink {
            shared: Arc::clone(&shared),
        });

        Ok(ProtocolLink {
            events: events_rx,
            control: Box::new(MockLinkControl { shared }),
        })
    }
}

struct LinkShared {
    tenant: TenantId,
    strategy: String,
    events: mpsc::Sender<ProtocolEvent>,
    sent: Mutex<Vec<OutboundMessage>>,
    pairing_requests: AtomicU32,
    closed: AtomicBool,
    send_delay: Option<Duration>,
    send_error: Option<String>,
}

/// Test-side handle to one opened link.
#[derive(Clone)]
pub struct MockLink {
    shared: Arc<LinkShared>,
}

impl MockLink {
    /// Name of the strategy the link was opened with.
    pub fn strategy(&self) -> &str {
        &self.shared.strategy
    }

    /// Simulate the device scanning the pairing code.
    pub async fn scan(&self) {
        self.emit(ProtocolEvent::Authenticated {
            phone_number: MOCK_PHONE_NUMBER.to_string(),
            key_material: format!("keys-{}", self.shared.tenant).into_bytes(),
        })
        .await;
    }

    /// Simulate the transport closing.
    pub async fn close_with(&self, code: Option<u16>, message: &str, during_handshake: bool) {
        self.emit(ProtocolEvent::Closed(CloseReason {
            code,
            message: message.to_string(),
            during_handshake,
        }))
        .await;
    }

    /// Deliver an inbound message and return its id.
    pub async fn deliver(&self, sender_id: &str, content: &str) -> String {
        let id = format!("in-{}", uuid::Uuid::new_v4());
        self.emit(ProtocolEvent::Message(InboundMessage {
            id: id.clone(),
            tenant_id: self.shared.tenant.clone(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        }))
        .await;
        id
    }

    /// Push an arbitrary event to the session.
    pub async fn emit(&self, event: ProtocolEvent) {
        if self.shared.events.send(event).await.is_err() {
            tracing::debug!(tenant_id = %self.shared.tenant, "mock link receiver dropped");
        }
    }

    /// Messages acknowledged on this link.
    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.shared.sent.lock().await.clone()
    }

    /// How many pairing codes the session asked for.
    pub fn pairing_requests(&self) -> u32 {
        self.shared.pairing_requests.load(Ordering::SeqCst)
    }

    /// Whether the session closed the link from its side.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

struct MockLinkControl {
    shared: Arc<LinkShared>,
}

impl MockLinkControl {
    fn ensure_open(&self) -> Result<(), LinkError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed(CloseReason {
                code: None,
                message: "link closed".to_string(),
                during_handshake: false,
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkControl for MockLinkControl {
    async fn request_pairing_code(&self) -> Result<String, LinkError> {
        self.ensure_open()?;
        let n = self.shared.pairing_requests.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("2@{}-qr-{n}", self.shared.tenant))
    }

    async fn send(&self, message: &OutboundMessage) -> Result<MessageId, LinkError> {
        self.ensure_open()?;
        if let Some(delay) = self.shared.send_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.shared.send_error {
            return Err(LinkError::Protocol(reason.clone()));
        }
        self.shared.sent.lock().await.push(message.clone());
        Ok(MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())))
    }

    async fn close(&self) -> Result<(), LinkError> {
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairline_core::types::ClientIdentity;

    fn strategy(name: &str) -> Strategy {
        Strategy {
            name: name.to_string(),
            connect_timeout_secs: 5,
            handshake_timeout_secs: 5,
            keepalive_secs: 30,
            identity: ClientIdentity {
                platform: "Test".into(),
                browser: "Chrome".into(),
                version: "1.0".into(),
            },
            sync_full_history: false,
            legacy_encoding: false,
        }
    }

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn fresh_link_hands_out_numbered_pairing_codes() {
        let mock = MockProtocol::new();
        let link = mock.open(&tenant("acme"), &strategy("s0"), None).await.unwrap();

        assert_eq!(link.control.request_pairing_code().await.unwrap(), "2@acme-qr-1");
        assert_eq!(link.control.request_pairing_code().await.unwrap(), "2@acme-qr-2");
        assert_eq!(mock.latest_link(&tenant("acme")).await.unwrap().pairing_requests(), 2);
    }

    #[tokio::test]
    async fn credential_triggers_auto_resume() {
        let mock = MockProtocol::new();
        let cred = Credential {
            tenant_id: tenant("acme"),
            key_material: b"k".to_vec(),
            version: 1,
            saved_at: Utc::now(),
        };
        let mut link = mock
            .open(&tenant("acme"), &strategy("s0"), Some(&cred))
            .await
            .unwrap();

        match link.events.recv().await.unwrap() {
            ProtocolEvent::Authenticated { key_material, .. } => assert_eq!(key_material, b"k"),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(mock.opens().await[0].credential.as_deref(), Some(&b"k"[..]));
    }

    #[tokio::test]
    async fn scripted_open_failure_is_consumed_once() {
        let mock = MockProtocol::new();
        mock.fail_next_open(LinkError::Protocol("refused".into())).await;

        assert!(mock.open(&tenant("a"), &strategy("s0"), None).await.is_err());
        assert!(mock.open(&tenant("a"), &strategy("s1"), None).await.is_ok());
        assert_eq!(mock.open_count().await, 2);
    }

    #[tokio::test]
    async fn sends_are_captured_and_fail_after_close() {
        let mock = MockProtocol::new();
        let link = mock.open(&tenant("acme"), &strategy("s0"), None).await.unwrap();
        let msg = OutboundMessage {
            recipient: "+1".into(),
            content: "hi".into(),
        };

        assert!(link.control.send(&msg).await.is_ok());
        link.control.close().await.unwrap();
        assert!(link.control.send(&msg).await.is_err());

        let handle = mock.latest_link(&tenant("acme")).await.unwrap();
        assert!(handle.is_closed());
        assert_eq!(handle.sent().await, vec![msg]);
    }

    #[tokio::test]
    async fn wait_for_opens_returns_once_reached() {
        let mock = Arc::new(MockProtocol::new());
        let waiter = {
            let mock = Arc::clone(&mock);
            tokio::spawn(async move { mock.wait_for_opens(1).await })
        };
        mock.open(&tenant("acme"), &strategy("s0"), None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
