// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end session scenarios against the scripted protocol mock.

use std::sync::Arc;
use std::time::Duration;

use pairline_config::PairlineConfig;
use pairline_core::error::LinkError;
use pairline_core::traits::credential::CredentialStore;
use pairline_core::types::{CloseReason, SessionState, TenantId};
use pairline_session::{FileCredentialStore, SessionManager, StrategyCatalog};
use pairline_test_utils::{
    MOCK_PHONE_NUMBER, MemoryCredentialStore, MockProtocol, RecordingInboundHandler,
};

fn tenant(raw: &str) -> TenantId {
    TenantId::parse(raw).unwrap()
}

fn manager_with(
    protocol: Arc<MockProtocol>,
    store: Arc<dyn CredentialStore>,
) -> SessionManager {
    SessionManager::from_config(
        &PairlineConfig::default(),
        protocol,
        store,
        Arc::new(RecordingInboundHandler::new()),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn acme_pairs_sends_and_rotates_after_abnormal_close() {
    let protocol = Arc::new(MockProtocol::new());
    let manager = manager_with(protocol.clone(), Arc::new(MemoryCredentialStore::new()));
    let acme = tenant("acme");

    manager.create_session(&acme).await;
    let handle = manager.handle(&acme).unwrap();

    let pairing = tokio::time::timeout(
        Duration::from_secs(2),
        handle.wait_for(|s| s.state == SessionState::AwaitingPairing),
    )
    .await
    .expect("QR within 2s");
    assert!(pairing.qr_payload.is_some());

    let link = protocol.latest_link(&acme).await.unwrap();
    link.scan().await;
    let connected = handle.wait_for(|s| s.state == SessionState::Connected).await;
    assert_eq!(connected.phone_number.as_deref(), Some(MOCK_PHONE_NUMBER));
    assert!(connected.qr_payload.is_none());

    let id = manager.send(&acme, "+15550001", "hello").await.unwrap();
    assert!(!id.0.is_empty());
    assert_eq!(link.sent().await.len(), 1);

    let mut transitions = manager.subscribe(&acme).unwrap();
    link.close_with(Some(1006), "connection reset", false).await;

    let mut seen = Vec::new();
    while seen.len() < 3 {
        let transition = transitions.recv().await.unwrap();
        seen.push((transition.to, transition.strategy_index));
    }
    assert_eq!(
        seen,
        vec![
            (SessionState::Disconnected, 0),
            (SessionState::ReconnectPending, 1),
            (SessionState::Initializing, 1),
        ]
    );

    protocol.wait_for_opens(2).await;
    let catalog = StrategyCatalog::builtin();
    assert_eq!(protocol.opens().await[1].strategy, catalog.get(1).name);
    assert!(protocol.opens().await[1].credential.is_some());

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_for_beta_share_one_actor() {
    let protocol = Arc::new(MockProtocol::new());
    let manager = Arc::new(manager_with(
        protocol.clone(),
        Arc::new(MemoryCredentialStore::new()),
    ));
    let beta = tenant("beta");

    let first = {
        let manager = Arc::clone(&manager);
        let beta = beta.clone();
        tokio::spawn(async move {
            manager.create_session(&beta).await;
            manager.handle(&beta).unwrap()
        })
    };
    let second = {
        let manager = Arc::clone(&manager);
        let beta = beta.clone();
        tokio::spawn(async move {
            manager.create_session(&beta).await;
            manager.handle(&beta).unwrap()
        })
    };

    let (a, b) = (first.await.unwrap(), second.await.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(manager.active_sessions(), 1);

    a.wait_for(|s| s.state == SessionState::AwaitingPairing).await;
    assert_eq!(protocol.open_count().await, 1);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_during_pairing_returns_to_idle_without_qr() {
    let protocol = Arc::new(MockProtocol::new());
    let manager = manager_with(protocol.clone(), Arc::new(MemoryCredentialStore::new()));
    let acme = tenant("acme");

    manager.create_session(&acme).await;
    let handle = manager.handle(&acme).unwrap();
    handle
        .wait_for(|s| s.state == SessionState::AwaitingPairing)
        .await;

    let grace = Duration::from_secs(5);
    tokio::time::timeout(grace, manager.stop_session(&acme))
        .await
        .expect("stopped within grace")
        .unwrap();

    let status = manager.session_status(&acme).unwrap();
    assert_eq!(status.state, SessionState::Idle);
    assert!(status.qr_payload.is_none());
    assert!(protocol.latest_link(&acme).await.unwrap().is_closed());
}

#[tokio::test(start_paused = true)]
async fn nth_abnormal_failure_selects_catalog_entry_n_mod_len() {
    let protocol = Arc::new(MockProtocol::new());
    let manager = manager_with(protocol.clone(), Arc::new(MemoryCredentialStore::new()));
    let catalog = StrategyCatalog::builtin();
    let failures = 5;

    for _ in 0..failures {
        protocol
            .fail_next_open(LinkError::Closed(CloseReason {
                code: Some(1006),
                message: "reset during handshake".to_string(),
                during_handshake: true,
            }))
            .await;
    }

    let acme = tenant("acme");
    manager.create_session(&acme).await;
    let handle = manager.handle(&acme).unwrap();
    let status = handle
        .wait_for(|s| s.state == SessionState::AwaitingPairing)
        .await;

    let opens = protocol.opens().await;
    assert_eq!(opens.len(), failures + 1);
    assert_eq!(opens[failures].strategy, catalog.get(failures).name);
    assert_eq!(status.active_strategy_index, failures % catalog.len());
    manager.shutdown().await;
}

#[tokio::test]
async fn stored_credential_reconnects_without_pairing() {
    let dir = tempfile::tempdir().unwrap();
    let acme = tenant("acme");

    {
        let protocol = Arc::new(MockProtocol::new());
        let store = Arc::new(FileCredentialStore::new(dir.path()));
        let manager = manager_with(protocol.clone(), store.clone());

        manager.create_session(&acme).await;
        let handle = manager.handle(&acme).unwrap();
        handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;
        protocol.latest_link(&acme).await.unwrap().scan().await;
        handle.wait_for(|s| s.state == SessionState::Connected).await;
        manager.shutdown().await;

        let saved = store.load(&acme).await.unwrap().unwrap();
        assert_eq!(saved.key_material, b"keys-acme");
        assert_eq!(saved.version, 1);
    }

    let protocol = Arc::new(MockProtocol::new());
    let store = Arc::new(FileCredentialStore::new(dir.path()));
    let manager = manager_with(protocol.clone(), store);

    let resumed = manager.resume_stored().await.unwrap();
    assert_eq!(resumed, vec![acme.clone()]);

    let handle = manager.handle(&acme).unwrap();
    let status = handle.wait_for(|s| s.state == SessionState::Connected).await;
    assert_eq!(status.phone_number.as_deref(), Some(MOCK_PHONE_NUMBER));

    let link = protocol.latest_link(&acme).await.unwrap();
    assert_eq!(link.pairing_requests(), 0);
    assert_eq!(
        protocol.opens().await[0].credential.as_deref(),
        Some(&b"keys-acme"[..])
    );
    manager.shutdown().await;
}
