// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection actor: one task per tenant that owns the protocol link.
//!
//! The actor is the only writer of its tenant's [`SessionSnapshot`]. Callers
//! reach it through a [`SessionHandle`]. Status reads go through a watch
//! channel and never wait on the actor; sends travel over a bounded command
//! queue and are processed one at a time, which keeps per-tenant ordering.
//!
//! One task run covers `Initializing` up to a final `Idle` or `Failed`.
//! Reconnects happen inside the run; a stopped or failed actor is replaced
//! by the registry on the next creation request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pairline_config::PairlineConfig;
use pairline_config::model::ReconnectConfig;
use pairline_core::traits::credential::CredentialStore;
use pairline_core::traits::protocol::{ProtocolClient, ProtocolEvent, ProtocolLink};
use pairline_core::types::{
    AttemptOutcome, CloseReason, ConnectionAttempt, Credential, ErrorClass, FailureReason,
    InboundMessage, MessageId, OutboundMessage, SessionSnapshot, SessionState, StateTransition,
    Strategy, TenantId,
};
use pairline_core::{PairlineError, SendError};

use crate::classifier::DisconnectClassifier;
use crate::metrics;
use crate::scheduler::{ReconnectScheduler, RetryDecision};
use crate::strategy::StrategyCatalog;

/// Buffered transitions per subscriber before it starts lagging.
const TRANSITION_BUFFER: usize = 64;

/// Timing and sizing knobs shared by every actor.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub qr_refresh_interval: Duration,
    pub max_qr_refreshes: u32,
    pub send_timeout: Duration,
    pub stop_grace: Duration,
    pub command_queue_capacity: usize,
    pub inbound_queue_capacity: usize,
    pub attempt_history: usize,
    pub reconnect: ReconnectConfig,
}

impl SessionSettings {
    pub fn from_config(config: &PairlineConfig) -> Self {
        Self {
            qr_refresh_interval: config.pairing.qr_refresh_interval(),
            max_qr_refreshes: config.pairing.max_qr_refreshes,
            send_timeout: Duration::from_secs(config.session.send_timeout_secs),
            stop_grace: Duration::from_secs(config.session.stop_grace_secs),
            command_queue_capacity: config.session.command_queue_capacity,
            inbound_queue_capacity: config.session.inbound_queue_capacity,
            attempt_history: config.session.attempt_history,
            reconnect: config.reconnect.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&PairlineConfig::default())
    }
}

/// Collaborators shared by every actor.
#[derive(Clone)]
pub struct SessionServices {
    pub protocol: Arc<dyn ProtocolClient>,
    pub credentials: Arc<dyn CredentialStore>,
    pub catalog: Arc<StrategyCatalog>,
    pub classifier: Arc<DisconnectClassifier>,
    pub settings: Arc<SessionSettings>,
    active: Arc<AtomicUsize>,
}

impl SessionServices {
    pub fn new(
        protocol: Arc<dyn ProtocolClient>,
        credentials: Arc<dyn CredentialStore>,
        catalog: StrategyCatalog,
        classifier: DisconnectClassifier,
        settings: SessionSettings,
    ) -> Self {
        Self {
            protocol,
            credentials,
            catalog: Arc::new(catalog),
            classifier: Arc::new(classifier),
            settings: Arc::new(settings),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of actor tasks currently running.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Requests sent from a handle to its actor.
pub(crate) enum Command {
    Send {
        message: OutboundMessage,
        reply: oneshot::Sender<Result<MessageId, SendError>>,
    },
}

/// Caller-side handle to one tenant's actor.
pub struct SessionHandle {
    tenant: TenantId,
    commands: mpsc::Sender<Command>,
    status: Arc<watch::Sender<SessionSnapshot>>,
    transitions: broadcast::Sender<StateTransition>,
    cancel: CancellationToken,
    deactivated: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    /// Spawns an actor for `tenant`. Inbound messages go to `inbound`.
    pub fn spawn(
        tenant: TenantId,
        services: SessionServices,
        inbound: mpsc::Sender<InboundMessage>,
    ) -> Arc<Self> {
        let (commands_tx, commands_rx) =
            mpsc::channel(services.settings.command_queue_capacity.max(1));
        let (status, _) = watch::channel(SessionSnapshot::new(tenant.clone()));
        let status = Arc::new(status);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        let cancel = CancellationToken::new();
        let deactivated = Arc::new(AtomicBool::new(false));

        let actor = SessionActor {
            tenant: tenant.clone(),
            scheduler: ReconnectScheduler::new(
                &services.settings.reconnect,
                services.catalog.len(),
            ),
            snapshot: SessionSnapshot::new(tenant.clone()),
            status: Arc::clone(&status),
            transitions: transitions.clone(),
            commands: commands_rx,
            inbound,
            cancel: cancel.clone(),
            deactivated: Arc::clone(&deactivated),
            credential: None,
            credential_loaded: false,
            has_connected: false,
            _active: ActiveGuard::new(Arc::clone(&services.active)),
            services,
        };
        let task = tokio::spawn(actor.run());

        Arc::new(Self {
            tenant,
            commands: commands_tx,
            status,
            transitions,
            cancel,
            deactivated,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Latest snapshot. Never waits on the actor.
    pub fn status(&self) -> SessionSnapshot {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Whether the actor task is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateTransition> {
        self.transitions.subscribe()
    }

    /// Watch the snapshot.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.status.subscribe()
    }

    /// Wait until the snapshot satisfies `predicate` and return it.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = self.status.subscribe();
        match rx.wait_for(|snapshot| predicate(snapshot)).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.status(),
        }
    }

    /// Sends a message on the tenant's connection.
    ///
    /// Fails fast with [`SendError::NotConnected`] unless the session is
    /// `Connected`. Never retried here.
    pub async fn send(&self, message: OutboundMessage) -> Result<MessageId, SendError> {
        let state = self.state();
        if state != SessionState::Connected {
            return Err(SendError::NotConnected { state });
        }

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send { message, reply })
            .await
            .map_err(|_| SendError::SessionClosed)?;
        response.await.map_err(|_| SendError::SessionClosed)?
    }

    /// Cancels whatever the actor is waiting on and waits up to `grace` for
    /// it to close the link and settle in `Idle`. Aborts the task after that.
    pub async fn stop(&self, grace: Duration) {
        self.cancel.cancel();

        let mut task = self.task.lock().await;
        let Some(handle) = task.as_mut() else {
            return;
        };
        if tokio::time::timeout(grace, &mut *handle).await.is_err() {
            warn!(tenant_id = %self.tenant, ?grace, "session actor did not stop within grace period, aborting");
            handle.abort();
            let deactivated = self.deactivated.load(Ordering::SeqCst);
            self.status.send_modify(|snapshot| {
                if deactivated {
                    snapshot.state = SessionState::Failed;
                    snapshot.last_error = Some(FailureReason::Deactivated);
                } else {
                    snapshot.state = SessionState::Idle;
                }
                snapshot.qr_payload = None;
                snapshot.qr_generated_at = None;
            });
        }
        *task = None;
    }

    /// Like [`stop`](Self::stop), but the actor ends in `Failed` with
    /// [`FailureReason::Deactivated`]. Used when the tenant is destroyed.
    pub async fn deactivate(&self, grace: Duration) {
        self.deactivated.store(true, Ordering::SeqCst);
        self.stop(grace).await;
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("tenant", &self.tenant)
            .field("state", &self.state())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Keeps the running-actor count accurate even when a task is aborted.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        let count = active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_sessions(count);
        Self(active)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let count = self.0.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_active_sessions(count);
    }
}

/// How one connection attempt ended.
enum AttemptEnd {
    Closed(CloseReason),
    Stopped,
    PairingTimeout,
    Fatal(FailureReason),
}

/// Result of the pairing or resume phase.
enum Handshake {
    Authenticated {
        phone_number: String,
        key_material: Vec<u8>,
    },
    Ended(AttemptEnd),
}

/// Why the actor task ends.
enum Exit {
    Stopped,
    PairingTimeout,
    LoggedOut,
    Failed(FailureReason),
}

struct SessionActor {
    tenant: TenantId,
    services: SessionServices,
    scheduler: ReconnectScheduler,
    snapshot: SessionSnapshot,
    status: Arc<watch::Sender<SessionSnapshot>>,
    transitions: broadcast::Sender<StateTransition>,
    commands: mpsc::Receiver<Command>,
    inbound: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
    deactivated: Arc<AtomicBool>,
    credential: Option<Credential>,
    credential_loaded: bool,
    /// Set once this run reached `Connected` on the current credential.
    has_connected: bool,
    _active: ActiveGuard,
}

impl SessionActor {
    async fn run(mut self) {
        debug!(tenant_id = %self.tenant, "session actor started");
        let exit = self.lifecycle().await;
        self.finish(exit);
    }

    async fn lifecycle(&mut self) -> Exit {
        loop {
            self.transition(SessionState::Initializing);
            match self.attempt().await {
                AttemptEnd::Stopped => return Exit::Stopped,
                AttemptEnd::PairingTimeout => return Exit::PairingTimeout,
                AttemptEnd::Fatal(reason) => return Exit::Failed(reason),
                AttemptEnd::Closed(reason) => {
                    if let Some(exit) = self.after_disconnect(reason).await {
                        return exit;
                    }
                }
            }
        }
    }

    /// One pass through credential load, link open, handshake and the
    /// connected loop. The link is closed before returning.
    async fn attempt(&mut self) -> AttemptEnd {
        if let Err(end) = self.ensure_credential_loaded().await {
            return end;
        }

        let index = self.scheduler.strategy_index();
        let strategy = self.services.catalog.get(index).clone();
        self.set_strategy(index);
        self.begin_attempt(&strategy, index);

        let cancel = self.cancel.clone();
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return AttemptEnd::Stopped,
            opened = tokio::time::timeout(
                strategy.connect_timeout(),
                self.services
                    .protocol
                    .open(&self.tenant, &strategy, self.credential.as_ref()),
            ) => opened,
        };

        let mut link = match opened {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => return AttemptEnd::Closed(e.close_reason(!self.has_connected)),
            Err(_) => {
                return AttemptEnd::Closed(timed_out(
                    "connect",
                    strategy.connect_timeout(),
                    !self.has_connected,
                ));
            }
        };

        let end = self.drive(&mut link, &strategy).await;
        if let Err(e) = link.control.close().await {
            debug!(tenant_id = %self.tenant, error = %e, "error closing protocol link");
        }
        end
    }

    async fn drive(&mut self, link: &mut ProtocolLink, strategy: &Strategy) -> AttemptEnd {
        let handshake = if self.credential.is_some() {
            self.transition(SessionState::Authenticating);
            self.resume(link, strategy).await
        } else {
            self.pair(link, strategy).await
        };

        match handshake {
            Handshake::Authenticated {
                phone_number,
                key_material,
            } => {
                self.on_authenticated(phone_number, key_material).await;
                self.connected(link).await
            }
            Handshake::Ended(end) => end,
        }
    }

    /// Waits for the stored credential to be accepted.
    async fn resume(&mut self, link: &mut ProtocolLink, strategy: &Strategy) -> Handshake {
        let cancel = self.cancel.clone();
        let limit = strategy.handshake_timeout();
        let deadline = tokio::time::sleep(limit);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Handshake::Ended(AttemptEnd::Stopped),
                event = link.events.recv() => {
                    if let Some(handshake) = self.handshake_event(event) {
                        return handshake;
                    }
                }
                command = self.commands.recv() => {
                    if !self.reject_command(command) {
                        return Handshake::Ended(AttemptEnd::Stopped);
                    }
                }
                _ = &mut deadline => {
                    return Handshake::Ended(AttemptEnd::Closed(timed_out("handshake", limit, true)));
                }
            }
        }
    }

    /// Shows pairing codes until one is scanned or the refresh budget runs out.
    async fn pair(&mut self, link: &mut ProtocolLink, strategy: &Strategy) -> Handshake {
        let limit = strategy.handshake_timeout();
        match self.request_pairing_code(link, limit).await {
            Ok(code) => self.show_qr(code),
            Err(end) => return Handshake::Ended(end),
        }

        let cancel = self.cancel.clone();
        let interval = self.services.settings.qr_refresh_interval;
        let max_refreshes = self.services.settings.max_qr_refreshes;
        let mut refreshes = 0u32;
        let mut refresh = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Handshake::Ended(AttemptEnd::Stopped),
                event = link.events.recv() => {
                    if let Some(handshake) = self.handshake_event(event) {
                        return handshake;
                    }
                }
                command = self.commands.recv() => {
                    if !self.reject_command(command) {
                        return Handshake::Ended(AttemptEnd::Stopped);
                    }
                }
                _ = refresh.tick() => {
                    if refreshes >= max_refreshes {
                        return Handshake::Ended(AttemptEnd::PairingTimeout);
                    }
                    refreshes += 1;
                    debug!(tenant_id = %self.tenant, refreshes, "refreshing pairing code");
                    match self.request_pairing_code(link, limit).await {
                        Ok(code) => self.show_qr(code),
                        Err(end) => return Handshake::Ended(end),
                    }
                }
            }
        }
    }

    async fn request_pairing_code(
        &self,
        link: &ProtocolLink,
        limit: Duration,
    ) -> Result<String, AttemptEnd> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AttemptEnd::Stopped),
            requested = tokio::time::timeout(limit, link.control.request_pairing_code()) => match requested {
                Ok(Ok(code)) => Ok(code),
                Ok(Err(e)) => Err(AttemptEnd::Closed(e.close_reason(true))),
                Err(_) => Err(AttemptEnd::Closed(timed_out("pairing code request", limit, true))),
            },
        }
    }

    /// Handles one event before the handshake completes. `Some` ends the phase.
    fn handshake_event(&mut self, event: Option<ProtocolEvent>) -> Option<Handshake> {
        match event {
            None => Some(Handshake::Ended(AttemptEnd::Closed(CloseReason {
                code: None,
                message: "protocol event stream ended".to_string(),
                during_handshake: true,
            }))),
            Some(ProtocolEvent::Authenticated {
                phone_number,
                key_material,
            }) => Some(Handshake::Authenticated {
                phone_number,
                key_material,
            }),
            Some(ProtocolEvent::Closed(mut reason)) => {
                reason.during_handshake = true;
                Some(Handshake::Ended(AttemptEnd::Closed(reason)))
            }
            Some(ProtocolEvent::PairingCode(code)) => {
                if self.snapshot.state == SessionState::AwaitingPairing {
                    self.show_qr(code);
                }
                None
            }
            Some(ProtocolEvent::CredentialsUpdated(_)) => None,
            Some(ProtocolEvent::Message(message)) => {
                debug!(tenant_id = %self.tenant, message_id = %message.id, "dropping message received before connection");
                None
            }
        }
    }

    async fn on_authenticated(&mut self, phone_number: String, key_material: Vec<u8>) {
        self.persist_credential(key_material).await;
        self.scheduler.on_connected();
        self.has_connected = true;

        self.snapshot.phone_number = Some(phone_number);
        self.snapshot.last_connected_at = Some(Utc::now());
        self.snapshot.reconnect_attempts = 0;
        self.snapshot.last_error = None;
        self.finish_attempt(AttemptOutcome::Connected, None);
        self.transition(SessionState::Connected);
    }

    /// Routes messages both ways until the link closes or the actor is stopped.
    async fn connected(&mut self, link: &mut ProtocolLink) -> AttemptEnd {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return AttemptEnd::Stopped,
                event = link.events.recv() => match event {
                    None => {
                        return AttemptEnd::Closed(CloseReason {
                            code: None,
                            message: "protocol event stream ended".to_string(),
                            during_handshake: false,
                        });
                    }
                    Some(ProtocolEvent::Closed(mut reason)) => {
                        reason.during_handshake = false;
                        return AttemptEnd::Closed(reason);
                    }
                    Some(ProtocolEvent::Message(message)) => {
                        if !self.forward_inbound(message).await {
                            return AttemptEnd::Stopped;
                        }
                    }
                    Some(ProtocolEvent::CredentialsUpdated(key_material)) => {
                        self.persist_credential(key_material).await;
                    }
                    Some(ProtocolEvent::Authenticated { phone_number, .. }) => {
                        self.snapshot.phone_number = Some(phone_number);
                        self.publish();
                    }
                    Some(ProtocolEvent::PairingCode(_)) => {
                        debug!(tenant_id = %self.tenant, "ignoring pairing code while connected");
                    }
                },
                command = self.commands.recv() => match command {
                    None => return AttemptEnd::Stopped,
                    Some(Command::Send { message, reply }) => {
                        if self.send(link, message, reply).await.is_err() {
                            return AttemptEnd::Stopped;
                        }
                    }
                },
            }
        }
    }

    /// Performs one send. `Err` means the actor was stopped mid-send.
    async fn send(
        &mut self,
        link: &ProtocolLink,
        message: OutboundMessage,
        reply: oneshot::Sender<Result<MessageId, SendError>>,
    ) -> Result<(), ()> {
        let limit = self.services.settings.send_timeout;
        let started = tokio::time::Instant::now();

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                let _ = reply.send(Err(SendError::SessionClosed));
                return Err(());
            }
            sent = tokio::time::timeout(limit, link.control.send(&message)) => match sent {
                Ok(Ok(id)) => Ok(id),
                Ok(Err(e)) => Err(SendError::Transport(e.to_string())),
                Err(_) => Err(SendError::Timeout { duration: limit }),
            },
        };

        let label = match &result {
            Ok(_) => "ok",
            Err(SendError::Timeout { .. }) => "timeout",
            Err(_) => "error",
        };
        metrics::record_send(label, started.elapsed().as_secs_f64());

        match &result {
            Ok(id) => debug!(tenant_id = %self.tenant, message_id = %id.0, "message sent"),
            Err(e) => warn!(tenant_id = %self.tenant, error = %e, "send failed"),
        }
        let _ = reply.send(result);
        Ok(())
    }

    /// Hands a message to the inbound queue. Returns false if stopped while waiting.
    async fn forward_inbound(&mut self, mut message: InboundMessage) -> bool {
        message.tenant_id = self.tenant.clone();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            queued = self.inbound.send(message) => {
                if queued.is_err() {
                    warn!(tenant_id = %self.tenant, "inbound queue closed, dropping message");
                }
                true
            }
        }
    }

    /// Decides what follows a closed link. `None` means loop back to `Initializing`.
    async fn after_disconnect(&mut self, reason: CloseReason) -> Option<Exit> {
        self.transition(SessionState::Disconnected);
        let class = self.services.classifier.classify(&reason);
        self.finish_attempt(AttemptOutcome::Failed, Some(class));
        warn!(
            tenant_id = %self.tenant,
            code = ?reason.code,
            during_handshake = reason.during_handshake,
            class = %class,
            "connection closed: {}",
            reason.message
        );

        match class {
            ErrorClass::LoggedOut => {
                if let Err(e) = self.discard_credential().await {
                    warn!(tenant_id = %self.tenant, error = %e, "failed to clear credential after logout");
                }
                self.snapshot.last_error = Some(FailureReason::LoggedOut);
                self.snapshot.phone_number = None;
                self.scheduler.reset();
                return Some(Exit::LoggedOut);
            }
            ErrorClass::CredentialCorrupt => {
                self.has_connected = false;
                if self.discard_credential().await.is_err() {
                    return Some(Exit::Failed(FailureReason::CredentialCorrupt));
                }
            }
            ErrorClass::Abnormal | ErrorClass::Transient => {}
        }

        match self.scheduler.on_failure(class) {
            RetryDecision::GiveUp(reason) => Some(Exit::Failed(reason)),
            RetryDecision::Retry {
                delay,
                strategy_index,
            } => {
                self.snapshot.last_error = Some(class.into());
                self.snapshot.reconnect_attempts = self.scheduler.attempts();
                self.set_strategy(strategy_index);
                info!(
                    tenant_id = %self.tenant,
                    attempt = self.scheduler.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    strategy = %self.services.catalog.get(strategy_index).name,
                    "reconnect scheduled"
                );
                self.transition(SessionState::ReconnectPending);
                if self.backoff(delay).await {
                    None
                } else {
                    Some(Exit::Stopped)
                }
            }
        }
    }

    /// Waits out the reconnect delay. Returns false if stopped meanwhile.
    async fn backoff(&mut self, delay: Duration) -> bool {
        let cancel = self.cancel.clone();
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = &mut sleep => return true,
                command = self.commands.recv() => {
                    if !self.reject_command(command) {
                        return false;
                    }
                }
            }
        }
    }

    async fn ensure_credential_loaded(&mut self) -> Result<(), AttemptEnd> {
        if self.credential_loaded {
            return Ok(());
        }

        match self.services.credentials.load(&self.tenant).await {
            Ok(credential) => {
                debug!(tenant_id = %self.tenant, found = credential.is_some(), "credential loaded");
                self.credential = credential;
                self.credential_loaded = true;
                Ok(())
            }
            Err(PairlineError::CredentialCorrupt { reason, .. }) => {
                warn!(tenant_id = %self.tenant, %reason, "stored credential is corrupt, pairing from scratch");
                self.snapshot.last_error = Some(FailureReason::CredentialCorrupt);
                match self.discard_credential().await {
                    Ok(()) => {
                        self.credential_loaded = true;
                        Ok(())
                    }
                    Err(_) => Err(AttemptEnd::Fatal(FailureReason::CredentialCorrupt)),
                }
            }
            Err(e) => {
                warn!(tenant_id = %self.tenant, error = %e, "credential store unavailable");
                Err(AttemptEnd::Fatal(FailureReason::Internal))
            }
        }
    }

    async fn discard_credential(&mut self) -> Result<(), PairlineError> {
        self.credential = None;
        self.services
            .credentials
            .delete(&self.tenant)
            .await
            .inspect_err(|e| warn!(tenant_id = %self.tenant, error = %e, "failed to delete credential"))
    }

    /// Saves new key material as the next credential version.
    async fn persist_credential(&mut self, key_material: Vec<u8>) {
        let version = self
            .credential
            .as_ref()
            .map_or(1, |c| c.version.saturating_add(1));
        let credential = Credential {
            tenant_id: self.tenant.clone(),
            key_material,
            version,
            saved_at: Utc::now(),
        };

        if let Err(e) = self.services.credentials.save(&self.tenant, &credential).await {
            warn!(tenant_id = %self.tenant, error = %e, "failed to persist credential");
        }
        self.credential = Some(credential);
        self.credential_loaded = true;
    }

    /// Replies `NotConnected` to a command. Returns false once all handles are gone.
    fn reject_command(&self, command: Option<Command>) -> bool {
        match command {
            None => false,
            Some(Command::Send { reply, .. }) => {
                let _ = reply.send(Err(SendError::NotConnected {
                    state: self.snapshot.state,
                }));
                true
            }
        }
    }

    fn show_qr(&mut self, code: String) {
        self.snapshot.qr_payload = Some(code);
        self.snapshot.qr_generated_at = Some(Utc::now());
        if self.snapshot.state == SessionState::AwaitingPairing {
            self.publish();
        } else {
            self.transition(SessionState::AwaitingPairing);
        }
    }

    fn set_strategy(&mut self, index: usize) {
        self.snapshot.active_strategy_index = index;
        self.snapshot.active_strategy = Some(self.services.catalog.get(index).name.clone());
    }

    fn begin_attempt(&mut self, strategy: &Strategy, index: usize) {
        let history = self.services.settings.attempt_history;
        let attempts = &mut self.snapshot.recent_attempts;
        attempts.push(ConnectionAttempt {
            tenant_id: self.tenant.clone(),
            strategy_name: strategy.name.clone(),
            strategy_index: index,
            started_at: Utc::now(),
            outcome: None,
            error_class: None,
        });
        if attempts.len() > history {
            let excess = attempts.len() - history;
            attempts.drain(..excess);
        }
    }

    /// Settles the open attempt, if any.
    fn finish_attempt(&mut self, outcome: AttemptOutcome, class: Option<ErrorClass>) {
        if let Some(attempt) = self.snapshot.recent_attempts.last_mut()
            && attempt.outcome.is_none()
        {
            attempt.outcome = Some(outcome);
            attempt.error_class = class;
            metrics::record_attempt(&attempt.strategy_name, outcome);
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.snapshot.state;
        if from == to {
            return;
        }
        debug_assert!(is_valid_transition(from, to), "invalid transition {from} -> {to}");

        self.snapshot.state = to;
        if to != SessionState::AwaitingPairing {
            self.snapshot.qr_payload = None;
            self.snapshot.qr_generated_at = None;
        }
        self.publish();

        let _ = self.transitions.send(StateTransition {
            tenant_id: self.tenant.clone(),
            from,
            to,
            strategy_index: self.snapshot.active_strategy_index,
            at: Utc::now(),
        });
        info!(
            tenant_id = %self.tenant,
            %from,
            %to,
            strategy_index = self.snapshot.active_strategy_index,
            "session state changed"
        );
        metrics::record_transition(to);
    }

    fn publish(&self) {
        self.status.send_replace(self.snapshot.clone());
    }

    fn finish(&mut self, exit: Exit) {
        // Close the queue first so the registry sees the actor as gone
        // before the final state is published.
        self.commands.close();
        while let Ok(Command::Send { reply, .. }) = self.commands.try_recv() {
            let _ = reply.send(Err(SendError::SessionClosed));
        }

        let exit = match exit {
            Exit::Stopped if self.deactivated.load(Ordering::SeqCst) => {
                self.finish_attempt(AttemptOutcome::Cancelled, None);
                Exit::Failed(FailureReason::Deactivated)
            }
            exit => exit,
        };

        match exit {
            Exit::Stopped => {
                self.finish_attempt(AttemptOutcome::Cancelled, None);
                self.transition(SessionState::Idle);
                info!(tenant_id = %self.tenant, "session stopped");
            }
            Exit::PairingTimeout => {
                self.snapshot.last_error = Some(FailureReason::PairingTimeout);
                self.finish_attempt(AttemptOutcome::PairingTimeout, None);
                self.transition(SessionState::Idle);
                warn!(tenant_id = %self.tenant, "pairing code was not scanned in time");
            }
            Exit::LoggedOut => {
                self.transition(SessionState::Idle);
                warn!(tenant_id = %self.tenant, "device logged out, credential cleared");
            }
            Exit::Failed(reason) => {
                self.snapshot.last_error = Some(reason);
                self.finish_attempt(AttemptOutcome::Failed, None);
                self.transition(SessionState::Failed);
                warn!(tenant_id = %self.tenant, %reason, "session failed");
            }
        }
    }
}

fn timed_out(what: &str, limit: Duration, during_handshake: bool) -> CloseReason {
    CloseReason {
        code: None,
        message: format!("{what} timed out after {limit:?}"),
        during_handshake,
    }
}

/// Transitions the actor may take. `Failed` is terminal.
pub fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::*;

    if from == Failed {
        return false;
    }
    matches!(
        (from, to),
        (Idle, Initializing)
            | (Initializing, AwaitingPairing | Authenticating | Disconnected)
            | (AwaitingPairing | Authenticating, Connected | Disconnected)
            | (Connected, Disconnected)
            | (Disconnected, ReconnectPending)
            | (ReconnectPending, Initializing)
            | (_, Idle | Failed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairline_core::LinkError;
    use pairline_test_utils::{MemoryCredentialStore, MockProtocol};

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            qr_refresh_interval: Duration::from_secs(20),
            max_qr_refreshes: 2,
            send_timeout: Duration::from_secs(5),
            stop_grace: Duration::from_secs(5),
            command_queue_capacity: 8,
            inbound_queue_capacity: 8,
            attempt_history: 4,
            reconnect: ReconnectConfig {
                jitter_ratio: 0.0,
                ..ReconnectConfig::default()
            },
        }
    }

    struct Fixture {
        protocol: Arc<MockProtocol>,
        store: Arc<MemoryCredentialStore>,
        services: SessionServices,
    }

    fn fixture() -> Fixture {
        let protocol = Arc::new(MockProtocol::new());
        let store = Arc::new(MemoryCredentialStore::new());
        let services = SessionServices::new(
            protocol.clone(),
            store.clone(),
            StrategyCatalog::builtin(),
            DisconnectClassifier::default(),
            settings(),
        );
        Fixture {
            protocol,
            store,
            services,
        }
    }

    fn spawn(fx: &Fixture, raw: &str) -> (Arc<SessionHandle>, mpsc::Receiver<InboundMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (SessionHandle::spawn(tenant(raw), fx.services.clone(), tx), rx)
    }

    fn outbound(content: &str) -> OutboundMessage {
        OutboundMessage {
            recipient: "+551199999999".into(),
            content: content.into(),
        }
    }

    #[test]
    fn failed_is_terminal() {
        for to in [SessionState::Idle, SessionState::Initializing, SessionState::Connected] {
            assert!(!is_valid_transition(SessionState::Failed, to));
        }
        assert!(is_valid_transition(SessionState::Connected, SessionState::Disconnected));
        assert!(!is_valid_transition(SessionState::Connected, SessionState::AwaitingPairing));
        assert!(is_valid_transition(SessionState::AwaitingPairing, SessionState::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn pairing_times_out_back_to_idle() {
        let fx = fixture();
        let (handle, _rx) = spawn(&fx, "acme");

        let snapshot = handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;
        assert_eq!(snapshot.qr_payload.as_deref(), Some("2@acme-qr-1"));

        let snapshot = handle.wait_for(|s| s.state == SessionState::Idle).await;
        assert_eq!(snapshot.last_error, Some(FailureReason::PairingTimeout));
        assert_eq!(snapshot.qr_payload, None);
        assert_eq!(
            snapshot.recent_attempts.last().unwrap().outcome,
            Some(AttemptOutcome::PairingTimeout)
        );

        // Initial code plus two refreshes.
        let link = fx.protocol.latest_link(&tenant("acme")).await.unwrap();
        assert_eq!(link.pairing_requests(), 3);
        assert!(link.is_closed());
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn qr_is_refreshed_on_interval() {
        let fx = fixture();
        let (handle, _rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.qr_payload.as_deref() == Some("2@acme-qr-1"))
            .await;

        let snapshot = handle
            .wait_for(|s| s.qr_payload.as_deref() == Some("2@acme-qr-2"))
            .await;
        assert_eq!(snapshot.state, SessionState::AwaitingPairing);
        handle.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn scan_persists_credential_and_connects() {
        let fx = fixture();
        let (handle, _rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;

        fx.protocol
            .latest_link(&tenant("acme"))
            .await
            .unwrap()
            .scan()
            .await;
        let snapshot = handle.wait_for(|s| s.state == SessionState::Connected).await;

        assert_eq!(snapshot.phone_number.as_deref(), Some(pairline_test_utils::MOCK_PHONE_NUMBER));
        assert!(snapshot.last_connected_at.is_some());
        assert_eq!(snapshot.qr_payload, None);
        let stored = fx.store.get(&tenant("acme")).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.key_material, b"keys-acme");
    }

    #[tokio::test(start_paused = true)]
    async fn send_before_connect_is_rejected() {
        let fx = fixture();
        let (handle, _rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;

        assert_eq!(
            handle.send(outbound("hi")).await,
            Err(SendError::NotConnected {
                state: SessionState::AwaitingPairing
            })
        );
        handle.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_times_out_without_ack() {
        let fx = fixture();
        fx.protocol.set_send_delay(Duration::from_secs(30)).await;
        let (handle, _rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;
        fx.protocol.latest_link(&tenant("acme")).await.unwrap().scan().await;
        handle.wait_for(|s| s.state == SessionState::Connected).await;

        assert_eq!(
            handle.send(outbound("hi")).await,
            Err(SendError::Timeout {
                duration: Duration::from_secs(5)
            })
        );
        // The session stays connected after a send timeout.
        assert_eq!(handle.state(), SessionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_rejection_is_reported() {
        let fx = fixture();
        fx.protocol.set_send_error("recipient not on network").await;
        let (handle, _rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;
        fx.protocol.latest_link(&tenant("acme")).await.unwrap().scan().await;
        handle.wait_for(|s| s.state == SessionState::Connected).await;

        assert!(matches!(
            handle.send(outbound("hi")).await,
            Err(SendError::Transport(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_messages_are_forwarded_with_tenant() {
        let fx = fixture();
        let (handle, mut rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;
        let link = fx.protocol.latest_link(&tenant("acme")).await.unwrap();
        link.scan().await;
        handle.wait_for(|s| s.state == SessionState::Connected).await;

        let id = link.deliver("+5511888", "oi").await;
        let message = rx.recv().await.unwrap();
        assert_eq!(message.id, id);
        assert_eq!(message.tenant_id, tenant("acme"));
        assert_eq!(message.sender_id, "+5511888");
    }

    #[tokio::test(start_paused = true)]
    async fn logout_clears_credential_and_idles() {
        let fx = fixture();
        let (handle, _rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;
        let link = fx.protocol.latest_link(&tenant("acme")).await.unwrap();
        link.scan().await;
        handle.wait_for(|s| s.state == SessionState::Connected).await;

        link.close_with(Some(401), "logged out", false).await;
        let snapshot = handle.wait_for(|s| s.state == SessionState::Idle).await;

        assert_eq!(snapshot.last_error, Some(FailureReason::LoggedOut));
        assert_eq!(snapshot.phone_number, None);
        assert!(fx.store.get(&tenant("acme")).await.is_none());
        assert_eq!(fx.protocol.open_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_credential_is_discarded_and_pairing_restarts() {
        let fx = fixture();
        fx.store
            .insert(Credential {
                tenant_id: tenant("acme"),
                key_material: b"old".to_vec(),
                version: 4,
                saved_at: Utc::now(),
            })
            .await;
        fx.store.mark_corrupt(&tenant("acme")).await;

        let (handle, _rx) = spawn(&fx, "acme");
        let snapshot = handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;

        assert_eq!(snapshot.last_error, Some(FailureReason::CredentialCorrupt));
        assert!(fx.store.get(&tenant("acme")).await.is_none());
        assert_eq!(fx.protocol.opens().await[0].credential, None);
        handle.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_session_code_repairs_from_first_strategy() {
        let fx = fixture();
        fx.store
            .insert(Credential {
                tenant_id: tenant("acme"),
                key_material: b"stale".to_vec(),
                version: 2,
                saved_at: Utc::now(),
            })
            .await;
        fx.protocol.set_auto_resume(false).await;

        let (handle, _rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.state == SessionState::Authenticating)
            .await;
        fx.protocol
            .latest_link(&tenant("acme"))
            .await
            .unwrap()
            .close_with(Some(500), "bad session", true)
            .await;

        let snapshot = handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;
        assert_eq!(snapshot.active_strategy_index, 0);
        assert!(fx.store.get(&tenant("acme")).await.is_none());
        let opens = fx.protocol.opens().await;
        assert_eq!(opens.len(), 2);
        assert_eq!(opens[1].credential, None);
        handle.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_timeout_counts_as_abnormal() {
        let fx = fixture();
        fx.store
            .insert(Credential {
                tenant_id: tenant("acme"),
                key_material: b"k".to_vec(),
                version: 1,
                saved_at: Utc::now(),
            })
            .await;
        fx.protocol.set_auto_resume(false).await;

        let (handle, _rx) = spawn(&fx, "acme");
        let snapshot = handle
            .wait_for(|s| s.state == SessionState::ReconnectPending)
            .await;

        assert_eq!(snapshot.active_strategy_index, 1);
        assert_eq!(snapshot.last_error, Some(FailureReason::AbnormalDisconnect));
        assert_eq!(snapshot.reconnect_attempts, 1);
        handle.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn open_failures_exhaust_strategies() {
        let fx = fixture();
        for _ in 0..32 {
            fx.protocol
                .fail_next_open(LinkError::Protocol("connection refused".into()))
                .await;
        }

        let (handle, _rx) = spawn(&fx, "acme");
        let snapshot = handle.wait_for(|s| s.state == SessionState::Failed).await;

        // Default caps: 4 strategies, 3 cycles.
        assert_eq!(snapshot.last_error, Some(FailureReason::StrategyExhausted));
        assert_eq!(fx.protocol.open_count().await, 12);
        assert!(snapshot.recent_attempts.len() <= 4);
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_drop_retries_same_strategy() {
        let fx = fixture();
        let (handle, _rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;
        let link = fx.protocol.latest_link(&tenant("acme")).await.unwrap();
        link.scan().await;
        handle.wait_for(|s| s.state == SessionState::Connected).await;

        link.close_with(Some(1001), "going away", false).await;
        let snapshot = handle
            .wait_for(|s| s.state == SessionState::Connected && s.reconnect_attempts == 0 && s.recent_attempts.len() == 2)
            .await;

        let opens = fx.protocol.opens().await;
        assert_eq!(opens.len(), 2);
        assert_eq!(opens[1].strategy, opens[0].strategy);
        assert_eq!(opens[1].credential.as_deref(), Some(&b"keys-acme"[..]));
        assert_eq!(fx.store.get(&tenant("acme")).await.unwrap().version, 2);
        assert_eq!(snapshot.active_strategy_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_backoff_goes_idle() {
        let fx = fixture();
        fx.protocol
            .fail_next_open(LinkError::Protocol("refused".into()))
            .await;
        let (handle, _rx) = spawn(&fx, "acme");
        handle
            .wait_for(|s| s.state == SessionState::ReconnectPending)
            .await;

        handle.stop(Duration::from_secs(1)).await;
        assert_eq!(handle.state(), SessionState::Idle);
        assert!(!handle.is_running());
        assert_eq!(fx.services.active_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_history_is_capped() {
        let fx = fixture();
        for _ in 0..6 {
            fx.protocol
                .fail_next_open(LinkError::Protocol("refused".into()))
                .await;
        }
        let (handle, _rx) = spawn(&fx, "acme");
        let snapshot = handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;

        assert_eq!(snapshot.recent_attempts.len(), 4);
        assert_eq!(snapshot.recent_attempts.last().unwrap().outcome, None);
        assert!(snapshot.recent_attempts[..3]
            .iter()
            .all(|a| a.outcome == Some(AttemptOutcome::Failed)));
        handle.stop(Duration::from_secs(1)).await;
    }

    async fn connected_fixture(fx: &Fixture, raw: &str) -> (Arc<SessionHandle>, pairline_test_utils::MockLink) {
        let (handle, _rx) = spawn(fx, raw);
        handle
            .wait_for(|s| s.state == SessionState::AwaitingPairing)
            .await;
        let link = fx.protocol.latest_link(&tenant(raw)).await.unwrap();
        link.scan().await;
        handle.wait_for(|s| s.state == SessionState::Connected).await;
        (handle, link)
    }

    #[tokio::test(start_paused = true)]
    async fn refused_reconnects_keep_the_working_strategy() {
        let fx = fixture();
        let (handle, link) = connected_fixture(&fx, "acme").await;

        for _ in 0..5 {
            fx.protocol
                .fail_next_open(LinkError::Protocol("tcp connect error: Connection refused".into()))
                .await;
        }
        link.close_with(Some(1001), "going away", false).await;

        // Pairing open, five refused reconnects, then a successful resume.
        fx.protocol.wait_for_opens(7).await;
        let snapshot = handle.wait_for(|s| s.state == SessionState::Connected).await;

        let strategies: Vec<String> = fx.protocol.opens().await.into_iter().map(|o| o.strategy).collect();
        assert!(strategies.iter().all(|name| name == &strategies[0]), "{strategies:?}");
        assert_eq!(snapshot.active_strategy_index, 0);
        assert_eq!(snapshot.reconnect_attempts, 0);
        assert!(snapshot
            .recent_attempts
            .iter()
            .filter(|a| a.outcome == Some(AttemptOutcome::Failed))
            .all(|a| a.error_class == Some(ErrorClass::Transient)));
    }

    #[tokio::test(start_paused = true)]
    async fn endless_refusals_after_connect_hit_the_retry_budget() {
        let fx = fixture();
        let (handle, link) = connected_fixture(&fx, "acme").await;

        for _ in 0..40 {
            fx.protocol
                .fail_next_open(LinkError::Protocol("Connection refused".into()))
                .await;
        }
        link.close_with(Some(1001), "going away", false).await;

        let snapshot = handle.wait_for(|s| s.state == SessionState::Failed).await;
        assert_eq!(snapshot.last_error, Some(FailureReason::RetryBudgetExhausted));
        assert_eq!(snapshot.active_strategy_index, 0);
        // The close and 19 refused opens use up the 20 allowed attempts.
        assert_eq!(fx.protocol.open_count().await, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn sends_are_serialized_in_submission_order() {
        let fx = fixture();
        fx.protocol.set_send_delay(Duration::from_secs(1)).await;
        let (handle, link) = connected_fixture(&fx, "acme").await;
        let started = tokio::time::Instant::now();

        let check_progress = async {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            let first = link.sent().await.len();
            tokio::time::sleep(Duration::from_secs(1)).await;
            (first, link.sent().await.len())
        };
        let (a, b, c, progress) = tokio::join!(
            handle.send(outbound("first")),
            handle.send(outbound("second")),
            handle.send(outbound("third")),
            check_progress,
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        // One ack per second: the next send waits for the previous one.
        assert_eq!(progress, (1, 2));
        assert!(started.elapsed() >= Duration::from_secs(3));
        let contents: Vec<String> = link.sent().await.into_iter().map(|m| m.content).collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_send_releases_the_next_one() {
        let fx = fixture();
        fx.protocol.set_send_delay(Duration::from_secs(30)).await;
        let (handle, link) = connected_fixture(&fx, "acme").await;
        let started = tokio::time::Instant::now();

        let (a, b) = tokio::join!(handle.send(outbound("first")), handle.send(outbound("second")));

        assert!(matches!(a, Err(SendError::Timeout { .. })));
        assert!(matches!(b, Err(SendError::Timeout { .. })));
        // Each send waited out its own five second window.
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(link.sent().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn refreshed_keys_are_persisted_as_next_version() {
        let fx = fixture();
        let (handle, link) = connected_fixture(&fx, "acme").await;
        assert_eq!(fx.store.get(&tenant("acme")).await.unwrap().version, 1);

        link.emit(ProtocolEvent::CredentialsUpdated(b"k2".to_vec())).await;
        // Round trip through the command queue so the event is handled first.
        let _ = handle.send(outbound("sync")).await;

        let stored = fx.store.get(&tenant("acme")).await.unwrap();
        assert_eq!(stored.key_material, b"k2");
        assert_eq!(stored.version, 2);
        assert_eq!(handle.state(), SessionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn deactivate_ends_in_failed() {
        let fx = fixture();
        let (handle, _link) = connected_fixture(&fx, "acme").await;

        handle.deactivate(Duration::from_secs(1)).await;
        let snapshot = handle.status();
        assert_eq!(snapshot.state, SessionState::Failed);
        assert_eq!(snapshot.last_error, Some(FailureReason::Deactivated));
        assert!(!handle.is_running());
    }
}
