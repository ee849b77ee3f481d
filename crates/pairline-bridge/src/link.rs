// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One WebSocket connection to the sidecar per protocol link.
//!
//! A background task owns the socket. It turns sidecar frames into
//! [`ProtocolEvent`]s, completes pending requests, and writes frames queued
//! by [`BridgeLinkControl`]. When the socket ends, a single `Closed` event
//! is emitted and every pending request fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use pairline_core::error::LinkError;
use pairline_core::traits::protocol::{LinkControl, ProtocolEvent};
use pairline_core::types::{CloseReason, InboundMessage, MessageId, OutboundMessage, TenantId};

use crate::frame::{ClientFrame, SidecarFrame, decode_key};

pub(crate) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code used when the socket ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Answer to a request frame.
enum Reply {
    PairingCode(String),
    Sent(MessageId),
    Rejected(String),
}

#[derive(Default)]
struct Pending {
    requests: Mutex<HashMap<String, oneshot::Sender<Reply>>>,
}

impl Pending {
    fn requests(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Reply>>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a request. The entry is removed when the returned guard
    /// drops, so abandoned requests do not linger until the link closes.
    fn register(&self, request_id: &str) -> (PendingGuard<'_>, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        self.requests().insert(request_id.to_string(), tx);
        let guard = PendingGuard {
            pending: self,
            request_id: request_id.to_string(),
        };
        (guard, rx)
    }

    /// Completes the request. Returns false when nobody is waiting for it.
    fn complete(&self, request_id: &str, reply: Reply) -> bool {
        match self.requests().remove(request_id) {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Drops every waiter, which fails their requests as closed.
    fn fail_all(&self) {
        self.requests().clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.requests().len()
    }
}

struct PendingGuard<'a> {
    pending: &'a Pending,
    request_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.requests().remove(&self.request_id);
    }
}

/// Command side of a bridge link.
pub struct BridgeLinkControl {
    tenant: TenantId,
    outgoing: mpsc::UnboundedSender<ClientFrame>,
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
}

impl BridgeLinkControl {
    fn closed_error(&self) -> LinkError {
        LinkError::Closed(CloseReason {
            code: None,
            message: "bridge link closed".to_string(),
            during_handshake: false,
        })
    }

    async fn request(&self, request_id: String, frame: ClientFrame) -> Result<Reply, LinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(self.closed_error());
        }
        let (_guard, reply) = self.pending.register(&request_id);
        if self.outgoing.send(frame).is_err() {
            return Err(self.closed_error());
        }
        reply.await.map_err(|_| self.closed_error())
    }
}

#[async_trait]
impl LinkControl for BridgeLinkControl {
    async fn request_pairing_code(&self) -> Result<String, LinkError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let frame = ClientFrame::RequestPairing {
            request_id: request_id.clone(),
        };
        match self.request(request_id, frame).await? {
            Reply::PairingCode(code) => Ok(code),
            Reply::Rejected(message) => Err(LinkError::Protocol(message)),
            Reply::Sent(_) => Err(LinkError::Protocol(
                "sidecar answered a pairing request with a send ack".to_string(),
            )),
        }
    }

    async fn send(&self, message: &OutboundMessage) -> Result<MessageId, LinkError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let frame = ClientFrame::Send {
            request_id: request_id.clone(),
            recipient: message.recipient.clone(),
            content: message.content.clone(),
        };
        match self.request(request_id, frame).await? {
            Reply::Sent(id) => Ok(id),
            Reply::Rejected(message) => Err(LinkError::Protocol(message)),
            Reply::PairingCode(_) => Err(LinkError::Protocol(
                "sidecar answered a send with a pairing code".to_string(),
            )),
        }
    }

    async fn close(&self) -> Result<(), LinkError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(tenant_id = %self.tenant, "closing bridge link");
            let _ = self.outgoing.send(ClientFrame::Close);
        }
        Ok(())
    }
}

/// Starts the socket task and returns the event receiver and control handle.
pub(crate) fn spawn_link(
    tenant: TenantId,
    socket: Socket,
    event_capacity: usize,
) -> (mpsc::Receiver<ProtocolEvent>, BridgeLinkControl) {
    let (events_tx, events_rx) = mpsc::channel(event_capacity.max(1));
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let pending = Arc::new(Pending::default());
    let closed = Arc::new(AtomicBool::new(false));

    let task = LinkTask {
        tenant: tenant.clone(),
        events: events_tx,
        pending: Arc::clone(&pending),
        closed: Arc::clone(&closed),
        authenticated: false,
    };
    tokio::spawn(task.run(socket, outgoing_rx));

    let control = BridgeLinkControl {
        tenant,
        outgoing: outgoing_tx,
        pending,
        closed,
    };
    (events_rx, control)
}

struct LinkTask {
    tenant: TenantId,
    events: mpsc::Sender<ProtocolEvent>,
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
    authenticated: bool,
}

impl LinkTask {
    async fn run(mut self, socket: Socket, mut outgoing: mpsc::UnboundedReceiver<ClientFrame>) {
        let (mut sink, mut stream) = socket.split();

        let reason = loop {
            tokio::select! {
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reason) = self.on_text(text.as_str()).await {
                            break Some(reason);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break Some(self.transport_closed(
                            frame.as_ref().map(|f| u16::from(f.code)),
                            frame
                                .as_ref()
                                .map(|f| String::from(&*f.reason))
                                .unwrap_or_else(|| "sidecar closed the connection".to_string()),
                        ));
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            break Some(self.transport_closed(None, e.to_string()));
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(self.transport_closed(None, e.to_string())),
                    None => {
                        break Some(self.transport_closed(
                            Some(ABNORMAL_CLOSURE),
                            "sidecar connection lost".to_string(),
                        ));
                    }
                },
                frame = outgoing.recv() => {
                    let frame = frame.unwrap_or(ClientFrame::Close);
                    let closing = frame == ClientFrame::Close;
                    match serde_json::to_string(&frame) {
                        Ok(json) => {
                            if let Err(e) = sink.send(Message::Text(json.into())).await {
                                if closing {
                                    break None;
                                }
                                break Some(self.transport_closed(None, e.to_string()));
                            }
                        }
                        Err(e) => warn!(tenant_id = %self.tenant, error = %e, "failed to encode bridge frame"),
                    }
                    if closing {
                        let _ = sink.send(Message::Close(None)).await;
                        break None;
                    }
                }
            }
        };

        self.closed.store(true, Ordering::SeqCst);
        self.pending.fail_all();
        if let Some(reason) = reason {
            let _ = self.events.send(ProtocolEvent::Closed(reason)).await;
        }
        debug!(tenant_id = %self.tenant, "bridge link task finished");
    }

    fn transport_closed(&self, code: Option<u16>, message: String) -> CloseReason {
        CloseReason {
            code,
            message,
            during_handshake: !self.authenticated,
        }
    }

    /// Handles one text frame. `Some` ends the link.
    async fn on_text(&mut self, text: &str) -> Option<CloseReason> {
        let frame = match serde_json::from_str::<SidecarFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(tenant_id = %self.tenant, error = %e, "ignoring malformed sidecar frame");
                return None;
            }
        };

        let event = match frame {
            SidecarFrame::PairingCode {
                request_id: Some(request_id),
                code,
            } => {
                if !self.pending.complete(&request_id, Reply::PairingCode(code.clone())) {
                    self.emit(ProtocolEvent::PairingCode(code)).await;
                }
                return None;
            }
            SidecarFrame::PairingCode {
                request_id: None,
                code,
            } => ProtocolEvent::PairingCode(code),
            SidecarFrame::Authenticated {
                phone_number,
                key_material,
            } => match decode_key(&key_material) {
                Ok(key_material) => {
                    self.authenticated = true;
                    ProtocolEvent::Authenticated {
                        phone_number,
                        key_material,
                    }
                }
                Err(e) => {
                    return Some(CloseReason {
                        code: None,
                        message: format!("sidecar sent undecodable key material: {e}"),
                        during_handshake: true,
                    });
                }
            },
            SidecarFrame::CredentialsUpdated { key_material } => match decode_key(&key_material) {
                Ok(key_material) => ProtocolEvent::CredentialsUpdated(key_material),
                Err(e) => {
                    warn!(tenant_id = %self.tenant, error = %e, "ignoring undecodable credential update");
                    return None;
                }
            },
            SidecarFrame::Message {
                id,
                sender_id,
                content,
                timestamp,
            } => ProtocolEvent::Message(InboundMessage {
                id,
                tenant_id: self.tenant.clone(),
                sender_id,
                content,
                timestamp: timestamp.unwrap_or_else(Utc::now),
            }),
            SidecarFrame::SendAck {
                request_id,
                message_id,
            } => {
                if !self.pending.complete(&request_id, Reply::Sent(MessageId(message_id))) {
                    debug!(tenant_id = %self.tenant, %request_id, "send ack for abandoned request");
                }
                return None;
            }
            SidecarFrame::Error {
                request_id,
                message,
            } => {
                let answered = match &request_id {
                    Some(id) => self.pending.complete(id, Reply::Rejected(message.clone())),
                    None => false,
                };
                if !answered {
                    warn!(tenant_id = %self.tenant, ?request_id, "sidecar error: {message}");
                }
                return None;
            }
            SidecarFrame::Closed {
                code,
                reason,
                during_handshake,
            } => {
                return Some(CloseReason {
                    code,
                    message: reason,
                    during_handshake: during_handshake.unwrap_or(!self.authenticated),
                });
            }
        };

        self.emit(event).await;
        None
    }

    async fn emit(&self, event: ProtocolEvent) {
        if self.events.send(event).await.is_err() {
            debug!(tenant_id = %self.tenant, "link event receiver dropped");
        }
    }
}
