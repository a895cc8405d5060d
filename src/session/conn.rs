//! Connection lifecycle driver
//!
//! Drives one accepted transport through the state machine in
//! [`state`](super::state): WebSocket handshake, credential verification,
//! registration, the serve loop, and teardown. Every failure is scoped to
//! this one connection.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::WebSocketStream;

use crate::auth::IdentityVerifier;
use crate::error::Result;
use crate::protocol::{extract_token, CloseReason};
use crate::registry::{ConnectionEntry, ConnectionRegistry, OutboundFrame, UserId};
use crate::router::MessageRouter;
use crate::server::ServerConfig;
use crate::session::state::SessionState;
use crate::stats::RelayStats;

/// Grace window for the writer to flush its close frame during teardown
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// One connection attempt, from accept to terminal state
pub struct Session<V: IdentityVerifier> {
    state: SessionState,
    config: ServerConfig,
    verifier: Arc<V>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<MessageRouter>,
    stats: Arc<RelayStats>,
}

impl<V: IdentityVerifier> Session<V> {
    /// Create a session for a freshly accepted transport.
    pub fn new(
        id: u64,
        peer_addr: SocketAddr,
        config: ServerConfig,
        verifier: Arc<V>,
        registry: Arc<ConnectionRegistry>,
        router: Arc<MessageRouter>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            state: SessionState::new(id, peer_addr),
            config,
            verifier,
            registry,
            router,
            stats,
        }
    }

    /// Drive the connection through its full lifecycle.
    pub async fn run(mut self, socket: TcpStream) -> Result<()> {
        // The handshake callback runs before accept_hdr_async returns; the
        // slot hands the credential out of it.
        let token_slot: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&token_slot);
        let callback = move |req: &Request,
                             response: Response|
              -> std::result::Result<Response, ErrorResponse> {
            if let Some(token) = req.uri().query().and_then(extract_token) {
                if let Ok(mut guard) = slot.lock() {
                    *guard = Some(token.to_string());
                }
            }
            Ok(response)
        };

        let handshake = tokio_tungstenite::accept_hdr_async(socket, callback);
        let ws = match tokio::time::timeout(self.config.handshake_timeout, handshake).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                self.state.reject();
                self.stats.record_rejected();
                tracing::debug!(
                    session_id = self.state.id,
                    peer = %self.state.peer_addr,
                    error = %e,
                    "WebSocket handshake failed"
                );
                return Err(e.into());
            }
            Err(_) => {
                self.state.reject();
                self.stats.record_rejected();
                tracing::debug!(
                    session_id = self.state.id,
                    peer = %self.state.peer_addr,
                    "WebSocket handshake timed out"
                );
                return Ok(());
            }
        };

        self.state.start_authentication();

        let token = token_slot.lock().ok().and_then(|mut guard| guard.take());
        let token = match token {
            Some(token) => token,
            None => {
                self.state.reject();
                self.stats.record_rejected();
                tracing::info!(
                    session_id = self.state.id,
                    peer = %self.state.peer_addr,
                    "Connection rejected: no credential supplied"
                );
                return close_with(ws, CloseReason::AuthenticationRequired).await;
            }
        };

        let verify = self.verifier.verify(&token);
        let identity = match tokio::time::timeout(self.config.auth_timeout, verify).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                self.state.reject();
                self.stats.record_rejected();
                tracing::info!(
                    session_id = self.state.id,
                    peer = %self.state.peer_addr,
                    "Connection rejected: invalid credential"
                );
                return close_with(ws, CloseReason::InvalidToken).await;
            }
            Err(_) => {
                self.state.reject();
                self.stats.record_rejected();
                tracing::warn!(
                    session_id = self.state.id,
                    peer = %self.state.peer_addr,
                    "Identity verifier timed out"
                );
                return close_with(ws, CloseReason::InternalError).await;
            }
        };

        self.state.activate(identity.clone());
        self.serve(ws, identity).await
    }

    /// Active phase: the connection is registered and frames flow both ways.
    async fn serve(mut self, ws: WebSocketStream<TcpStream>, identity: UserId) -> Result<()> {
        let (tx, rx) = mpsc::channel(self.config.send_queue_capacity.max(1));
        let entry = Arc::new(ConnectionEntry::new(
            self.state.id,
            identity.clone(),
            self.state.peer_addr,
            tx,
        ));

        self.registry.register(Arc::clone(&entry)).await;
        self.stats.record_connected();

        let (ws_tx, mut ws_rx) = ws.split();
        let mut writer = tokio::spawn(write_loop(ws_tx, rx));

        loop {
            tokio::select! {
                // Closed out-of-band: replaced by a newer connection for the
                // same identity, or an administrative disconnect.
                _ = entry.closed() => break,

                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        self.state.on_frame();
                        self.router.handle_frame(&entry, &text).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        self.state.on_frame();
                        match std::str::from_utf8(&data) {
                            Ok(text) => self.router.handle_frame(&entry, text).await,
                            Err(_) => self.router.reject_frame(&entry),
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = entry.send(OutboundFrame::Pong(Bytes::from(payload)));
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        tracing::debug!(
                            session_id = self.state.id,
                            error = %e,
                            "WebSocket read error"
                        );
                        break;
                    }
                },
            }
        }

        // Deregister before tearing down the writer so no lookup can return
        // a connection that is no longer being served.
        self.registry.deregister(&identity, self.state.id).await;
        self.state.close();
        self.stats.record_disconnected();

        // Gives the writer its close frame unless one is already queued.
        entry.close(CloseReason::Terminated);
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            writer.abort();
        }

        tracing::debug!(
            session_id = self.state.id,
            identity = %identity,
            frames = self.state.frames_received,
            dropped = entry.dropped_frames(),
            "Session finished"
        );
        Ok(())
    }
}

/// Forward queued frames to the socket until told to close.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut rx: mpsc::Receiver<OutboundFrame>,
) {
    while let Some(frame) = rx.recv().await {
        match frame {
            OutboundFrame::Data(payload) => {
                let text = String::from_utf8_lossy(&payload).into_owned();
                if ws_tx.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
            OutboundFrame::Pong(payload) => {
                if ws_tx.send(Message::Pong(payload.to_vec())).await.is_err() {
                    break;
                }
            }
            OutboundFrame::Close(reason) => {
                let _ = ws_tx.send(Message::Close(Some(reason.frame()))).await;
                break;
            }
        }
    }
    let _ = ws_tx.close().await;
}

/// Close a pre-registration transport with the given reason.
async fn close_with(mut ws: WebSocketStream<TcpStream>, reason: CloseReason) -> Result<()> {
    match ws.close(Some(reason.frame())).await {
        Ok(()) => Ok(()),
        // The peer beat us to it; not an error worth surfacing
        Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
