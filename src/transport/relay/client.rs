// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session-oriented client for the encrypted relay channel.
//!
//! [`RelayDappClient`] owns the handshake and the sealed message channel:
//!
//! 1. `connect` creates a [`SessionRequest`] with a fresh key pair, listens on
//!    its handshake channel, and emits [`DappEvent::SessionRequest`] so the
//!    caller can render it.
//! 2. The wallet answers with a [`HandshakeOffer`] sealed to the request key.
//!    The client persists the resulting [`RelaySessionRecord`] and switches to
//!    the session channel.
//! 3. Every later message is a JSON value sealed to the peer key.
//!
//! While connecting, [`DappClient::regenerate_request`] replaces the live
//! request. Superseded requests keep accepting offers until their own expiry.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::{
    ConnectionMode, HandshakeOffer, RelaySessionRecord, SessionRequest, HANDSHAKE_CHANNEL_PREFIX,
};
use super::socket::{RelayFrame, RelaySocket};
use crate::crypto::{self, KeyPair};
use crate::error::TransportError;
use crate::storage::{Store, RELAY_SESSION_KEY};

/// Default lifetime of a connection request.
pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(60);

/// Lifetime of a negotiated relay session record.
pub const RELAY_SESSION_TTL_DAYS: i64 = 30;

/// How long an expired request waits for a replacement before `connect`
/// gives up.
pub const REGENERATION_GRACE: Duration = Duration::from_secs(2);

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DappClientState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DappEvent {
    /// A new connection request is live.
    SessionRequest(SessionRequest),
    Connected,
    Disconnected,
    /// A decrypted message from the wallet.
    Message(Value),
}

/// The relay session client the relay transport drives.
#[async_trait]
pub trait DappClient: Send + Sync {
    fn state(&self) -> DappClientState;

    fn subscribe(&self) -> broadcast::Receiver<DappEvent>;

    /// Run a fresh handshake. `initial_payload` is sent as soon as the
    /// session channel is up.
    async fn connect(
        &self,
        mode: ConnectionMode,
        initial_payload: Option<Value>,
    ) -> Result<(), TransportError>;

    /// Reattach to a stored session without a handshake.
    async fn resume(&self, session_id: &str) -> Result<(), TransportError>;

    /// Reopen the socket of the current session, if there is one.
    async fn reconnect(&self) -> Result<(), TransportError>;

    /// Drop the session and close the socket. An in-flight `connect` fails.
    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn send_request(&self, payload: Value) -> Result<(), TransportError>;

    async fn stored_session(&self) -> Result<Option<RelaySessionRecord>, TransportError>;

    /// Replace the live connection request. Only valid while connecting.
    async fn regenerate_request(&self) -> Result<SessionRequest, TransportError>;

    fn current_request(&self) -> Option<SessionRequest>;
}

struct PendingHandshake {
    request: SessionRequest,
    keys: KeyPair,
    deadline: Instant,
}

struct ActiveSession {
    record: RelaySessionRecord,
}

struct ClientState {
    state: DappClientState,
    handshakes: Vec<PendingHandshake>,
    session: Option<ActiveSession>,
    connect_token: Option<CancellationToken>,
    pump: Option<JoinHandle<()>>,
    // Bumped on every attach; a pump only reports a drop for its own attach.
    attached: u64,
}

fn lock_state(state: &Mutex<ClientState>) -> MutexGuard<'_, ClientState> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}

pub struct RelayDappClient {
    socket: Arc<dyn RelaySocket>,
    store: Store,
    request_ttl: Duration,
    events: broadcast::Sender<DappEvent>,
    regenerated: Notify,
    inner: Arc<Mutex<ClientState>>,
}

impl RelayDappClient {
    pub fn new(socket: Arc<dyn RelaySocket>, store: Store) -> Self {
        Self::with_request_ttl(socket, store, DEFAULT_REQUEST_TTL)
    }

    pub fn with_request_ttl(socket: Arc<dyn RelaySocket>, store: Store, request_ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            socket,
            store,
            request_ttl,
            events,
            regenerated: Notify::new(),
            inner: Arc::new(Mutex::new(ClientState {
                state: DappClientState::Disconnected,
                handshakes: Vec::new(),
                session: None,
                connect_token: None,
                pump: None,
                attached: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        lock_state(&self.inner)
    }

    fn emit(&self, event: DappEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Create a request, listen on its channel, and make it the live one.
    async fn new_request(&self, mode: ConnectionMode) -> Result<SessionRequest, TransportError> {
        let keys = KeyPair::generate();
        let id = Uuid::new_v4().to_string();
        let ttl_ms = self.request_ttl.as_millis() as i64;
        let request = SessionRequest {
            channel: format!("{HANDSHAKE_CHANNEL_PREFIX}{id}"),
            id,
            public_key_b64: keys.public_key_b64(),
            expires_at: Utc::now().timestamp_millis() + ttl_ms,
            mode,
        };

        self.socket.subscribe(&request.channel).await?;

        let mut expired = Vec::new();
        {
            let mut inner = self.lock();
            let now = Instant::now();
            inner.handshakes.retain(|h| {
                let live = h.deadline > now;
                if !live {
                    expired.push(h.request.channel.clone());
                }
                live
            });
            inner.handshakes.push(PendingHandshake {
                request: request.clone(),
                keys,
                deadline: now + self.request_ttl,
            });
        }
        self.leave_channels(expired).await;

        debug!(request_id = %request.id, expires_at = request.expires_at, "Connection request created");
        self.emit(DappEvent::SessionRequest(request.clone()));
        Ok(request)
    }

    fn live_deadline(&self) -> Option<Instant> {
        self.lock().handshakes.iter().map(|h| h.deadline).max()
    }

    /// Open a handshake frame if it belongs to an unexpired request.
    fn accept_offer(&self, frame: &RelayFrame) -> Option<RelaySessionRecord> {
        let inner = self.lock();
        let now = Instant::now();
        let handshake = inner
            .handshakes
            .iter()
            .find(|h| h.request.channel == frame.channel && h.deadline > now)?;

        let offer: HandshakeOffer = match handshake
            .keys
            .decrypt(&frame.payload)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
        {
            Ok(offer) => offer,
            Err(e) => {
                warn!(channel = %frame.channel, error = %e, "Ignoring unreadable handshake offer");
                return None;
            }
        };

        Some(RelaySessionRecord {
            id: handshake.request.id.clone(),
            channel: offer.channel_id,
            secret_key_b64: handshake.keys.secret_b64(),
            peer_public_key_b64: offer.public_key_b64,
            expires_at: Utc::now() + chrono::Duration::days(RELAY_SESSION_TTL_DAYS),
        })
    }

    async fn wait_for_offer(
        &self,
        frames: &mut broadcast::Receiver<RelayFrame>,
        status: &mut watch::Receiver<bool>,
        token: &CancellationToken,
    ) -> Result<RelaySessionRecord, TransportError> {
        loop {
            let deadline = self
                .live_deadline()
                .ok_or(TransportError::RequestExpired)?;

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(TransportError::Disconnected),
                _ = socket_closed(status) => {
                    return Err(TransportError::ConnectionFailed("relay socket closed".into()));
                }
                _ = self.regenerated.notified() => continue,
                _ = tokio::time::sleep_until(deadline + REGENERATION_GRACE) => {
                    return Err(TransportError::RequestExpired);
                }
                frame = frames.recv() => match frame {
                    Ok(frame) => {
                        if let Some(record) = self.accept_offer(&frame) {
                            return Ok(record);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Relay frames lagged during handshake");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(TransportError::ConnectionFailed("relay socket closed".into()));
                    }
                },
            }
        }
    }

    /// Switch to the session channel and start decrypting messages.
    async fn attach(&self, record: RelaySessionRecord) -> Result<(), TransportError> {
        let keys = KeyPair::from_secret_b64(&record.secret_key_b64)?;

        if !self.socket.is_open() {
            self.socket.open().await?;
        }
        let frames = self.socket.frames();
        let status = self.socket.status();
        self.socket.subscribe(&record.channel).await?;

        let mut inner = self.lock();
        inner.attached += 1;
        let pump = tokio::spawn(message_pump(
            frames,
            status,
            record.channel.clone(),
            keys,
            self.events.clone(),
            Arc::downgrade(&self.inner),
            inner.attached,
        ));
        if let Some(old) = inner.pump.replace(pump) {
            old.abort();
        }
        inner.session = Some(ActiveSession { record });
        inner.state = DappClientState::Connected;
        Ok(())
    }

    async fn drop_handshakes(&self) {
        let channels: Vec<String> = {
            let mut inner = self.lock();
            inner
                .handshakes
                .drain(..)
                .map(|h| h.request.channel)
                .collect()
        };
        self.leave_channels(channels).await;
    }

    async fn leave_channels(&self, channels: Vec<String>) {
        for channel in channels {
            if let Err(e) = self.socket.unsubscribe(&channel).await {
                debug!(channel = %channel, error = %e, "Failed to leave handshake channel");
            }
        }
    }

    async fn fail_connect(&self, error: TransportError) -> TransportError {
        self.drop_handshakes().await;
        let mut inner = self.lock();
        inner.connect_token = None;
        if inner.state == DappClientState::Connecting {
            inner.state = DappClientState::Disconnected;
        }
        error
    }
}

/// Resolves once the socket reports closed, or is gone.
async fn socket_closed(status: &mut watch::Receiver<bool>) {
    loop {
        if !*status.borrow_and_update() {
            return;
        }
        if status.changed().await.is_err() {
            return;
        }
    }
}

async fn message_pump(
    mut frames: broadcast::Receiver<RelayFrame>,
    mut status: watch::Receiver<bool>,
    channel: String,
    keys: KeyPair,
    events: broadcast::Sender<DappEvent>,
    state: Weak<Mutex<ClientState>>,
    attached: u64,
) {
    loop {
        let received = tokio::select! {
            _ = socket_closed(&mut status) => break,
            received = frames.recv() => received,
        };
        let frame = match received {
            Ok(frame) => frame,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Relay message pump lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if frame.channel != channel {
            continue;
        }

        let message = keys
            .decrypt(&frame.payload)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(|e| e.to_string()));
        match message {
            Ok(message) => {
                let _ = events.send(DappEvent::Message(message));
            }
            Err(e) => warn!(channel = %channel, error = %e, "Dropping unreadable relay message"),
        }
    }

    // The session record stays so `reconnect` can reattach.
    let Some(state) = state.upgrade() else { return };
    {
        let mut inner = lock_state(&state);
        if inner.attached != attached || inner.state != DappClientState::Connected {
            return;
        }
        inner.state = DappClientState::Disconnected;
        inner.pump = None;
    }
    warn!(channel = %channel, "Relay socket dropped");
    let _ = events.send(DappEvent::Disconnected);
}

#[async_trait]
impl DappClient for RelayDappClient {
    fn state(&self) -> DappClientState {
        self.lock().state
    }

    fn subscribe(&self) -> broadcast::Receiver<DappEvent> {
        self.events.subscribe()
    }

    async fn connect(
        &self,
        mode: ConnectionMode,
        initial_payload: Option<Value>,
    ) -> Result<(), TransportError> {
        let token = {
            let mut inner = self.lock();
            match inner.state {
                DappClientState::Connected => return Ok(()),
                DappClientState::Connecting => {
                    return Err(TransportError::ConnectionFailed(
                        "a connection attempt is already in progress".into(),
                    ))
                }
                DappClientState::Disconnected => {}
            }
            inner.state = DappClientState::Connecting;
            let token = CancellationToken::new();
            inner.connect_token = Some(token.clone());
            token
        };

        if let Err(e) = self.socket.open().await {
            return Err(self.fail_connect(e).await);
        }
        let mut frames = self.socket.frames();
        let mut status = self.socket.status();

        if let Err(e) = self.new_request(mode).await {
            return Err(self.fail_connect(e).await);
        }

        let record = match self.wait_for_offer(&mut frames, &mut status, &token).await {
            Ok(record) => record,
            Err(e) => return Err(self.fail_connect(e).await),
        };
        self.drop_handshakes().await;

        if let Err(e) = self.store.set_json(RELAY_SESSION_KEY, &record).await {
            return Err(self.fail_connect(e.into()).await);
        }

        let session_id = record.id.clone();
        if let Err(e) = self.attach(record).await {
            return Err(self.fail_connect(e).await);
        }
        self.lock().connect_token = None;

        info!(session_id = %session_id, "Relay session established");
        self.emit(DappEvent::Connected);

        if let Some(payload) = initial_payload {
            self.send_request(payload).await?;
        }
        Ok(())
    }

    async fn resume(&self, session_id: &str) -> Result<(), TransportError> {
        let record = self
            .stored_session()
            .await?
            .filter(|r| r.id == session_id)
            .ok_or_else(|| {
                TransportError::ConnectionFailed(format!("no stored relay session {session_id}"))
            })?;

        self.lock().state = DappClientState::Connecting;
        if let Err(e) = self.attach(record).await {
            self.lock().state = DappClientState::Disconnected;
            return Err(e);
        }

        info!(session_id = %session_id, "Relay session resumed");
        self.emit(DappEvent::Connected);
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), TransportError> {
        let record = self.lock().session.as_ref().map(|s| s.record.clone());
        let Some(record) = record else {
            debug!("No relay session to reconnect");
            return Ok(());
        };
        if self.socket.is_open() && self.state() == DappClientState::Connected {
            return Ok(());
        }

        self.attach(record).await?;
        info!("Relay session reconnected");
        self.emit(DappEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let (token, pump, session) = {
            let mut inner = self.lock();
            inner.state = DappClientState::Disconnected;
            (
                inner.connect_token.take(),
                inner.pump.take(),
                inner.session.take(),
            )
        };

        if let Some(token) = token {
            token.cancel();
        }
        if let Some(pump) = pump {
            pump.abort();
        }
        self.drop_handshakes().await;
        if let Some(session) = session {
            let _ = self.socket.unsubscribe(&session.record.channel).await;
        }

        self.socket.close().await?;
        self.store.delete(RELAY_SESSION_KEY).await?;

        self.emit(DappEvent::Disconnected);
        Ok(())
    }

    async fn send_request(&self, payload: Value) -> Result<(), TransportError> {
        let record = self
            .lock()
            .session
            .as_ref()
            .map(|s| s.record.clone())
            .ok_or(TransportError::Disconnected)?;

        let bytes =
            serde_json::to_vec(&payload).map_err(|e| TransportError::Protocol(e.to_string()))?;
        let sealed = crypto::encrypt(&bytes, &record.peer_public_key_b64)?;
        self.socket.publish(&record.channel, &sealed).await
    }

    async fn stored_session(&self) -> Result<Option<RelaySessionRecord>, TransportError> {
        let record: Option<RelaySessionRecord> = self.store.get_json(RELAY_SESSION_KEY).await?;
        match record {
            Some(record) if record.is_expired(Utc::now()) => {
                debug!(session_id = %record.id, "Stored relay session expired");
                self.store.delete(RELAY_SESSION_KEY).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn regenerate_request(&self) -> Result<SessionRequest, TransportError> {
        let mode = {
            let inner = self.lock();
            if inner.state != DappClientState::Connecting {
                return Err(TransportError::ConnectionFailed(
                    "no connection attempt to regenerate".into(),
                ));
            }
            inner
                .handshakes
                .last()
                .map(|h| h.request.mode)
                .unwrap_or(ConnectionMode::Trusted)
        };

        let request = self.new_request(mode).await?;
        self.regenerated.notify_one();
        Ok(request)
    }

    fn current_request(&self) -> Option<SessionRequest> {
        self.lock().handshakes.last().map(|h| h.request.clone())
    }
}

impl Drop for RelayDappClient {
    fn drop(&mut self) {
        let mut inner = self.lock();
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        if let Some(token) = inner.connect_token.take() {
            token.cancel();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::super::socket::MemoryRelayHub;
    use super::test_support::FakeWallet;
    use crate::transport::jsonrpc::RpcRequest;
    use super::*;
    use serde_json::json;

    async fn next_request(events: &mut broadcast::Receiver<DappEvent>) -> SessionRequest {
        loop {
            if let DappEvent::SessionRequest(request) = events.recv().await.unwrap() {
                return request;
            }
        }
    }

    async fn next_message(events: &mut broadcast::Receiver<DappEvent>) -> Value {
        loop {
            if let DappEvent::Message(message) = events.recv().await.unwrap() {
                return message;
            }
        }
    }

    #[tokio::test]
    async fn handshake_then_sealed_round_trip() {
        let hub = MemoryRelayHub::new();
        let store = Store::in_memory();
        let client = Arc::new(RelayDappClient::new(Arc::new(hub.endpoint()), store.clone()));
        let wallet = FakeWallet::new(&hub).await;
        let mut events = client.subscribe();

        let connecting = tokio::spawn({
            let client = client.clone();
            async move { client.connect(ConnectionMode::Trusted, None).await }
        });

        let request = next_request(&mut events).await;
        assert!(request.expires_at > Utc::now().timestamp_millis());
        let _serve = wallet
            .accept(
                &request,
                Arc::new(|req: &RpcRequest| Some(json!({ "jsonrpc": "2.0", "id": req.id, "result": "pong" }))),
            )
            .await;

        connecting.await.unwrap().unwrap();
        assert_eq!(client.state(), DappClientState::Connected);

        let record = client.stored_session().await.unwrap().unwrap();
        assert_eq!(record.id, request.id);
        assert_eq!(record.channel, wallet.channel);

        client
            .send_request(json!({ "jsonrpc": "2.0", "id": "9", "method": "ping" }))
            .await
            .unwrap();
        let reply = next_message(&mut events).await;
        assert_eq!(reply, json!({ "jsonrpc": "2.0", "id": "9", "result": "pong" }));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_request_without_regeneration_fails() {
        let hub = MemoryRelayHub::new();
        let client = RelayDappClient::with_request_ttl(
            Arc::new(hub.endpoint()),
            Store::in_memory(),
            Duration::from_secs(5),
        );

        let err = client
            .connect(ConnectionMode::Trusted, None)
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::RequestExpired);
        assert_eq!(client.state(), DappClientState::Disconnected);
        assert!(client.current_request().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_request_can_still_complete() {
        let hub = MemoryRelayHub::new();
        let client = Arc::new(RelayDappClient::with_request_ttl(
            Arc::new(hub.endpoint()),
            Store::in_memory(),
            Duration::from_secs(60),
        ));
        let wallet = FakeWallet::new(&hub).await;
        let mut events = client.subscribe();

        let connecting = tokio::spawn({
            let client = client.clone();
            async move { client.connect(ConnectionMode::Trusted, None).await }
        });

        let first = next_request(&mut events).await;
        let second = client.regenerate_request().await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(client.current_request().unwrap().id, second.id);

        let _serve = wallet.accept(&first, Arc::new(|_: &RpcRequest| None)).await;
        connecting.await.unwrap().unwrap();

        assert_eq!(client.stored_session().await.unwrap().unwrap().id, first.id);
        assert!(client.current_request().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn regeneration_leaves_expired_request_channels() {
        let hub = MemoryRelayHub::new();
        let client = Arc::new(RelayDappClient::with_request_ttl(
            Arc::new(hub.endpoint()),
            Store::in_memory(),
            Duration::from_secs(5),
        ));
        let mut events = client.subscribe();

        let connecting = tokio::spawn({
            let client = client.clone();
            async move { client.connect(ConnectionMode::Trusted, None).await }
        });
        let first = next_request(&mut events).await;
        assert_eq!(hub.subscribers(&first.channel), 1);

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        let second = client.regenerate_request().await.unwrap();

        assert_eq!(hub.subscribers(&first.channel), 0);
        assert_eq!(hub.subscribers(&second.channel), 1);

        client.disconnect().await.unwrap();
        assert_eq!(connecting.await.unwrap(), Err(TransportError::Disconnected));
    }

    #[tokio::test]
    async fn dropped_socket_reports_disconnected_and_reconnects() {
        let hub = MemoryRelayHub::new();
        let socket = Arc::new(hub.endpoint());
        let client = Arc::new(RelayDappClient::new(socket.clone(), Store::in_memory()));
        let wallet = FakeWallet::new(&hub).await;
        let mut events = client.subscribe();

        let connecting = tokio::spawn({
            let client = client.clone();
            async move { client.connect(ConnectionMode::Trusted, None).await }
        });
        let request = next_request(&mut events).await;
        let _serve = wallet
            .accept(
                &request,
                Arc::new(|req: &RpcRequest| Some(json!({ "jsonrpc": "2.0", "id": req.id, "result": "pong" }))),
            )
            .await;
        connecting.await.unwrap().unwrap();

        socket.close().await.unwrap();
        while events.recv().await.unwrap() != DappEvent::Disconnected {}
        assert_eq!(client.state(), DappClientState::Disconnected);
        assert!(client.stored_session().await.unwrap().is_some());

        client.reconnect().await.unwrap();
        assert_eq!(client.state(), DappClientState::Connected);
        assert!(socket.is_open());

        client
            .send_request(json!({ "jsonrpc": "2.0", "id": "3", "method": "ping" }))
            .await
            .unwrap();
        assert_eq!(
            next_message(&mut events).await,
            json!({ "jsonrpc": "2.0", "id": "3", "result": "pong" })
        );
    }

    #[tokio::test]
    async fn explicit_disconnect_is_reported_once() {
        let hub = MemoryRelayHub::new();
        let wallet = FakeWallet::new(&hub).await;
        let dapp_keys = KeyPair::generate();
        let store = Store::in_memory();
        let record = RelaySessionRecord {
            id: "stored".into(),
            channel: wallet.channel.clone(),
            secret_key_b64: dapp_keys.secret_b64(),
            peer_public_key_b64: wallet.keys.public_key_b64(),
            expires_at: Utc::now() + chrono::Duration::days(1),
        };
        store.set_json(RELAY_SESSION_KEY, &record).await.unwrap();

        let client = RelayDappClient::new(Arc::new(hub.endpoint()), store);
        client.resume("stored").await.unwrap();
        let mut events = client.subscribe();

        client.disconnect().await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(events.try_recv().unwrap(), DappEvent::Disconnected);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn regenerate_outside_connect_is_rejected() {
        let hub = MemoryRelayHub::new();
        let client = RelayDappClient::new(Arc::new(hub.endpoint()), Store::in_memory());
        assert!(client.regenerate_request().await.is_err());
    }

    #[tokio::test]
    async fn disconnect_cancels_a_pending_handshake() {
        let hub = MemoryRelayHub::new();
        let client = Arc::new(RelayDappClient::new(Arc::new(hub.endpoint()), Store::in_memory()));
        let mut events = client.subscribe();

        let connecting = tokio::spawn({
            let client = client.clone();
            async move { client.connect(ConnectionMode::Trusted, None).await }
        });
        next_request(&mut events).await;

        client.disconnect().await.unwrap();

        assert_eq!(connecting.await.unwrap(), Err(TransportError::Disconnected));
        assert_eq!(client.state(), DappClientState::Disconnected);
    }

    #[tokio::test]
    async fn resume_reattaches_a_stored_session() {
        let hub = MemoryRelayHub::new();
        let store = Store::in_memory();
        let wallet = FakeWallet::new(&hub).await;

        let dapp_keys = KeyPair::generate();
        let record = RelaySessionRecord {
            id: "stored".into(),
            channel: wallet.channel.clone(),
            secret_key_b64: dapp_keys.secret_b64(),
            peer_public_key_b64: wallet.keys.public_key_b64(),
            expires_at: Utc::now() + chrono::Duration::days(1),
        };
        store.set_json(RELAY_SESSION_KEY, &record).await.unwrap();

        let client = RelayDappClient::new(Arc::new(hub.endpoint()), store);
        let mut events = client.subscribe();

        assert!(client.resume("other").await.is_err());
        client.resume("stored").await.unwrap();
        assert_eq!(client.state(), DappClientState::Connected);

        wallet.socket.subscribe(&wallet.channel).await.unwrap();
        wallet
            .push(&dapp_keys.public_key_b64(), &json!({ "method": "accountsChanged" }))
            .await;
        assert_eq!(
            next_message(&mut events).await,
            json!({ "method": "accountsChanged" })
        );
    }

    #[tokio::test]
    async fn expired_stored_session_is_discarded() {
        let store = Store::in_memory();
        let record = RelaySessionRecord {
            id: "old".into(),
            channel: "session:old".into(),
            secret_key_b64: KeyPair::generate().secret_b64(),
            peer_public_key_b64: KeyPair::generate().public_key_b64(),
            expires_at: Utc::now() - chrono::Duration::seconds(1),
        };
        store.set_json(RELAY_SESSION_KEY, &record).await.unwrap();

        let client = RelayDappClient::new(Arc::new(MemoryRelayHub::new().endpoint()), store.clone());
        assert_eq!(client.stored_session().await.unwrap(), None);
        assert_eq!(store.get(RELAY_SESSION_KEY).await.unwrap(), None);
    }
}
