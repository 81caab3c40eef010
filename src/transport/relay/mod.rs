// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay Transport
//!
//! Talks to the wallet through a [`DappClient`] over an encrypted relay
//! channel. On top of the client this layer adds:
//!
//! - **Correlation**: every request gets a fresh string id and a pending
//!   entry; only a message carrying that id resolves it. Entries are removed
//!   on response, on timeout, and on disconnect (rejected).
//! - **Session cache**: the latest successful session response is stored
//!   under `cache_wallet_getSession` and answers `wallet_getSession` locally.
//!   Revocation and disconnect clear it.
//! - **Resume**: a stored relay session is resumed before falling back to a
//!   fresh handshake, bounded by the connection timeout.
//! - **Focus recovery**: [`RelayTransport::watch_focus`] reconnects whenever
//!   the host regains focus and the channel is down.

pub mod client;
pub mod protocol;
pub mod socket;
pub mod websocket;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::jsonrpc::{methods, RpcRequest, RpcResponse};
use super::{
    ConnectOptions, Notification, NotificationCallback, NotificationHub, Subscription, Transport,
    TransportKind, TransportRequest, CONNECTION_GRACE_PERIOD, DEFAULT_REQUEST_TIMEOUT,
};
use crate::error::{SessionError, TransportError};
use crate::session::{
    add_valid_accounts, negotiate, optional_scopes, valid_accounts, CreateSessionParams,
    SessionData,
};
use crate::storage::Store;

pub use client::{DappClient, DappClientState, DappEvent, RelayDappClient};
pub use protocol::{ConnectionMode, ConnectionRequest, SessionRequest};
pub use socket::{MemoryRelay, MemoryRelayHub, RelayFrame, RelaySocket};
pub use websocket::WebSocketRelay;

/// Timeouts of a relay transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTransportOptions {
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
}

impl Default for RelayTransportOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connection_timeout: DEFAULT_REQUEST_TIMEOUT + CONNECTION_GRACE_PERIOD,
        }
    }
}

type Responder = oneshot::Sender<Result<RpcResponse, TransportError>>;

/// A request waiting for its response.
struct PendingRequest {
    method: String,
    responder: Responder,
}

struct RelayInner {
    client: Arc<dyn DappClient>,
    store: Store,
    hub: NotificationHub,
    pending: Mutex<HashMap<String, PendingRequest>>,
    next_id: AtomicU64,
    options: RelayTransportOptions,
    connect_lock: tokio::sync::Mutex<()>,
    connect_token: Mutex<Option<CancellationToken>>,
}

impl RelayInner {
    fn pending(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Register a pending entry and return its receiver.
    fn register(
        &self,
        id: &str,
        method: &str,
    ) -> oneshot::Receiver<Result<RpcResponse, TransportError>> {
        let (responder, rx) = oneshot::channel();
        self.pending().insert(
            id.to_string(),
            PendingRequest {
                method: method.to_string(),
                responder,
            },
        );
        rx
    }

    fn reject_all(&self, error: TransportError) {
        let drained: Vec<(String, PendingRequest)> = self.pending().drain().collect();
        for (id, entry) in drained {
            debug!(id = %id, method = %entry.method, "Rejecting pending relay request");
            let _ = entry.responder.send(Err(error.clone()));
        }
    }

    async fn cache_session(&self, response: &RpcResponse) {
        match serde_json::to_string(response) {
            Ok(raw) => {
                if let Err(e) = self.store.set_cached_session(&raw).await {
                    warn!(error = %e, "Failed to cache session response");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize session response"),
        }
    }

    async fn clear_session_cache(&self) {
        if let Err(e) = self.store.remove_cached_session().await {
            warn!(error = %e, "Failed to clear cached session");
        }
    }

    /// Route one inbound wallet message.
    async fn handle_message(&self, message: Value) {
        let response: RpcResponse = match serde_json::from_value(message) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed relay message");
                return;
            }
        };

        let entry = response
            .id_string()
            .and_then(|id| self.pending().remove(&id));

        let method = match (&entry, &response.method) {
            (Some(entry), _) => Some(entry.method.clone()),
            (None, Some(method)) => Some(method.clone()),
            (None, None) => None,
        };

        if response.error.is_none() {
            match method.as_deref() {
                Some(m) if methods::is_session_lifecycle(m) => {
                    if let Some(session) = response.session_payload() {
                        self.cache_session(&response).await;
                        self.hub.notify(&Notification::session_changed(session.clone()));
                    }
                }
                Some(m) if m == methods::REVOKE_SESSION => self.clear_session_cache().await,
                Some(m) => {
                    let params = response
                        .params
                        .clone()
                        .or_else(|| response.result.clone())
                        .unwrap_or(Value::Null);
                    self.hub.notify(&Notification::new(m, params));
                }
                None => debug!("Relay message without id or method"),
            }
        }

        if let Some(entry) = entry {
            let _ = entry.responder.send(Ok(response));
        }
    }

    /// Answer `wallet_getSession` from the cache, if a session is cached.
    async fn cached_session_response(&self, id: &str) -> Option<RpcResponse> {
        let raw = match self.store.get_cached_session().await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read cached session");
                return None;
            }
        };
        let mut response: RpcResponse = serde_json::from_str(&raw).ok()?;
        response.session_payload()?;
        response.id = Some(Value::String(id.to_string()));
        response.method = Some(methods::GET_SESSION.to_string());
        Some(response)
    }

    async fn send(
        &self,
        request: TransportRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, TransportError> {
        let id = self.next_id();

        if request.method == methods::GET_SESSION {
            if let Some(cached) = self.cached_session_response(&id).await {
                debug!("Answering wallet_getSession from cache");
                return Ok(cached);
            }
        }

        let method = request.method.clone();
        let rx = self.register(&id, &method);
        let payload = serde_json::to_value(RpcRequest::new(id.clone(), request.method, request.params))
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        if let Err(e) = self.client.send_request(payload).await {
            self.pending().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Disconnected),
            Err(_) => {
                self.pending().remove(&id);
                Err(TransportError::Timeout {
                    method,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

async fn message_loop(inner: Weak<RelayInner>, mut events: broadcast::Receiver<DappEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Relay transport lagged behind client events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(inner) = inner.upgrade() else { break };
        match event {
            DappEvent::Message(message) => inner.handle_message(message).await,
            DappEvent::Disconnected => inner.reject_all(TransportError::Disconnected),
            DappEvent::SessionRequest(_) | DappEvent::Connected => {}
        }
    }
}

/// Transport over the encrypted relay channel.
pub struct RelayTransport {
    inner: Arc<RelayInner>,
    pump: JoinHandle<()>,
}

impl RelayTransport {
    pub fn new(client: Arc<dyn DappClient>, store: Store) -> Self {
        Self::with_options(client, store, RelayTransportOptions::default())
    }

    pub fn with_options(
        client: Arc<dyn DappClient>,
        store: Store,
        options: RelayTransportOptions,
    ) -> Self {
        let events = client.subscribe();
        let inner = Arc::new(RelayInner {
            client,
            store,
            hub: NotificationHub::new(),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            options,
            connect_lock: tokio::sync::Mutex::new(()),
            connect_token: Mutex::new(None),
        });
        let pump = tokio::spawn(message_loop(Arc::downgrade(&inner), events));
        Self { inner, pump }
    }

    pub fn client(&self) -> &Arc<dyn DappClient> {
        &self.inner.client
    }

    /// Number of requests still waiting for a response.
    pub fn pending_len(&self) -> usize {
        self.inner.pending().len()
    }

    /// Reconnect the channel whenever `focus` fires while disconnected.
    pub fn watch_focus(&self, mut focus: broadcast::Receiver<()>) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                match focus.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                let Some(inner) = inner.upgrade() else { break };
                if inner.client.state() == DappClientState::Connected {
                    continue;
                }
                debug!("Focus regained while disconnected, reconnecting relay");
                if let Err(e) = inner.client.reconnect().await {
                    warn!(error = %e, "Relay reconnect on focus failed");
                }
            }
        })
    }

    fn set_token(&self, token: Option<CancellationToken>) {
        *self
            .inner
            .connect_token
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = token;
    }

    async fn try_resume(&self, token: &CancellationToken) -> Result<bool, TransportError> {
        let stored = match self.inner.client.stored_session().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Could not read stored relay session");
                None
            }
        };
        let Some(stored) = stored else {
            return Ok(false);
        };

        let timeout = self.inner.options.connection_timeout;
        let outcome = tokio::select! {
            _ = token.cancelled() => return Err(TransportError::Disconnected),
            outcome = tokio::time::timeout(timeout, self.inner.client.resume(&stored.id)) => outcome,
        };

        match outcome {
            Ok(Ok(())) => {
                info!(session_id = %stored.id, "Resumed relay session");
                Ok(true)
            }
            Ok(Err(e)) => {
                warn!(session_id = %stored.id, error = %e, "Relay resume failed, starting a new handshake");
                Ok(false)
            }
            Err(_) => {
                warn!(session_id = %stored.id, "Relay resume timed out, starting a new handshake");
                Ok(false)
            }
        }
    }

    /// Handshake carrying a `wallet_createSession` as the initial payload.
    async fn handshake_with_session(
        &self,
        options: &ConnectOptions,
        token: &CancellationToken,
    ) -> Result<(), TransportError> {
        let optional_scopes = add_valid_accounts(
            &optional_scopes(&options.scopes),
            &valid_accounts(&options.account_ids),
        );
        let params = serde_json::to_value(CreateSessionParams { optional_scopes })
            .map_err(|e| SessionError::CreateFailed(e.to_string()))?;

        let id = self.inner.next_id();
        let rx = self.inner.register(&id, methods::CREATE_SESSION);
        let payload = serde_json::to_value(RpcRequest::new(
            id.clone(),
            methods::CREATE_SESSION,
            params,
        ))
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let handshake = tokio::select! {
            _ = token.cancelled() => Err(TransportError::Disconnected),
            result = self.inner.client.connect(ConnectionMode::Trusted, Some(payload)) => result,
        };
        if let Err(e) = handshake {
            self.inner.pending().remove(&id);
            return Err(e);
        }

        let timeout = self.inner.options.connection_timeout;
        let response = tokio::select! {
            _ = token.cancelled() => Err(TransportError::Disconnected),
            response = tokio::time::timeout(timeout, rx) => match response {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(TransportError::Disconnected),
                Err(_) => Err(TransportError::Timeout {
                    method: methods::CREATE_SESSION.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            },
        };
        if response.is_err() {
            self.inner.pending().remove(&id);
        }

        let result = response?
            .into_result()
            .map_err(|e| SessionError::CreateFailed(e.message))?;
        match SessionData::from_result(&result) {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(SessionError::CreateFailed("wallet returned an empty session".into()).into()),
            Err(e) => Err(SessionError::CreateFailed(e.to_string()).into()),
        }
    }

    async fn connect_inner(
        &self,
        options: Option<ConnectOptions>,
        token: &CancellationToken,
    ) -> Result<(), TransportError> {
        if self.try_resume(token).await? {
            if let Some(options) = options {
                negotiate(self, &options.scopes, &options.account_ids).await?;
            }
            return Ok(());
        }

        match options {
            Some(options) => self.handshake_with_session(&options, token).await,
            None => {
                tokio::select! {
                    _ = token.cancelled() => Err(TransportError::Disconnected),
                    result = self.inner.client.connect(ConnectionMode::Trusted, None) => result,
                }
            }
        }
    }
}

#[async_trait]
impl Transport for RelayTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Relay
    }

    async fn connect(&self, options: Option<ConnectOptions>) -> Result<(), TransportError> {
        let _guard = self.inner.connect_lock.lock().await;

        if self.is_connected() {
            if let Some(options) = options {
                negotiate(self, &options.scopes, &options.account_ids).await?;
            }
            return Ok(());
        }

        let token = CancellationToken::new();
        self.set_token(Some(token.clone()));
        let result = self.connect_inner(options, &token).await;
        self.set_token(None);
        result
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let token = self
            .inner
            .connect_token
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(token) = token {
            token.cancel();
        }

        let result = self.inner.client.disconnect().await;
        self.inner.reject_all(TransportError::Disconnected);
        self.inner.clear_session_cache().await;
        result
    }

    fn is_connected(&self) -> bool {
        self.inner.client.state() == DappClientState::Connected
    }

    async fn request(
        &self,
        request: TransportRequest,
        timeout: Option<Duration>,
    ) -> Result<RpcResponse, TransportError> {
        let timeout = timeout.unwrap_or(self.inner.options.request_timeout);
        let is_revoke = request.method == methods::REVOKE_SESSION;
        let response = self.inner.send(request, timeout).await?;
        if is_revoke && response.error.is_none() {
            self.inner.clear_session_cache().await;
        }
        Ok(response)
    }

    fn on_notification(&self, callback: NotificationCallback) -> Subscription {
        self.inner.hub.subscribe(callback)
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        self.pump.abort();
        self.inner.reject_all(TransportError::Disconnected);
    }
}
