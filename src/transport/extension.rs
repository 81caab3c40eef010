// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transport over an in-page browser extension bridge.
//!
//! The bridge itself is host-provided ([`ExtensionBridge`]); this type adds
//! request ids, timeouts, session negotiation on connect, and the
//! `wallet_sessionChanged` fan-out for session-lifecycle results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::jsonrpc::{methods, RpcRequest, RpcResponse};
use super::{
    ConnectOptions, Notification, NotificationCallback, NotificationHub, Subscription, Transport,
    TransportKind, TransportRequest, DEFAULT_REQUEST_TIMEOUT,
};
use crate::error::TransportError;
use crate::session::negotiate;

/// Host-side handle to the wallet extension.
#[async_trait]
pub trait ExtensionBridge: Send + Sync {
    /// Open the port to the extension.
    async fn connect(&self) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Deliver one request and return the extension's response.
    async fn request(&self, request: RpcRequest) -> Result<RpcResponse, TransportError>;

    /// Stream of wallet-initiated notifications.
    fn notifications(&self) -> broadcast::Receiver<Notification>;

    /// Resolves when the extension port goes away on its own. Bridges that
    /// cannot observe this never resolve.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

pub struct ExtensionTransport {
    bridge: Arc<dyn ExtensionBridge>,
    hub: NotificationHub,
    next_id: AtomicU64,
    request_timeout: Duration,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ExtensionTransport {
    pub fn new(bridge: Arc<dyn ExtensionBridge>) -> Self {
        Self::with_timeout(bridge, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(bridge: Arc<dyn ExtensionBridge>, request_timeout: Duration) -> Self {
        Self {
            bridge,
            hub: NotificationHub::new(),
            next_id: AtomicU64::new(1),
            request_timeout,
            pump: Mutex::new(None),
        }
    }

    fn start_pump(&self) {
        let mut pump = self.pump.lock().unwrap_or_else(|p| p.into_inner());
        if pump.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let mut rx = self.bridge.notifications();
        let hub = self.hub.clone();
        *pump = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(notification) => hub.notify(&notification),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Extension notification stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Extension notification stream closed");
        }));
    }

    /// Resolves when the bridge reports its port closed.
    pub async fn closed(&self) {
        self.bridge.closed().await
    }

    fn stop_pump(&self) {
        let mut pump = self.pump.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = pump.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl Transport for ExtensionTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Extension
    }

    async fn connect(&self, options: Option<ConnectOptions>) -> Result<(), TransportError> {
        if !self.bridge.is_connected() {
            self.bridge.connect().await?;
        }
        self.start_pump();

        if let Some(options) = options {
            negotiate(self, &options.scopes, &options.account_ids).await?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.stop_pump();
        self.bridge.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.bridge.is_connected()
    }

    async fn request(
        &self,
        request: TransportRequest,
        timeout: Option<Duration>,
    ) -> Result<RpcResponse, TransportError> {
        let timeout = timeout.unwrap_or(self.request_timeout);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let method = request.method.clone();
        let rpc = RpcRequest::new(id, request.method, request.params);

        let response = tokio::time::timeout(timeout, self.bridge.request(rpc))
            .await
            .map_err(|_| TransportError::Timeout {
                method: method.clone(),
                timeout_ms: timeout.as_millis() as u64,
            })??;

        if methods::is_session_lifecycle(&method) {
            if let Some(session) = response.result.as_ref().filter(|r| !r.is_null()) {
                self.hub.notify(&Notification::session_changed(session.clone()));
            }
        }

        Ok(response)
    }

    fn on_notification(&self, callback: NotificationCallback) -> Subscription {
        self.hub.subscribe(callback)
    }
}

impl Drop for ExtensionTransport {
    fn drop(&mut self) {
        self.stop_pump();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeBridge;
    use super::*;
    use serde_json::{json, Value};

    fn collect(transport: &ExtensionTransport) -> (Arc<Mutex<Vec<Notification>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = transport.on_notification(Arc::new(move |n: &Notification| sink.lock().unwrap().push(n.clone())));
        (seen, sub)
    }

    #[tokio::test]
    async fn connect_negotiates_a_session() {
        let bridge = Arc::new(FakeBridge::new());
        bridge.reply(methods::GET_SESSION, Value::Null);
        bridge.reply(
            methods::CREATE_SESSION,
            json!({ "sessionScopes": { "eip155:1": { "methods": [], "notifications": [], "accounts": [] } } }),
        );
        let transport = ExtensionTransport::new(bridge.clone());
        let (seen, _sub) = collect(&transport);

        transport
            .connect(Some(ConnectOptions::new(vec!["eip155:1".into()], vec![])))
            .await
            .unwrap();

        assert!(transport.is_connected());
        assert_eq!(
            bridge.methods(),
            vec![methods::GET_SESSION, methods::CREATE_SESSION]
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, methods::SESSION_CHANGED);
    }

    #[tokio::test]
    async fn request_ids_are_unique() {
        let bridge = Arc::new(FakeBridge::new());
        let transport = ExtensionTransport::new(bridge.clone());

        for _ in 0..3 {
            transport
                .request(TransportRequest::new("eth_chainId", Value::Null), None)
                .await
                .unwrap();
        }

        let ids: Vec<String> = bridge.requests.lock().unwrap().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let bridge = Arc::new(FakeBridge::new());
        bridge.hang.store(true, Ordering::SeqCst);
        let transport = ExtensionTransport::new(bridge);

        let err = transport
            .request(
                TransportRequest::new("personal_sign", Value::Null),
                Some(Duration::from_millis(500)),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Timeout {
                method: "personal_sign".into(),
                timeout_ms: 500
            }
        );
    }

    #[tokio::test]
    async fn wallet_notifications_are_forwarded() {
        let bridge = Arc::new(FakeBridge::new());
        let transport = ExtensionTransport::new(bridge.clone());
        transport.connect(None).await.unwrap();
        let (seen, sub) = collect(&transport);

        bridge
            .tx
            .send(Notification::new("wallet_notify", json!({ "scope": "eip155:1" })))
            .unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(seen.lock().unwrap().len(), 1);

        sub.unsubscribe();
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn closed_resolves_when_the_port_goes_away() {
        let bridge = Arc::new(FakeBridge::new());
        let transport = Arc::new(ExtensionTransport::new(bridge.clone()));
        transport.connect(None).await.unwrap();

        let watcher = tokio::spawn({
            let transport = transport.clone();
            async move { transport.closed().await }
        });
        tokio::task::yield_now().await;
        assert!(!watcher.is_finished());

        bridge.drop_port();
        watcher.await.unwrap();
        assert!(!transport.is_connected());
    }
}
