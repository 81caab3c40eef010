// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transports
//!
//! A transport moves JSON-RPC shaped messages between the dapp and the
//! wallet. Two strategies exist and exactly one is active per connection:
//!
//! | Kind | Type | Channel |
//! |------|------|---------|
//! | [`TransportKind::Extension`] | [`ExtensionTransport`] | In-page bridge to a browser extension |
//! | [`TransportKind::Relay`] | [`RelayTransport`] | Encrypted relay channel, reached via QR code or deep link |
//!
//! Both implement [`Transport`]. Wallet notifications are delivered through
//! callbacks registered with [`Transport::on_notification`]; the returned
//! [`Subscription`] removes the callback when unsubscribed.

pub mod extension;
pub mod jsonrpc;
pub mod relay;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::caip::Scope;
use crate::error::TransportError;

pub use extension::{ExtensionBridge, ExtensionTransport};
pub use jsonrpc::{methods, RpcErrorObject, RpcRequest, RpcResponse};
pub use relay::RelayTransport;

/// Per-request timeout used when the caller does not supply one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Added to the request timeout to bound a whole connection attempt.
pub const CONNECTION_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Which transport strategy was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Extension,
    Relay,
}

impl TransportKind {
    /// Persisted tag. Kept compatible with tags written by other SDK builds.
    pub fn as_tag(&self) -> &'static str {
        match self {
            TransportKind::Extension => "browser",
            TransportKind::Relay => "mwp",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "browser" | "extension" => Some(TransportKind::Extension),
            "mwp" | "relay" => Some(TransportKind::Relay),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Extension => f.write_str("extension"),
            TransportKind::Relay => f.write_str("relay"),
        }
    }
}

/// Scopes and accounts a connection should be negotiated for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectOptions {
    pub scopes: Vec<Scope>,
    pub account_ids: Vec<String>,
}

impl ConnectOptions {
    pub fn new(scopes: Vec<Scope>, account_ids: Vec<String>) -> Self {
        Self {
            scopes,
            account_ids,
        }
    }
}

/// Method and params of a request. The transport assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl TransportRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// A message pushed by the wallet (or synthesized by a transport).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// `wallet_sessionChanged` carrying a session payload.
    pub fn session_changed(session: Value) -> Self {
        Self::new(methods::SESSION_CHANGED, session)
    }
}

pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// The transport contract shared by both strategies.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Open the channel. With options, also make sure a session covering the
    /// requested scopes and accounts exists.
    async fn connect(&self, options: Option<ConnectOptions>) -> Result<(), TransportError>;

    /// Close the channel. Outstanding requests are rejected.
    async fn disconnect(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Send a request and wait for the matching response, for at most
    /// `timeout` (or the transport's default).
    async fn request(
        &self,
        request: TransportRequest,
        timeout: Option<Duration>,
    ) -> Result<RpcResponse, TransportError>;

    fn on_notification(&self, callback: NotificationCallback) -> Subscription;
}

// =============================================================================
// Notification fan-out
// =============================================================================

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: BTreeMap<u64, NotificationCallback>,
}

/// Registry of notification callbacks, shared by a transport and its tasks.
#[derive(Clone, Default)]
pub struct NotificationHub {
    inner: Arc<Mutex<HubInner>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(inner: &Mutex<HubInner>) -> MutexGuard<'_, HubInner> {
        inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, callback: NotificationCallback) -> Subscription {
        let mut inner = Self::lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, callback);
        Subscription {
            hub: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Call every registered callback. Callbacks run outside the lock so they
    /// may subscribe or unsubscribe.
    pub fn notify(&self, notification: &Notification) {
        let listeners: Vec<NotificationCallback> =
            Self::lock(&self.inner).listeners.values().cloned().collect();
        for listener in listeners {
            listener(notification);
        }
    }

    pub fn len(&self) -> usize {
        Self::lock(&self.inner).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`Transport::on_notification`].
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the subscription to be able to unsubscribe"]
#[derive(Debug)]
pub struct Subscription {
    hub: Weak<Mutex<HubInner>>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.hub.upgrade() {
            NotificationHub::lock(&inner).listeners.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn transport_tags() {
        assert_eq!(TransportKind::Relay.as_tag(), "mwp");
        assert_eq!(TransportKind::from_tag("browser"), Some(TransportKind::Extension));
        assert_eq!(TransportKind::from_tag("relay"), Some(TransportKind::Relay));
        assert_eq!(TransportKind::from_tag("nope"), None);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = NotificationHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let sub = hub.subscribe(Arc::new(move |_: &Notification| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let n = Notification::new("accountsChanged", Value::Null);
        hub.notify(&n);
        sub.unsubscribe();
        hub.notify(&n);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(hub.is_empty());
    }

    #[test]
    fn callbacks_may_subscribe_while_notified() {
        let hub = NotificationHub::new();
        let inner_hub = hub.clone();
        let _sub = hub.subscribe(Arc::new(move |_: &Notification| {
            let _nested = inner_hub.subscribe(Arc::new(|_: &Notification| {}));
        }));

        hub.notify(&Notification::new("x", Value::Null));
        assert_eq!(hub.len(), 2);
    }
}
