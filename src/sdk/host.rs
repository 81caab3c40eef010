// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Collaborators supplied by the host application.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use super::analytics::{AnalyticsSink, TracingAnalytics};
use crate::storage::Store;
use crate::transport::relay::{DappClient, MemoryRelayHub, RelayDappClient, WebSocketRelay};
use crate::transport::ExtensionBridge;
use crate::ui::{ConnectionModal, LinkOpener};

/// Builds a fresh relay client each time the relay transport is set up.
pub trait DappClientFactory: Send + Sync {
    fn create_client(&self, store: Store, request_ttl: Duration) -> Arc<dyn DappClient>;
}

/// Relay clients over a WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketClientFactory {
    url: String,
}

impl WebSocketClientFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl DappClientFactory for WebSocketClientFactory {
    fn create_client(&self, store: Store, request_ttl: Duration) -> Arc<dyn DappClient> {
        let socket = Arc::new(WebSocketRelay::new(self.url.clone()));
        Arc::new(RelayDappClient::with_request_ttl(socket, store, request_ttl))
    }
}

/// Relay clients on an in-process hub.
impl DappClientFactory for MemoryRelayHub {
    fn create_client(&self, store: Store, request_ttl: Duration) -> Arc<dyn DappClient> {
        Arc::new(RelayDappClient::with_request_ttl(
            Arc::new(self.endpoint()),
            store,
            request_ttl,
        ))
    }
}

pub struct HostServices {
    pub store: Store,
    /// Present when the host can reach an in-page extension.
    pub extension: Option<Arc<dyn ExtensionBridge>>,
    pub relay: Arc<dyn DappClientFactory>,
    /// Install/QR surface. Without one, links are only logged.
    pub modal: Option<Arc<dyn ConnectionModal>>,
    pub link_opener: Option<Arc<dyn LinkOpener>>,
    pub analytics: Arc<dyn AnalyticsSink>,
    /// Fires whenever the host regains focus.
    pub focus: Option<broadcast::Sender<()>>,
}

impl HostServices {
    /// Relay-only services with log-based analytics.
    pub fn new(store: Store, relay: Arc<dyn DappClientFactory>) -> Self {
        Self {
            store,
            extension: None,
            relay,
            modal: None,
            link_opener: None,
            analytics: Arc::new(TracingAnalytics),
            focus: None,
        }
    }

    pub fn with_extension(mut self, bridge: Arc<dyn ExtensionBridge>) -> Self {
        self.extension = Some(bridge);
        self
    }

    pub fn with_modal(mut self, modal: Arc<dyn ConnectionModal>) -> Self {
        self.modal = Some(modal);
        self
    }

    pub fn with_link_opener(mut self, opener: Arc<dyn LinkOpener>) -> Self {
        self.link_opener = Some(opener);
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn with_focus(mut self, focus: broadcast::Sender<()>) -> Self {
        self.focus = Some(focus);
        self
    }
}
