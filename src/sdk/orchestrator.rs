// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The connection orchestrator.
//!
//! ```text
//! pending ──► loaded ──► connecting ──► connected ──► disconnected
//!    │                       ▲              │ ▲            │
//!    └──(stored transport)───┘              └─┘ (same      │
//!                            ▲                  scopes)    │
//!                            └─────────────────────────────┘
//! ```
//!
//! [`MultichainSdk`] picks a transport per `connect`, drives the install/QR
//! or deep-link presentation for the relay, persists the transport kind so
//! the next process can resume silently, and routes `invoke_method` calls.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::environment::{Environment, PlatformType};
use super::host::HostServices;
use crate::caip::Scope;
use crate::config::{SdkOptions, SDK_VERSION};
use crate::error::{SdkError, SdkResult, TransportError};
use crate::logging::{self, NAMESPACE_CORE};
use crate::rpc::{InvokeMethodOptions, RequestRouter, RpcNodeClient, WalletWake};
use crate::session::{get_session, SessionData};
use crate::transport::relay::protocol::{ConnectionMetadata, SdkMetadata};
use crate::transport::relay::{
    ConnectionRequest, DappClient, DappEvent, RelayTransport, RelayTransportOptions,
};
use crate::transport::{
    methods, ConnectOptions, ExtensionBridge, ExtensionTransport, Notification, Subscription,
    Transport, TransportKind,
};
use crate::ui::{
    connection_link, wallet_link, ConnectionModal, InstallController, LogModal, RequestSource,
};

const EVENT_BUFFER: usize = 64;

/// Delay before foregrounding the wallet when the relay is already up.
const CONNECTED_WAKE_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkState {
    Pending,
    Loaded,
    Connecting,
    Connected,
    Disconnected,
}

impl std::fmt::Display for SdkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SdkState::Pending => "pending",
            SdkState::Loaded => "loaded",
            SdkState::Connecting => "connecting",
            SdkState::Connected => "connected",
            SdkState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    /// `None` once the session is gone.
    SessionChanged(Option<SessionData>),
    StateChanged(SdkState),
    /// Every wallet notification, including `wallet_sessionChanged`.
    Notification(Notification),
}

#[derive(Clone)]
enum ActiveTransport {
    Extension(Arc<ExtensionTransport>),
    Relay(Arc<RelayTransport>),
}

impl ActiveTransport {
    fn as_transport(&self) -> Arc<dyn Transport> {
        match self {
            ActiveTransport::Extension(t) => t.clone(),
            ActiveTransport::Relay(t) => t.clone(),
        }
    }

    fn kind(&self) -> TransportKind {
        match self {
            ActiveTransport::Extension(_) => TransportKind::Extension,
            ActiveTransport::Relay(_) => TransportKind::Relay,
        }
    }
}

#[derive(Default)]
struct Handles {
    transport: Option<ActiveTransport>,
    subscription: Option<Subscription>,
    router: Option<Arc<RequestRouter>>,
    watchers: Vec<JoinHandle<()>>,
}

impl Handles {
    fn release(self) -> Option<ActiveTransport> {
        if let Some(subscription) = self.subscription {
            subscription.unsubscribe();
        }
        for watcher in self.watchers {
            watcher.abort();
        }
        self.transport
    }
}

/// Regenerates connection requests through the relay client.
struct ClientRequestSource {
    client: Arc<dyn DappClient>,
    metadata: ConnectionMetadata,
}

#[async_trait]
impl RequestSource for ClientRequestSource {
    async fn next_request(&self) -> Result<ConnectionRequest, TransportError> {
        let session_request = self.client.regenerate_request().await?;
        Ok(ConnectionRequest {
            session_request,
            metadata: self.metadata.clone(),
        })
    }
}

enum InstallStep {
    Done(SdkResult<()>),
    Expired,
    Present(ConnectionRequest),
    Continue,
}

struct SdkInner {
    options: SdkOptions,
    env: Environment,
    host: HostServices,
    sdk_info: String,
    debug: bool,
    state: watch::Sender<SdkState>,
    events: broadcast::Sender<SdkEvent>,
    handles: Mutex<Handles>,
    /// Bumped whenever the active transport is replaced or dropped.
    generation: AtomicU64,
    connect_lock: tokio::sync::Mutex<()>,
    connect_token: Mutex<Option<CancellationToken>>,
}

async fn cancellable<T>(
    token: &CancellationToken,
    operation: impl Future<Output = Result<T, TransportError>>,
) -> SdkResult<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SdkError::Cancelled),
        result = operation => Ok(result?),
    }
}

fn forward_notification(events: &broadcast::Sender<SdkEvent>, notification: &Notification) {
    if notification.method == methods::SESSION_CHANGED {
        match SessionData::from_result(&notification.params) {
            Ok(session) => {
                let _ = events.send(SdkEvent::SessionChanged(session));
            }
            Err(e) => warn!(error = %e, "Ignoring malformed session notification"),
        }
    }
    let _ = events.send(SdkEvent::Notification(notification.clone()));
}

/// Mirror relay channel drops and reattachments on the SDK state while
/// its transport is active.
async fn watch_channel(
    inner: Weak<SdkInner>,
    mut events: broadcast::Receiver<DappEvent>,
    generation: u64,
) {
    loop {
        let (from, to) = match events.recv().await {
            Ok(DappEvent::Disconnected) => (SdkState::Connected, SdkState::Disconnected),
            Ok(DappEvent::Connected) => (SdkState::Disconnected, SdkState::Connected),
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        let Some(inner) = inner.upgrade() else { break };
        if inner.generation.load(Ordering::SeqCst) != generation || inner.state() != from {
            continue;
        }
        match to {
            SdkState::Disconnected => warn!("Relay channel dropped"),
            _ => info!("Relay channel restored"),
        }
        inner.set_state(to);
    }
}

/// Flag an extension port closing on its own while its transport is active.
async fn watch_bridge(inner: Weak<SdkInner>, transport: Arc<ExtensionTransport>, generation: u64) {
    transport.closed().await;
    let Some(inner) = inner.upgrade() else { return };
    if inner.generation.load(Ordering::SeqCst) == generation
        && inner.state() == SdkState::Connected
    {
        warn!("Extension port closed");
        inner.set_state(SdkState::Disconnected);
    }
}

impl SdkInner {
    fn handles(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn state(&self) -> SdkState {
        *self.state.borrow()
    }

    fn emit(&self, event: SdkEvent) {
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: SdkState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "SDK state changed");
            self.emit(SdkEvent::StateChanged(state));
        }
    }

    fn active(&self) -> Option<ActiveTransport> {
        self.handles().transport.clone()
    }

    fn extension_bridge(&self) -> Option<Arc<dyn ExtensionBridge>> {
        if self.env.has_extension {
            self.host.extension.clone()
        } else {
            None
        }
    }

    fn modal(&self) -> Arc<dyn ConnectionModal> {
        match &self.host.modal {
            Some(modal) if !self.options.ui.headless => modal.clone(),
            _ => Arc::new(LogModal),
        }
    }

    fn open_link(&self, link: &str) {
        match &self.host.link_opener {
            Some(opener) => opener.open_link(link),
            None => info!(link, "Open this link to continue in the wallet"),
        }
    }

    fn connection_metadata(&self) -> ConnectionMetadata {
        ConnectionMetadata {
            dapp: self.options.dapp.clone(),
            sdk: SdkMetadata {
                version: SDK_VERSION.to_string(),
                platform: self.env.platform.as_str().to_string(),
            },
        }
    }

    fn analytics_enabled(&self) -> bool {
        self.options.analytics.enabled
            && (self.env.is_browser() || self.env.platform == PlatformType::ReactNative)
    }

    /// Make `active` the transport, replacing and releasing any previous one.
    fn install(self: &Arc<Self>, active: ActiveTransport) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let transport = active.as_transport();
        let events = self.events.clone();
        let subscription = transport.on_notification(Arc::new(move |n: &Notification| {
            forward_notification(&events, n)
        }));

        let mut watchers = Vec::new();
        match &active {
            ActiveTransport::Relay(relay) => {
                if let Some(focus) = &self.host.focus {
                    watchers.push(relay.watch_focus(focus.subscribe()));
                }
                watchers.push(tokio::spawn(watch_channel(
                    Arc::downgrade(self),
                    relay.client().subscribe(),
                    generation,
                )));
            }
            ActiveTransport::Extension(extension) => {
                watchers.push(tokio::spawn(watch_bridge(
                    Arc::downgrade(self),
                    extension.clone(),
                    generation,
                )));
            }
        }

        let previous = std::mem::replace(
            &mut *self.handles(),
            Handles {
                transport: Some(active),
                subscription: Some(subscription),
                router: None,
                watchers,
            },
        );
        previous.release();
    }

    fn release_transport(&self) -> Option<ActiveTransport> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let handles = std::mem::take(&mut *self.handles());
        handles.release()
    }

    fn ensure_extension(
        self: &Arc<Self>,
        bridge: Arc<dyn ExtensionBridge>,
    ) -> Arc<ExtensionTransport> {
        if let Some(ActiveTransport::Extension(transport)) = self.active() {
            return transport;
        }
        let transport = Arc::new(ExtensionTransport::with_timeout(
            bridge,
            self.options.relay.request_timeout,
        ));
        self.install(ActiveTransport::Extension(transport.clone()));
        transport
    }

    fn ensure_relay(self: &Arc<Self>) -> Arc<RelayTransport> {
        if let Some(ActiveTransport::Relay(transport)) = self.active() {
            return transport;
        }
        let relay = &self.options.relay;
        let client = self
            .host
            .relay
            .create_client(self.host.store.clone(), relay.request_ttl);
        let transport = Arc::new(RelayTransport::with_options(
            client,
            self.host.store.clone(),
            RelayTransportOptions {
                request_timeout: relay.request_timeout,
                connection_timeout: relay.connection_timeout,
            },
        ));
        self.install(ActiveTransport::Relay(transport.clone()));
        transport
    }

    async fn setup_analytics(&self) -> SdkResult<()> {
        if !self.analytics_enabled() {
            return Ok(());
        }
        let anon_id = self.host.store.get_anon_id().await?;
        let sink = &self.host.analytics;
        sink.set_global_property("sdk_version", SDK_VERSION);
        sink.set_global_property("dapp_id", self.options.dapp.dapp_id());
        sink.set_global_property("anon_id", &anon_id);
        sink.set_global_property("platform", self.env.platform.as_str());
        sink.set_global_property("integration_type", &self.options.analytics.integration_type);
        sink.enable();
        Ok(())
    }

    /// The transport recorded by a previous process, if it can still be used.
    async fn stored_transport(self: &Arc<Self>) -> SdkResult<Option<ActiveTransport>> {
        let Some(kind) = self.host.store.get_transport().await? else {
            return Ok(None);
        };

        match kind {
            TransportKind::Extension => {
                if let Some(bridge) = self
                    .extension_bridge()
                    .filter(|_| self.options.ui.prefer_extension)
                {
                    return Ok(Some(ActiveTransport::Extension(self.ensure_extension(bridge))));
                }
            }
            TransportKind::Relay => {
                let relay = self.ensure_relay();
                if relay.client().stored_session().await?.is_some() {
                    return Ok(Some(ActiveTransport::Relay(relay)));
                }
                debug!("No relay session left to resume");
                self.release_transport();
            }
        }

        self.host.store.remove_transport().await?;
        Ok(None)
    }

    async fn try_bootstrap(self: &Arc<Self>) -> SdkResult<()> {
        self.setup_analytics().await?;

        match self.stored_transport().await? {
            Some(active) => {
                let transport = active.as_transport();
                if !transport.is_connected() {
                    self.set_state(SdkState::Connecting);
                    transport.connect(None).await?;
                }
                self.host.store.set_transport(active.kind()).await?;
                self.set_state(SdkState::Connected);
                info!(transport = %active.kind(), "Resumed stored transport");

                let session = get_session(transport.as_ref()).await?;
                self.emit(SdkEvent::SessionChanged(session));
            }
            None => self.set_state(SdkState::Loaded),
        }

        if self.analytics_enabled() {
            self.host.analytics.track("sdk_initialized", &json!({}));
        }
        Ok(())
    }

    async fn bootstrap(self: &Arc<Self>) {
        if let Err(e) = self.try_bootstrap().await {
            warn!(error = %e, "SDK initialization failed");
            self.release_transport();
            if let Err(e) = self.host.store.remove_transport().await {
                warn!(error = %e, "Failed to clear stored transport");
            }
            self.set_state(SdkState::Pending);
        }
    }

    async fn connect_with(
        self: &Arc<Self>,
        options: ConnectOptions,
        token: &CancellationToken,
    ) -> SdkResult<TransportKind> {
        let ui = self.options.ui;
        let secure = self.env.is_secure_mobile();

        if let Some(active) = self.active() {
            let transport = active.as_transport();
            if transport.is_connected() && !secure {
                if self.state() != SdkState::Connected {
                    self.set_state(SdkState::Connecting);
                }
                cancellable(token, transport.connect(Some(options))).await?;
                return Ok(active.kind());
            }
        }

        let bridge = self.extension_bridge();
        if self.env.is_web() && ui.prefer_extension {
            if let Some(bridge) = bridge.clone() {
                self.set_state(SdkState::Connecting);
                let transport = self.ensure_extension(bridge);
                cancellable(token, transport.connect(Some(options))).await?;
                return Ok(TransportKind::Extension);
            }
        }

        let relay = self.ensure_relay();
        let desktop_preferred = if bridge.is_some() {
            ui.prefer_desktop
        } else {
            !ui.prefer_extension || ui.prefer_desktop
        };

        self.set_state(SdkState::Connecting);
        if secure && !desktop_preferred {
            self.deeplink_connect(&relay, options, token).await?;
        } else {
            self.install_connect(&relay, options, desktop_preferred, token)
                .await?;
        }
        Ok(TransportKind::Relay)
    }

    /// Relay connect behind the install/QR modal.
    async fn install_connect(
        &self,
        relay: &Arc<RelayTransport>,
        options: ConnectOptions,
        desktop_preferred: bool,
        token: &CancellationToken,
    ) -> SdkResult<()> {
        let client = relay.client().clone();
        let mut events = client.subscribe();
        let modal = self.modal();
        let source: Arc<dyn RequestSource> = Arc::new(ClientRequestSource {
            client,
            metadata: self.connection_metadata(),
        });
        let dismiss = token.child_token();
        let mut controller: Option<InstallController> = None;
        let mut shown = false;
        let mut attempt = relay.connect(Some(options.clone()));

        let result = loop {
            let step = tokio::select! {
                biased;
                _ = dismiss.cancelled() => InstallStep::Done(Err(SdkError::Cancelled)),
                result = &mut attempt => match result {
                    Ok(()) => InstallStep::Done(Ok(())),
                    Err(e) if e.is_request_expired() => InstallStep::Expired,
                    Err(e) => InstallStep::Done(Err(e.into())),
                },
                event = events.recv() => match event {
                    Ok(DappEvent::SessionRequest(session_request)) if controller.is_none() => {
                        InstallStep::Present(ConnectionRequest {
                            session_request,
                            metadata: self.connection_metadata(),
                        })
                    }
                    Ok(_) => InstallStep::Continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Relay events lagged during install flow");
                        InstallStep::Continue
                    }
                    Err(RecvError::Closed) => {
                        InstallStep::Done(Err(TransportError::Disconnected.into()))
                    }
                },
            };

            match step {
                InstallStep::Done(result) => break result,
                InstallStep::Continue => {}
                InstallStep::Expired => {
                    info!("Connection request expired before a wallet answered, starting over");
                    if let Some(controller) = controller.take() {
                        controller.stop().await;
                    }
                    attempt = relay.connect(Some(options.clone()));
                }
                InstallStep::Present(request) => {
                    let link = match connection_link(false, &request) {
                        Ok(link) => link,
                        Err(e) => break Err(e.into()),
                    };
                    if shown {
                        modal.update_link(&link);
                    } else {
                        modal.show(&link, desktop_preferred, dismiss.clone());
                        shown = true;
                    }
                    controller = Some(InstallController::start(
                        request,
                        source.clone(),
                        modal.clone(),
                        false,
                    ));
                }
            }
        };

        drop(attempt);
        if let Some(controller) = controller.take() {
            controller.stop().await;
        }
        if shown {
            modal.close();
        }
        if matches!(result, Err(SdkError::Cancelled)) && !token.is_cancelled() {
            debug!("Install modal dismissed, abandoning relay handshake");
            if let Err(e) = relay.disconnect().await {
                warn!(error = %e, "Failed to reset relay after dismissal");
            }
        }
        result
    }

    /// Relay connect by handing the request straight to the wallet app.
    async fn deeplink_connect(
        &self,
        relay: &Arc<RelayTransport>,
        options: ConnectOptions,
        token: &CancellationToken,
    ) -> SdkResult<()> {
        let use_deeplink = self.options.mobile.use_deeplink;
        let mut events = relay.client().subscribe();
        let already_connected = relay.is_connected();
        let mut opened = false;
        let wake = tokio::time::sleep(CONNECTED_WAKE_DELAY);
        tokio::pin!(wake);
        let mut attempt = relay.connect(Some(options));

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(SdkError::Cancelled),
                result = &mut attempt => return Ok(result?),
                _ = &mut wake, if already_connected && !opened => {
                    opened = true;
                    self.open_link(wallet_link(use_deeplink));
                }
                event = events.recv(), if !already_connected && !opened => match event {
                    Ok(DappEvent::SessionRequest(session_request)) => {
                        let request = ConnectionRequest {
                            session_request,
                            metadata: self.connection_metadata(),
                        };
                        let link = connection_link(use_deeplink, &request)?;
                        opened = true;
                        self.open_link(&link);
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => opened = true,
                },
            }
        }
    }

    fn router(&self) -> SdkResult<Arc<RequestRouter>> {
        if self.state() != SdkState::Connected {
            return Err(SdkError::Uninitialized("Provider"));
        }
        let mut handles = self.handles();
        if let Some(router) = &handles.router {
            return Ok(router.clone());
        }
        let transport = handles
            .transport
            .as_ref()
            .ok_or(SdkError::Uninitialized("Transport"))?
            .as_transport();

        let node = RpcNodeClient::new(self.options.api.rpc_urls(), self.sdk_info.clone())?;
        let wake = match &self.host.link_opener {
            Some(opener) if self.env.is_secure_mobile() && !self.options.ui.prefer_desktop => {
                Some(WalletWake {
                    opener: opener.clone(),
                    link: wallet_link(self.options.mobile.use_deeplink).to_string(),
                })
            }
            _ => None,
        };

        let router = Arc::new(RequestRouter::new(transport, node, wake));
        handles.router = Some(router.clone());
        Ok(router)
    }
}

/// Handle to one SDK instance. Build it with [`MultichainSdk::create`].
pub struct MultichainSdk {
    inner: Arc<SdkInner>,
}

impl MultichainSdk {
    /// Validate options, set up analytics, and resume a stored transport.
    ///
    /// A failed resume is not an error: the stored transport is forgotten and
    /// the SDK stays `pending` until the next `connect`.
    pub async fn create(
        mut options: SdkOptions,
        env: Environment,
        host: HostServices,
    ) -> SdkResult<Self> {
        options.dapp = options.dapp.validated(env.is_browser())?;
        let sdk_info = options.sdk_info(env.platform.as_str());
        let debug = logging::is_debug_enabled(NAMESPACE_CORE, &host.store).await;
        if debug {
            debug!(namespace = NAMESPACE_CORE, "Debug logging requested");
        }

        let (state, _) = watch::channel(SdkState::Pending);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let inner = Arc::new(SdkInner {
            options,
            env,
            host,
            sdk_info,
            debug,
            state,
            events,
            handles: Mutex::new(Handles::default()),
            generation: AtomicU64::new(0),
            connect_lock: tokio::sync::Mutex::new(()),
            connect_token: Mutex::new(None),
        });

        inner.bootstrap().await;
        Ok(Self { inner })
    }

    pub fn state(&self) -> SdkState {
        self.inner.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<SdkState> {
        self.inner.state.subscribe()
    }

    /// Session, state, and wallet notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SdkEvent> {
        self.inner.events.subscribe()
    }

    pub fn options(&self) -> &SdkOptions {
        &self.inner.options
    }

    pub fn environment(&self) -> Environment {
        self.inner.env
    }

    /// Whether the `debug` flag enabled the core namespace at creation.
    pub fn is_debug_enabled(&self) -> bool {
        self.inner.debug
    }

    pub fn sdk_info(&self) -> &str {
        &self.inner.sdk_info
    }

    /// The active transport. Only available while connected.
    pub fn transport(&self) -> SdkResult<Arc<dyn Transport>> {
        if self.state() != SdkState::Connected {
            return Err(SdkError::Uninitialized("Transport"));
        }
        self.inner
            .active()
            .map(|active| active.as_transport())
            .ok_or(SdkError::Uninitialized("Transport"))
    }

    /// The wallet's current session.
    pub async fn session(&self) -> SdkResult<Option<SessionData>> {
        let transport = self.transport()?;
        Ok(get_session(transport.as_ref()).await?)
    }

    /// Connect to a wallet and make sure the session covers `scopes` and
    /// `account_ids`. Concurrent calls are serialised.
    pub async fn connect(&self, scopes: Vec<Scope>, account_ids: Vec<String>) -> SdkResult<()> {
        let inner = &self.inner;
        let _guard = inner.connect_lock.lock().await;

        let token = CancellationToken::new();
        *inner
            .connect_token
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(token.clone());

        info!(scopes = ?scopes, accounts = account_ids.len(), "Connecting");
        let result = inner
            .connect_with(ConnectOptions::new(scopes, account_ids), &token)
            .await;

        inner
            .connect_token
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();

        let result = match result {
            Err(_) if token.is_cancelled() => Err(SdkError::Cancelled),
            Ok(kind) => match inner.host.store.set_transport(kind).await {
                Ok(()) => Ok(kind),
                Err(e) => Err(SdkError::from(e)),
            },
            Err(e) => Err(e),
        };
        match result {
            Ok(kind) => {
                inner.set_state(SdkState::Connected);
                info!(transport = %kind, "Connected");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Connect failed");
                inner.set_state(SdkState::Disconnected);
                if let Err(e) = inner.host.store.remove_transport().await {
                    warn!(error = %e, "Failed to clear stored transport");
                }
                Err(e)
            }
        }
    }

    /// Tear down the active transport and forget it.
    ///
    /// An in-flight `connect` fails with [`SdkError::Cancelled`].
    pub async fn disconnect(&self) -> SdkResult<()> {
        let inner = &self.inner;
        let token = inner
            .connect_token
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(token) = token {
            token.cancel();
        }

        if let Some(active) = inner.release_transport() {
            if let Err(e) = active.as_transport().disconnect().await {
                warn!(error = %e, "Transport disconnect failed");
            }
        }
        let removed = inner.host.store.remove_transport().await;

        inner.emit(SdkEvent::SessionChanged(None));
        inner.state.send_replace(SdkState::Disconnected);
        inner.emit(SdkEvent::StateChanged(SdkState::Disconnected));
        info!("Disconnected");

        removed?;
        Ok(())
    }

    /// Route one method call to the wallet, an RPC node, or local state.
    pub async fn invoke_method(&self, request: InvokeMethodOptions) -> SdkResult<Value> {
        let router = self.inner.router()?;
        router.invoke(&request).await
    }
}
