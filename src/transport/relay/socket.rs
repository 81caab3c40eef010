// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Publish/subscribe sockets the relay client talks through.
//!
//! A relay socket moves opaque text payloads on named channels. It knows
//! nothing about encryption or JSON-RPC; the dapp client layers both on top.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::error::TransportError;

/// Frames buffered per subscriber before it starts lagging.
pub const FRAME_BUFFER: usize = 256;

/// A payload received on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFrame {
    pub channel: String,
    pub payload: String,
}

#[async_trait]
pub trait RelaySocket: Send + Sync {
    async fn open(&self) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;

    async fn subscribe(&self, channel: &str) -> Result<(), TransportError>;

    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), TransportError>;

    /// Frames for every subscribed channel, from the moment of the call.
    fn frames(&self) -> broadcast::Receiver<RelayFrame>;

    /// Open flag. Flips to `false` on `close` and when the connection drops
    /// underneath the socket.
    fn status(&self) -> watch::Receiver<bool>;
}

// =============================================================================
// In-process relay
// =============================================================================

struct Endpoint {
    open: bool,
    channels: HashSet<String>,
    tx: broadcast::Sender<RelayFrame>,
}

#[derive(Default)]
struct HubState {
    endpoints: HashMap<u64, Endpoint>,
}

/// An in-process relay server. Each [`MemoryRelay`] endpoint attached to
/// the same hub sees what the others publish on channels it subscribed to.
#[derive(Clone, Default)]
pub struct MemoryRelayHub {
    state: Arc<Mutex<HubState>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryRelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(state: &Mutex<HubState>) -> MutexGuard<'_, HubState> {
        state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Attach a new, closed endpoint.
    pub fn endpoint(&self) -> MemoryRelay {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = broadcast::channel(FRAME_BUFFER);
        Self::lock(&self.state).endpoints.insert(
            id,
            Endpoint {
                open: false,
                channels: HashSet::new(),
                tx: tx.clone(),
            },
        );
        let (status, _) = watch::channel(false);
        MemoryRelay {
            state: self.state.clone(),
            id,
            tx,
            status,
        }
    }

    /// Number of open endpoints subscribed to `channel`.
    pub fn subscribers(&self, channel: &str) -> usize {
        Self::lock(&self.state)
            .endpoints
            .values()
            .filter(|e| e.open && e.channels.contains(channel))
            .count()
    }
}

/// One connection to a [`MemoryRelayHub`].
pub struct MemoryRelay {
    state: Arc<Mutex<HubState>>,
    id: u64,
    tx: broadcast::Sender<RelayFrame>,
    status: watch::Sender<bool>,
}

impl MemoryRelay {
    fn with_endpoint<R>(&self, f: impl FnOnce(&mut Endpoint) -> R) -> Option<R> {
        MemoryRelayHub::lock(&self.state)
            .endpoints
            .get_mut(&self.id)
            .map(f)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TransportError::ConnectionFailed("relay socket is closed".into()))
        }
    }
}

#[async_trait]
impl RelaySocket for MemoryRelay {
    async fn open(&self) -> Result<(), TransportError> {
        self.with_endpoint(|e| e.open = true);
        self.status.send_replace(true);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.with_endpoint(|e| {
            e.open = false;
            e.channels.clear();
        });
        self.status.send_replace(false);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.with_endpoint(|e| e.open).unwrap_or(false)
    }

    async fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.with_endpoint(|e| e.channels.insert(channel.to_string()));
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.with_endpoint(|e| e.channels.remove(channel));
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        let state = MemoryRelayHub::lock(&self.state);
        for (id, endpoint) in &state.endpoints {
            if *id == self.id || !endpoint.open || !endpoint.channels.contains(channel) {
                continue;
            }
            // No receivers just means nobody is listening right now.
            let _ = endpoint.tx.send(RelayFrame {
                channel: channel.to_string(),
                payload: payload.to_string(),
            });
        }
        Ok(())
    }

    fn frames(&self) -> broadcast::Receiver<RelayFrame> {
        self.tx.subscribe()
    }

    fn status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }
}

impl Drop for MemoryRelay {
    fn drop(&mut self) {
        MemoryRelayHub::lock(&self.state).endpoints.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_reach_other_subscribers_only() {
        let hub = MemoryRelayHub::new();
        let a = hub.endpoint();
        let b = hub.endpoint();
        a.open().await.unwrap();
        b.open().await.unwrap();

        let mut a_frames = a.frames();
        let mut b_frames = b.frames();
        a.subscribe("chan").await.unwrap();
        b.subscribe("chan").await.unwrap();

        a.publish("chan", "hello").await.unwrap();

        let frame = b_frames.recv().await.unwrap();
        assert_eq!(frame.channel, "chan");
        assert_eq!(frame.payload, "hello");
        assert!(a_frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_endpoints_cannot_publish_or_receive() {
        let hub = MemoryRelayHub::new();
        let a = hub.endpoint();
        let b = hub.endpoint();
        assert!(a.publish("chan", "x").await.is_err());

        a.open().await.unwrap();
        b.open().await.unwrap();
        b.subscribe("chan").await.unwrap();
        assert_eq!(hub.subscribers("chan"), 1);

        b.close().await.unwrap();
        assert_eq!(hub.subscribers("chan"), 0);

        let mut b_frames = b.frames();
        a.publish("chan", "x").await.unwrap();
        assert!(b_frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn status_follows_open_and_close() {
        let hub = MemoryRelayHub::new();
        let a = hub.endpoint();
        let mut status = a.status();
        assert!(!*status.borrow());

        a.open().await.unwrap();
        status.changed().await.unwrap();
        assert!(*status.borrow_and_update());

        a.close().await.unwrap();
        status.changed().await.unwrap();
        assert!(!*status.borrow());
    }

    #[tokio::test]
    async fn dropped_endpoints_leave_the_hub() {
        let hub = MemoryRelayHub::new();
        let a = hub.endpoint();
        a.open().await.unwrap();
        a.subscribe("chan").await.unwrap();
        drop(a);
        assert_eq!(hub.subscribers("chan"), 0);
    }
}
