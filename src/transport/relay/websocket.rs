// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay socket over a WebSocket connection to a relay server.
//!
//! Frames are JSON text messages:
//!
//! ```text
//! → {"type":"subscribe","channel":"session:…"}
//! → {"type":"unsubscribe","channel":"session:…"}
//! → {"type":"publish","channel":"session:…","payload":"<base64>"}
//! ← {"type":"message","channel":"session:…","payload":"<base64>"}
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::socket::{RelayFrame, RelaySocket, FRAME_BUFFER};
use crate::error::TransportError;

/// Outbound frames buffered before `publish` waits.
const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireFrame {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Publish { channel: String, payload: String },
    Message { channel: String, payload: String },
}

struct Connection {
    out_tx: mpsc::Sender<Message>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

pub struct WebSocketRelay {
    url: String,
    frames_tx: broadcast::Sender<RelayFrame>,
    open: Arc<watch::Sender<bool>>,
    connection: Mutex<Option<Connection>>,
    // Re-sent after every (re)open.
    channels: Mutex<HashSet<String>>,
}

impl WebSocketRelay {
    pub fn new(url: impl Into<String>) -> Self {
        let (frames_tx, _) = broadcast::channel(FRAME_BUFFER);
        Self {
            url: url.into(),
            frames_tx,
            open: Arc::new(watch::channel(false).0),
            connection: Mutex::new(None),
            channels: Mutex::new(HashSet::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, frame: &WireFrame) -> Result<(), TransportError> {
        let text = serde_json::to_string(frame)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let out_tx = {
            let connection = self.connection.lock().await;
            match connection.as_ref() {
                Some(c) if self.is_open() => c.out_tx.clone(),
                _ => {
                    return Err(TransportError::ConnectionFailed(
                        "relay socket is closed".into(),
                    ))
                }
            }
        };

        out_tx
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| TransportError::ConnectionFailed("relay writer closed".into()))
    }
}

#[async_trait]
impl RelaySocket for WebSocketRelay {
    async fn open(&self) -> Result<(), TransportError> {
        let mut connection = self.connection.lock().await;
        if self.is_open() {
            return Ok(());
        }
        if let Some(stale) = connection.take() {
            stale.writer.abort();
            stale.reader.abort();
        }

        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("WebSocket connect: {e}")))?;
        let (mut ws_tx, mut ws_rx) = ws.split();

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

        let writer = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                if ws_tx.send(message).await.is_err() {
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        let frames_tx = self.frames_tx.clone();
        let open = self.open.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = ws_rx.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "Relay socket read failed");
                        break;
                    }
                };
                match serde_json::from_str::<WireFrame>(&text) {
                    Ok(WireFrame::Message { channel, payload }) => {
                        let _ = frames_tx.send(RelayFrame { channel, payload });
                    }
                    Ok(other) => debug!(frame = ?other, "Ignoring unexpected relay frame"),
                    Err(e) => warn!(error = %e, "Malformed relay frame"),
                }
            }
            open.send_replace(false);
            info!("Relay socket closed");
        });

        *connection = Some(Connection {
            out_tx,
            writer,
            reader,
        });
        self.open.send_replace(true);
        drop(connection);

        let channels: Vec<String> = self.channels.lock().await.iter().cloned().collect();
        for channel in channels {
            self.send(&WireFrame::Subscribe { channel }).await?;
        }

        info!(url = %self.url, "Relay socket open");
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.open.send_replace(false);
        self.channels.lock().await.clear();
        if let Some(connection) = self.connection.lock().await.take() {
            // Dropping the sender lets the writer flush and close the socket.
            drop(connection.out_tx);
            connection.reader.abort();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    async fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.channels.lock().await.insert(channel.to_string());
        self.send(&WireFrame::Subscribe {
            channel: channel.to_string(),
        })
        .await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.channels.lock().await.remove(channel);
        if !self.is_open() {
            return Ok(());
        }
        self.send(&WireFrame::Unsubscribe {
            channel: channel.to_string(),
        })
        .await
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        self.send(&WireFrame::Publish {
            channel: channel.to_string(),
            payload: payload.to_string(),
        })
        .await
    }

    fn frames(&self) -> broadcast::Receiver<RelayFrame> {
        self.frames_tx.subscribe()
    }

    fn status(&self) -> watch::Receiver<bool> {
        self.open.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_frames_are_tagged() {
        let frame = WireFrame::Publish {
            channel: "session:1".into(),
            payload: "abc".into(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "publish", "channel": "session:1", "payload": "abc"})
        );

        let incoming: WireFrame = serde_json::from_value(
            json!({"type": "message", "channel": "session:1", "payload": "xyz"}),
        )
        .unwrap();
        assert_eq!(
            incoming,
            WireFrame::Message {
                channel: "session:1".into(),
                payload: "xyz".into()
            }
        );
    }

    #[tokio::test]
    async fn closed_socket_rejects_publish() {
        let relay = WebSocketRelay::new("ws://127.0.0.1:9");
        assert!(!relay.is_open());
        assert!(matches!(
            relay.publish("session:1", "x").await,
            Err(TransportError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_relay_fails_to_open() {
        let relay = WebSocketRelay::new("ws://127.0.0.1:9");
        assert!(relay.open().await.is_err());
        assert!(!relay.is_open());
        assert!(!*relay.status().borrow());
    }
}
