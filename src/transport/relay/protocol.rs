// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay handshake records.
//!
//! ```text
//! dapp                                   wallet
//!  │  ConnectionRequest (QR / deep link)    │
//!  │ ─────────────────────────────────────► │
//!  │        sealed HandshakeOffer           │  on handshake:<request id>
//!  │ ◄───────────────────────────────────── │
//!  │   sealed JSON-RPC envelopes, both ways │  on session:<uuid>
//!  │ ◄────────────────────────────────────► │
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DappMetadata;

/// Prefix of the channel a connection request listens on.
pub const HANDSHAKE_CHANNEL_PREFIX: &str = "handshake:";

/// Prefix of the channel a negotiated relay session talks on.
pub const SESSION_CHANNEL_PREFIX: &str = "session:";

/// How much the wallet is trusted to resume without a fresh approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Trusted,
    Untrusted,
}

/// The handshake record carried inside a connection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub id: String,
    pub channel: String,
    pub public_key_b64: String,
    /// Milliseconds since the Unix epoch.
    pub expires_at: i64,
    pub mode: ConnectionMode,
}

impl SessionRequest {
    /// Milliseconds until expiry, negative once expired.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at - now.timestamp_millis()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkMetadata {
    pub version: String,
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    pub dapp: DappMetadata,
    pub sdk: SdkMetadata,
}

/// Everything the wallet needs to reach the dapp, rendered into links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub session_request: SessionRequest,
    pub metadata: ConnectionMetadata,
}

/// The wallet's answer to a session request, sealed to the request's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeOffer {
    pub public_key_b64: String,
    pub channel_id: String,
}

/// Persisted relay session, enough to resume without a new handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySessionRecord {
    pub id: String,
    pub channel: String,
    pub secret_key_b64: String,
    pub peer_public_key_b64: String,
    pub expires_at: DateTime<Utc>,
}

impl RelaySessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
