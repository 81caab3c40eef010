// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Error Taxonomy
//!
//! Errors are grouped by origin so callers can tell a dead relay from a
//! misbehaving RPC node or a wallet that refused a request:
//!
//! | Origin | Type | Surfaced to caller |
//! |--------|------|--------------------|
//! | Relay / extension channel | [`TransportError`] | yes |
//! | Session negotiation | [`SessionError`] | yes |
//! | Read-only RPC node | [`RpcNodeError`] | yes, except `MissingEndpoint` (router falls back to the wallet) |
//! | Wallet invocation | [`InvocationError`] | yes |
//! | Storage collaborator | [`StorageError`] | yes |
//! | Key manager | [`CryptoError`] | wrapped into [`TransportError`] by the relay |

use crate::caip::CaipError;

/// Errors raised while moving messages to and from the wallet.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request `{method}` timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("Transport disconnected")]
    Disconnected,

    #[error("Connection request expired")]
    RequestExpired,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport storage error: {0}")]
    Storage(String),

    #[error("Channel encryption error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl TransportError {
    /// Whether this error only means the live connection request ran out of
    /// time, which the QR flow recovers from by regenerating the request.
    pub fn is_request_expired(&self) -> bool {
        matches!(self, TransportError::RequestExpired)
    }
}

impl From<StorageError> for TransportError {
    fn from(e: StorageError) -> Self {
        TransportError::Storage(e.to_string())
    }
}

impl From<CryptoError> for TransportError {
    fn from(e: CryptoError) -> Self {
        TransportError::Crypto(e.to_string())
    }
}

/// Errors raised while reading, creating, or revoking a wallet session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to read session: {0}")]
    GetFailed(String),

    #[error("Failed to create session: {0}")]
    CreateFailed(String),

    #[error("Failed to revoke session: {0}")]
    RevokeFailed(String),
}

/// Errors raised by the direct read-only RPC node client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcNodeError {
    /// No endpoint configured for the scope. Recoverable: the router retries
    /// through the wallet.
    #[error("No RPC endpoint found for scope {0}")]
    MissingEndpoint(String),

    #[error("RPC endpoint {endpoint} returned HTTP {status}")]
    Http { endpoint: String, status: u16 },

    #[error("RPC request failed: {0}")]
    Request(String),

    #[error("RPC response was invalid: {0}")]
    Response(String),
}

/// The wallet returned an RPC error object, or the transport itself failed
/// while invoking a method. The original cause is kept as the message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invocation failed: {message}")]
pub struct InvocationError {
    pub message: String,
}

impl InvocationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Storage collaborator failure, tagged with the adapter platform and key.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("[{platform}] failed to read `{key}`: {message}")]
    Get {
        platform: String,
        key: String,
        message: String,
    },

    #[error("[{platform}] failed to write `{key}`: {message}")]
    Set {
        platform: String,
        key: String,
        message: String,
    },

    #[error("[{platform}] failed to delete `{key}`: {message}")]
    Delete {
        platform: String,
        key: String,
        message: String,
    },
}

/// Key manager failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Invalid encoding: {0}")]
    Encoding(String),
}

/// Configuration errors detected while building the SDK.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration missing: {0}")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error returned by the public SDK surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SdkError {
    /// The transport or provider was accessed outside the `connected` state.
    #[error("{0} not initialized, establish connection first")]
    Uninitialized(&'static str),

    /// A connect sequence was aborted by `disconnect`.
    #[error("Connection cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(TransportError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    RpcNode(#[from] RpcNodeError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Caip(#[from] CaipError),
}

impl From<TransportError> for SdkError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Session(session) => SdkError::Session(session),
            other => SdkError::Transport(other),
        }
    }
}

/// Result alias for the public SDK surface.
pub type SdkResult<T> = Result<T, SdkError>;
