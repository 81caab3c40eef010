// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC 2.0 envelopes exchanged with the wallet.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Method names the core speaks.
pub mod methods {
    pub const GET_SESSION: &str = "wallet_getSession";
    pub const CREATE_SESSION: &str = "wallet_createSession";
    pub const REVOKE_SESSION: &str = "wallet_revokeSession";
    pub const INVOKE_METHOD: &str = "wallet_invokeMethod";
    /// Synthesized notification fanned out for any session-lifecycle result.
    pub const SESSION_CHANGED: &str = "wallet_sessionChanged";

    /// Whether `method` returns the current session in its result.
    pub fn is_session_lifecycle(method: &str) -> bool {
        method == GET_SESSION || method == CREATE_SESSION
    }
}

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// An outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// RPC-shaped error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A response (or an inbound message that may carry a method).
///
/// Wallets echo the request `method` on some responses; it is kept so the
/// relay transport can recognise session-lifecycle results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(Value::String(id.into())),
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn failure(id: impl Into<String>, error: RpcErrorObject) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(Value::String(id.into())),
            error: Some(error),
            ..Self::default()
        }
    }

    /// Correlation id as a string. Numeric ids are rendered in decimal.
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The session payload of a lifecycle message: `result`, or `params`
    /// when the wallet pushed it as a notification.
    pub fn session_payload(&self) -> Option<&Value> {
        self.result
            .as_ref()
            .filter(|v| !v.is_null())
            .or_else(|| self.params.as_ref().filter(|v| !v.is_null()))
    }

    /// Split into the success value or the RPC error object.
    pub fn into_result(self) -> Result<Value, RpcErrorObject> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
