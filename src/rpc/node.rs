// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Direct JSON-RPC client for read-only node endpoints.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::caip::Scope;
use crate::error::RpcNodeError;

/// Header carrying the SDK info string to the default RPC provider.
pub const SDK_INFO_HEADER: &str = "Metamask-Sdk-Info";

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct RpcNodeClient {
    http: Client,
    endpoints: BTreeMap<Scope, String>,
    sdk_info: String,
    next_id: AtomicU64,
}

impl RpcNodeClient {
    pub fn new(endpoints: BTreeMap<Scope, String>, sdk_info: impl Into<String>) -> Result<Self, RpcNodeError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| RpcNodeError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoints,
            sdk_info: sdk_info.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self, scope: &Scope) -> Result<&str, RpcNodeError> {
        self.endpoints
            .get(scope)
            .map(String::as_str)
            .ok_or_else(|| RpcNodeError::MissingEndpoint(scope.to_string()))
    }

    fn headers(&self, endpoint: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if endpoint.contains("infura") {
            if let Ok(value) = HeaderValue::from_str(&self.sdk_info) {
                headers.insert(SDK_INFO_HEADER, value);
            }
        }
        headers
    }

    /// POST one JSON-RPC call to the endpoint configured for `scope`.
    pub async fn request(
        &self,
        scope: &Scope,
        method: &str,
        params: &Value,
    ) -> Result<Value, RpcNodeError> {
        let endpoint = self.endpoint(scope)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        debug!(scope = %scope, method, id, "Sending read-only RPC request");

        let response = self
            .http
            .post(endpoint)
            .headers(self.headers(endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcNodeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcNodeError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RpcNodeError::Response(e.to_string()))?;

        if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(RpcNodeError::Response(format!("code {code}: {message}")));
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }
}
