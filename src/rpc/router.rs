// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-call routing between the wallet, a read-only node and local state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::node::RpcNodeClient;
use super::strategy::{strategy_for, RequestHandlingStrategy};
use crate::caip::Scope;
use crate::error::{InvocationError, RpcNodeError, SdkResult};
use crate::transport::{methods, Transport, TransportRequest};
use crate::ui::LinkOpener;

/// Delay between dispatching a wallet request and foregrounding the wallet app.
pub const DEEPLINK_DELAY: Duration = Duration::from_millis(10);

/// A method call scoped to one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Argument of [`crate::sdk::MultichainSdk::invoke_method`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeMethodOptions {
    pub scope: Scope,
    pub request: MethodRequest,
}

impl InvokeMethodOptions {
    pub fn new(scope: impl Into<Scope>, method: impl Into<String>, params: Value) -> Self {
        Self {
            scope: scope.into(),
            request: MethodRequest {
                method: method.into(),
                params,
            },
        }
    }
}

/// Opens a link back to the wallet app once a request is in flight.
#[derive(Clone)]
pub struct WalletWake {
    pub opener: Arc<dyn LinkOpener>,
    pub link: String,
}

pub struct RequestRouter {
    transport: Arc<dyn Transport>,
    node: RpcNodeClient,
    wake: Option<WalletWake>,
}

impl RequestRouter {
    pub fn new(transport: Arc<dyn Transport>, node: RpcNodeClient, wake: Option<WalletWake>) -> Self {
        Self {
            transport,
            node,
            wake,
        }
    }

    pub async fn invoke(&self, options: &InvokeMethodOptions) -> SdkResult<Value> {
        let method = options.request.method.as_str();
        match strategy_for(method) {
            RequestHandlingStrategy::RpcNode => match self.invoke_node(options).await {
                Err(RpcNodeError::MissingEndpoint(scope)) => {
                    debug!(method, scope, "No RPC endpoint for scope, using wallet");
                    self.invoke_wallet(options).await
                }
                other => Ok(other?),
            },
            RequestHandlingStrategy::SdkState => {
                warn!(method, "Method not handled from session state yet, using wallet");
                self.invoke_wallet(options).await
            }
            RequestHandlingStrategy::Wallet => self.invoke_wallet(options).await,
        }
    }

    async fn invoke_node(&self, options: &InvokeMethodOptions) -> Result<Value, RpcNodeError> {
        self.node
            .request(&options.scope, &options.request.method, &options.request.params)
            .await
    }

    async fn invoke_wallet(&self, options: &InvokeMethodOptions) -> SdkResult<Value> {
        let request = TransportRequest::new(
            methods::INVOKE_METHOD,
            json!({
                "scope": options.scope,
                "request": options.request,
            }),
        );
        let dispatch = self.transport.request(request, None);

        let response = match &self.wake {
            Some(wake) => {
                let (response, ()) = tokio::join!(dispatch, async {
                    tokio::time::sleep(DEEPLINK_DELAY).await;
                    wake.opener.open_link(&wake.link);
                });
                response
            }
            None => dispatch.await,
        };

        let response = response.map_err(|e| InvocationError::new(e.to_string()))?;
        let result = response.into_result().map_err(|e| {
            InvocationError::new(format!(
                "RPC Request failed with code {}: {}",
                e.code, e.message
            ))
        })?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::{SdkError, TransportError};
    use crate::session::negotiate::test_support::ScriptedTransport;
    use crate::transport::{RpcErrorObject, RpcResponse};

    fn router_for(transport: Arc<ScriptedTransport>, endpoint: Option<String>) -> RequestRouter {
        let mut endpoints = BTreeMap::new();
        if let Some(endpoint) = endpoint {
            endpoints.insert(Scope::from("eip155:1"), endpoint);
        }
        let node = RpcNodeClient::new(endpoints, "Sdk/Rust").unwrap();
        RequestRouter::new(transport, node, None)
    }

    #[tokio::test]
    async fn read_only_methods_go_to_the_node() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "0x2a"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let transport = Arc::new(ScriptedTransport::new());
        let router = router_for(transport.clone(), Some(server.uri()));

        let result = router
            .invoke(&InvokeMethodOptions::new("eip155:1", "eth_blockNumber", json!([])))
            .await
            .unwrap();

        assert_eq!(result, json!("0x2a"));
        assert!(transport.methods().is_empty());
    }

    #[tokio::test]
    async fn wallet_methods_never_reach_the_node() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let transport = Arc::new(ScriptedTransport::new().reply(methods::INVOKE_METHOD, json!("0xsig")));
        let router = router_for(transport.clone(), Some(server.uri()));

        let result = router
            .invoke(&InvokeMethodOptions::new(
                "eip155:1",
                "personal_sign",
                json!(["0xdead", "0xbeef"]),
            ))
            .await
            .unwrap();

        assert_eq!(result, json!("0xsig"));
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, methods::INVOKE_METHOD);
        assert_eq!(
            calls[0].params,
            json!({
                "scope": "eip155:1",
                "request": { "method": "personal_sign", "params": ["0xdead", "0xbeef"] }
            })
        );
    }

    #[tokio::test]
    async fn missing_endpoint_falls_back_to_wallet() {
        let transport = Arc::new(ScriptedTransport::new().reply(methods::INVOKE_METHOD, json!("0x1")));
        let router = router_for(transport.clone(), None);

        let result = router
            .invoke(&InvokeMethodOptions::new("eip155:1", "eth_blockNumber", json!([])))
            .await
            .unwrap();

        assert_eq!(result, json!("0x1"));
        assert_eq!(transport.count(methods::INVOKE_METHOD), 1);
    }

    #[tokio::test]
    async fn session_state_methods_fall_back_to_wallet() {
        let transport = Arc::new(ScriptedTransport::new().reply(methods::INVOKE_METHOD, json!(["0xabc"])));
        let router = router_for(transport.clone(), None);

        let result = router
            .invoke(&InvokeMethodOptions::new("eip155:1", "eth_accounts", json!([])))
            .await
            .unwrap();
        assert_eq!(result, json!(["0xabc"]));
    }

    #[tokio::test]
    async fn node_failures_other_than_missing_endpoint_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let transport = Arc::new(ScriptedTransport::new());
        let router = router_for(transport.clone(), Some(server.uri()));

        let err = router
            .invoke(&InvokeMethodOptions::new("eip155:1", "eth_gasPrice", json!([])))
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::RpcNode(RpcNodeError::Http { status: 500, .. })));
        assert!(transport.methods().is_empty());
    }

    #[tokio::test]
    async fn wallet_error_object_is_wrapped() {
        let transport = Arc::new(ScriptedTransport::new().reply_response(
            methods::INVOKE_METHOD,
            RpcResponse::failure(
                "0",
                RpcErrorObject {
                    code: 4001,
                    message: "User rejected the request.".into(),
                    data: None,
                },
            ),
        ));
        let router = router_for(transport, None);

        let err = router
            .invoke(&InvokeMethodOptions::new("eip155:1", "personal_sign", json!([])))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SdkError::Invocation(InvocationError::new(
                "RPC Request failed with code 4001: User rejected the request."
            ))
        );
    }

    #[tokio::test]
    async fn transport_failure_is_wrapped() {
        let transport = Arc::new(
            ScriptedTransport::new().reply_err(methods::INVOKE_METHOD, TransportError::Disconnected),
        );
        let router = router_for(transport, None);

        let err = router
            .invoke(&InvokeMethodOptions::new("eip155:1", "personal_sign", json!([])))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SdkError::Invocation(InvocationError::new("Transport disconnected"))
        );
    }

    struct RecordingOpener {
        opened: Mutex<Vec<(String, usize)>>,
        transport: Arc<ScriptedTransport>,
    }

    impl LinkOpener for RecordingOpener {
        fn open_link(&self, url: &str) {
            let sent = self.transport.count(methods::INVOKE_METHOD);
            self.opened.lock().unwrap().push((url.to_string(), sent));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deeplink_opens_after_dispatch() {
        let transport = Arc::new(ScriptedTransport::new().reply(methods::INVOKE_METHOD, json!("0x1")));
        let opener = Arc::new(RecordingOpener {
            opened: Mutex::new(Vec::new()),
            transport: transport.clone(),
        });
        let node = RpcNodeClient::new(BTreeMap::new(), "Sdk/Rust").unwrap();
        let router = RequestRouter::new(
            transport.clone(),
            node,
            Some(WalletWake {
                opener: opener.clone(),
                link: "metamask://".into(),
            }),
        );

        router
            .invoke(&InvokeMethodOptions::new("eip155:1", "personal_sign", json!([])))
            .await
            .unwrap();

        let opened = opener.opened.lock().unwrap();
        assert_eq!(opened.as_slice(), &[("metamask://".to_string(), 1)]);
    }
}
