// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session negotiation over any [`Transport`].
//!
//! 1. `wallet_getSession`
//! 2. No session: `wallet_createSession` with the requested scopes, seeded
//!    with the valid requested accounts.
//! 3. A session that already covers the request: nothing to do.
//! 4. Otherwise: `wallet_revokeSession`, then `wallet_createSession` with the
//!    union of the old grant and the request. A failed revoke aborts.

use serde_json::Value;
use tracing::{debug, info};

use super::{
    add_valid_accounts, is_same_scopes_and_accounts, optional_scopes, upgrade_scopes,
    valid_accounts, CreateSessionParams, OptionalScopes, SessionData,
};
use crate::caip::Scope;
use crate::error::{SessionError, TransportError};
use crate::transport::{methods, Transport, TransportRequest};

/// Read the wallet's current session, if any.
pub async fn get_session<T: Transport + ?Sized>(
    transport: &T,
) -> Result<Option<SessionData>, TransportError> {
    let response = transport
        .request(TransportRequest::new(methods::GET_SESSION, Value::Null), None)
        .await?;

    let result = response
        .into_result()
        .map_err(|e| SessionError::GetFailed(e.message))?;
    SessionData::from_result(&result).map_err(|e| SessionError::GetFailed(e.to_string()).into())
}

/// Create a session for the given optional scopes.
pub async fn create_session<T: Transport + ?Sized>(
    transport: &T,
    optional_scopes: OptionalScopes,
) -> Result<SessionData, TransportError> {
    let params = serde_json::to_value(CreateSessionParams { optional_scopes })
        .map_err(|e| SessionError::CreateFailed(e.to_string()))?;

    let response = transport
        .request(TransportRequest::new(methods::CREATE_SESSION, params), None)
        .await
        .map_err(|e| match e {
            TransportError::Session(_) => e,
            other => SessionError::CreateFailed(other.to_string()).into(),
        })?;

    let result = response
        .into_result()
        .map_err(|e| SessionError::CreateFailed(e.message))?;
    SessionData::from_result(&result)
        .map_err(|e| SessionError::CreateFailed(e.to_string()))?
        .ok_or_else(|| SessionError::CreateFailed("wallet returned an empty session".into()).into())
}

/// Revoke the current session.
pub async fn revoke_session<T: Transport + ?Sized>(transport: &T) -> Result<(), TransportError> {
    let response = transport
        .request(TransportRequest::new(methods::REVOKE_SESSION, Value::Null), None)
        .await
        .map_err(|e| SessionError::RevokeFailed(e.to_string()))?;

    response
        .into_result()
        .map(|_| ())
        .map_err(|e| SessionError::RevokeFailed(e.message).into())
}

/// Make sure the wallet holds a session covering `scopes` and `account_ids`.
///
/// Returns the session in force afterwards.
pub async fn negotiate<T: Transport + ?Sized>(
    transport: &T,
    scopes: &[Scope],
    account_ids: &[String],
) -> Result<SessionData, TransportError> {
    let existing = get_session(transport).await?;

    let Some(existing) = existing else {
        debug!(scopes = ?scopes, "No existing session, creating one");
        let request = add_valid_accounts(&optional_scopes(scopes), &valid_accounts(account_ids));
        return create_session(transport, request).await;
    };

    if is_same_scopes_and_accounts(&existing, scopes, account_ids) {
        debug!("Existing session already covers the request");
        return Ok(existing);
    }

    info!(
        existing = ?existing.scopes(),
        requested = ?scopes,
        "Upgrading session"
    );
    let request = upgrade_scopes(&existing, scopes, account_ids);
    revoke_session(transport).await?;
    create_session(transport, request).await
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted transport used by negotiation and orchestrator tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::error::TransportError;
    use crate::session::negotiate;
    use crate::transport::{
        ConnectOptions, NotificationCallback, NotificationHub, RpcResponse, Subscription,
        Transport, TransportKind, TransportRequest,
    };

    /// Records every request and answers from a script keyed by method.
    #[derive(Default)]
    pub struct ScriptedTransport {
        pub calls: Mutex<Vec<TransportRequest>>,
        pub replies: Mutex<VecDeque<(String, Result<RpcResponse, TransportError>)>>,
        pub connected: AtomicBool,
        pub disconnects: Mutex<usize>,
        pub hub: NotificationHub,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, method: &str, result: Value) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back((method.to_string(), Ok(RpcResponse::success("0", result))));
            self
        }

        pub fn reply_err(self, method: &str, error: TransportError) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back((method.to_string(), Err(error)));
            self
        }

        pub fn reply_response(self, method: &str, response: RpcResponse) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back((method.to_string(), Ok(response)));
            self
        }

        pub fn push_reply(&self, method: &str, result: Value) {
            self.replies
                .lock()
                .unwrap()
                .push_back((method.to_string(), Ok(RpcResponse::success("0", result))));
        }

        pub fn methods(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.method.clone())
                .collect()
        }

        pub fn count(&self, method: &str) -> usize {
            self.methods().iter().filter(|m| *m == method).count()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Extension
        }

        async fn connect(&self, options: Option<ConnectOptions>) -> Result<(), TransportError> {
            self.connected.store(true, Ordering::SeqCst);
            if let Some(options) = options {
                negotiate(self, &options.scopes, &options.account_ids).await?;
            }
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.connected.store(false, Ordering::SeqCst);
            *self.disconnects.lock().unwrap() += 1;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn request(
            &self,
            request: TransportRequest,
            _timeout: Option<Duration>,
        ) -> Result<RpcResponse, TransportError> {
            self.calls.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            let position = replies.iter().position(|(m, _)| *m == request.method);
            match position.and_then(|i| replies.remove(i)) {
                Some((_, reply)) => reply,
                None => Ok(RpcResponse::success("0", Value::Null)),
            }
        }

        fn on_notification(&self, callback: NotificationCallback) -> Subscription {
            self.hub.subscribe(callback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ScriptedTransport;
    use super::*;
    use serde_json::json;

    const ADDR: &str = "0x1234567890abcdef1234567890abcdef12345678";

    fn session_json(scopes: &[(&str, &[String])]) -> Value {
        let mut map = serde_json::Map::new();
        for (scope, accounts) in scopes {
            map.insert(
                scope.to_string(),
                json!({ "methods": [], "notifications": [], "accounts": accounts }),
            );
        }
        json!({ "sessionScopes": map })
    }

    #[tokio::test]
    async fn creates_when_no_session_exists() {
        let account = format!("eip155:1:{ADDR}");
        let transport = ScriptedTransport::new()
            .reply(methods::GET_SESSION, Value::Null)
            .reply(
                methods::CREATE_SESSION,
                session_json(&[("eip155:1", &[account.clone()])]),
            );

        let session = negotiate(
            &transport,
            &["eip155:1".into()],
            &[account.clone(), "bogus".into()],
        )
        .await
        .unwrap();

        assert_eq!(session.account_ids(), vec![account.clone()]);
        assert_eq!(
            transport.methods(),
            vec![methods::GET_SESSION, methods::CREATE_SESSION]
        );

        let create = transport.calls.lock().unwrap()[1].clone();
        assert_eq!(
            create.params["optionalScopes"]["eip155:1"]["accounts"],
            json!([account])
        );
    }

    #[tokio::test]
    async fn identical_session_is_left_alone() {
        let account = format!("eip155:1:{ADDR}");
        let transport = ScriptedTransport::new().reply(
            methods::GET_SESSION,
            session_json(&[("eip155:1", &[account.clone()])]),
        );

        negotiate(&transport, &["eip155:1".into()], &[account])
            .await
            .unwrap();

        assert_eq!(transport.count(methods::REVOKE_SESSION), 0);
        assert_eq!(transport.count(methods::CREATE_SESSION), 0);
    }

    #[tokio::test]
    async fn different_session_is_revoked_once_then_recreated_with_union() {
        let old = format!("eip155:1:{ADDR}");
        let new = format!("eip155:137:{ADDR}");
        let upgraded = session_json(&[("eip155:1", &[old.clone()]), ("eip155:137", &[new.clone()])]);
        let transport = ScriptedTransport::new()
            .reply(methods::GET_SESSION, session_json(&[("eip155:1", &[old.clone()])]))
            .reply(methods::REVOKE_SESSION, json!(true))
            .reply(methods::CREATE_SESSION, upgraded);

        let session = negotiate(&transport, &["eip155:137".into()], &[new.clone()])
            .await
            .unwrap();

        assert_eq!(
            transport.methods(),
            vec![
                methods::GET_SESSION,
                methods::REVOKE_SESSION,
                methods::CREATE_SESSION
            ]
        );
        let create = transport.calls.lock().unwrap()[2].clone();
        let requested = &create.params["optionalScopes"];
        assert_eq!(requested["eip155:1"]["accounts"], json!([old]));
        assert_eq!(requested["eip155:137"]["accounts"], json!([new]));
        assert_eq!(session.scopes().len(), 2);
    }

    #[tokio::test]
    async fn failed_revoke_aborts_the_upgrade() {
        let old = format!("eip155:1:{ADDR}");
        let transport = ScriptedTransport::new()
            .reply(methods::GET_SESSION, session_json(&[("eip155:1", &[old])]))
            .reply_err(methods::REVOKE_SESSION, TransportError::Disconnected);

        let err = negotiate(&transport, &["eip155:137".into()], &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransportError::Session(SessionError::RevokeFailed(_))
        ));
        assert_eq!(transport.count(methods::CREATE_SESSION), 0);
    }

    #[tokio::test]
    async fn wallet_error_on_create_is_a_session_error() {
        let transport = ScriptedTransport::new().reply(methods::GET_SESSION, Value::Null);
        transport.replies.lock().unwrap().push_back((
            methods::CREATE_SESSION.to_string(),
            Ok(crate::transport::RpcResponse::failure(
                "1",
                crate::transport::RpcErrorObject {
                    code: 4001,
                    message: "User rejected".into(),
                    data: None,
                },
            )),
        ));

        let err = negotiate(&transport, &["eip155:1".into()], &[])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::Session(SessionError::CreateFailed("User rejected".into()))
        );
    }
}
