// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Sessions
//!
//! A session is the wallet's grant: a mapping from [`Scope`] to the methods,
//! notifications and accounts the dapp may use on that chain. Sessions are
//! never edited in place; an upgrade revokes the old grant and creates a new
//! one that supersedes it.
//!
//! This module holds the data model and the pure helpers used to build
//! session requests. [`negotiate`] drives the get/diff/create-or-upgrade
//! exchange against any [`Transport`](crate::transport::Transport).

pub mod negotiate;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::caip::{AccountId, Scope};

pub use negotiate::{create_session, get_session, negotiate, revoke_session};

/// Per-scope grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeGrant {
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub notifications: Vec<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
}

/// Scopes requested in a `wallet_createSession` call.
pub type OptionalScopes = BTreeMap<Scope, ScopeGrant>;

/// A negotiated session as returned by `wallet_getSession` /
/// `wallet_createSession`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(default)]
    pub session_scopes: BTreeMap<Scope, ScopeGrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_properties: Option<Value>,
}

impl SessionData {
    /// Scopes granted by this session.
    pub fn scopes(&self) -> Vec<Scope> {
        self.session_scopes.keys().cloned().collect()
    }

    /// Every account id across all scopes.
    pub fn account_ids(&self) -> Vec<String> {
        self.session_scopes
            .values()
            .flat_map(|grant| grant.accounts.iter().cloned())
            .collect()
    }

    /// Whether the session grants nothing.
    pub fn is_empty(&self) -> bool {
        self.session_scopes.is_empty()
    }

    /// Parse a session out of a wallet response `result`. An empty or null
    /// result means there is no session.
    pub fn from_result(result: &Value) -> Result<Option<Self>, serde_json::Error> {
        if result.is_null() {
            return Ok(None);
        }
        let session: SessionData = serde_json::from_value(result.clone())?;
        if session.is_empty() {
            Ok(None)
        } else {
            Ok(Some(session))
        }
    }
}

/// Parameters of `wallet_createSession`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionParams {
    pub optional_scopes: OptionalScopes,
}

/// Build an empty grant for every requested scope.
pub fn optional_scopes(scopes: &[Scope]) -> OptionalScopes {
    scopes
        .iter()
        .map(|scope| (scope.clone(), ScopeGrant::default()))
        .collect()
}

/// Parse account ids, dropping invalid ones with a warning.
pub fn valid_accounts(account_ids: &[String]) -> Vec<AccountId> {
    account_ids
        .iter()
        .filter_map(|raw| match raw.parse::<AccountId>() {
            Ok(account) => Some(account),
            Err(e) => {
                warn!(account_id = %raw, error = %e, "Dropping invalid CAIP account id");
                None
            }
        })
        .collect()
}

/// Seed each scope with the accounts that live on its chain.
///
/// Returns a new map; the input is left untouched. Accounts already present
/// are not duplicated and accounts on chains without a matching scope are
/// ignored, so the result always satisfies the session account invariant.
pub fn add_valid_accounts(scopes: &OptionalScopes, accounts: &[AccountId]) -> OptionalScopes {
    let mut result = scopes.clone();
    if accounts.is_empty() {
        return result;
    }

    for (scope, grant) in result.iter_mut() {
        let chain = match scope.chain_id() {
            Ok(chain) => chain,
            Err(e) => {
                warn!(scope = %scope, error = %e, "Invalid scope format");
                continue;
            }
        };

        let mut seen: BTreeSet<String> = grant.accounts.iter().cloned().collect();
        for account in accounts.iter().filter(|a| a.chain == chain) {
            let id = account.to_string();
            if seen.insert(id.clone()) {
                grant.accounts.push(id);
            }
        }
    }

    result
}

/// Whether an existing session already satisfies a request: identical scope
/// sets and every proposed account already granted.
pub fn is_same_scopes_and_accounts(
    session: &SessionData,
    proposed_scopes: &[Scope],
    proposed_account_ids: &[String],
) -> bool {
    let current: BTreeSet<&Scope> = session.session_scopes.keys().collect();
    let proposed: BTreeSet<&Scope> = proposed_scopes.iter().collect();
    if current != proposed {
        return false;
    }

    let existing: BTreeSet<String> = session.account_ids().into_iter().collect();
    proposed_account_ids.iter().all(|id| existing.contains(id))
}

/// Build the optional scopes for an upgrade: the union of the existing and
/// requested scopes, each seeded with the union of existing and requested
/// accounts on its chain.
pub fn upgrade_scopes(
    existing: &SessionData,
    requested_scopes: &[Scope],
    requested_account_ids: &[String],
) -> OptionalScopes {
    let mut scopes: Vec<Scope> = existing.scopes();
    for scope in requested_scopes {
        if !scopes.contains(scope) {
            scopes.push(scope.clone());
        }
    }

    let mut account_ids = existing.account_ids();
    for id in requested_account_ids {
        if !account_ids.contains(id) {
            account_ids.push(id.clone());
        }
    }

    add_valid_accounts(&optional_scopes(&scopes), &valid_accounts(&account_ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x1234567890abcdef1234567890abcdef12345678";

    pub(crate) fn session_with(scopes: &[(&str, &[&str])]) -> SessionData {
        SessionData {
            session_scopes: scopes
                .iter()
                .map(|(scope, accounts)| {
                    (
                        Scope::from(*scope),
                        ScopeGrant {
                            methods: vec![],
                            notifications: vec![],
                            accounts: accounts.iter().map(|a| a.to_string()).collect(),
                        },
                    )
                })
                .collect(),
            expiry: None,
            session_properties: None,
        }
    }

    #[test]
    fn optional_scopes_start_empty() {
        let scopes = optional_scopes(&["eip155:1".into(), "eip155:137".into()]);
        assert_eq!(scopes.len(), 2);
        assert!(scopes.values().all(|g| *g == ScopeGrant::default()));
    }

    #[test]
    fn invalid_accounts_are_dropped_not_fatal() {
        let accounts = valid_accounts(&[
            format!("eip155:1:{ADDR}"),
            "garbage".to_string(),
            format!("eip155:137:{ADDR}"),
        ]);
        assert_eq!(accounts.len(), 2);
    }

    #[test]
    fn accounts_only_land_on_matching_chains() {
        let scopes = optional_scopes(&["eip155:1".into(), "eip155:10".into()]);
        let accounts = valid_accounts(&[
            format!("eip155:1:{ADDR}"),
            format!("eip155:137:{ADDR}"),
            format!("eip155:1:{ADDR}"),
        ]);

        let seeded = add_valid_accounts(&scopes, &accounts);

        assert_eq!(
            seeded[&Scope::from("eip155:1")].accounts,
            vec![format!("eip155:1:{ADDR}")]
        );
        assert!(seeded[&Scope::from("eip155:10")].accounts.is_empty());
        assert!(!seeded.contains_key(&Scope::from("eip155:137")));
        // input untouched
        assert!(scopes[&Scope::from("eip155:1")].accounts.is_empty());
    }

    #[test]
    fn same_scopes_and_accounts_detection() {
        let account = format!("eip155:1:{ADDR}");
        let session = session_with(&[("eip155:1", &[account.as_str()])]);

        assert!(is_same_scopes_and_accounts(
            &session,
            &["eip155:1".into()],
            &[account.clone()]
        ));
        assert!(is_same_scopes_and_accounts(&session, &["eip155:1".into()], &[]));
        assert!(!is_same_scopes_and_accounts(
            &session,
            &["eip155:1".into(), "eip155:137".into()],
            &[]
        ));
        assert!(!is_same_scopes_and_accounts(
            &session,
            &["eip155:1".into()],
            &[format!("eip155:1:0x{}", "ab".repeat(20))]
        ));
    }

    #[test]
    fn upgrade_takes_the_union_per_chain() {
        let existing_account = format!("eip155:1:{ADDR}");
        let new_account = format!("eip155:137:{ADDR}");
        let session = session_with(&[("eip155:1", &[existing_account.as_str()])]);

        let upgraded = upgrade_scopes(
            &session,
            &["eip155:137".into()],
            &[new_account.clone()],
        );

        assert_eq!(upgraded.len(), 2);
        assert_eq!(upgraded[&Scope::from("eip155:1")].accounts, vec![existing_account]);
        assert_eq!(upgraded[&Scope::from("eip155:137")].accounts, vec![new_account]);
    }

    #[test]
    fn session_parses_from_wallet_result() {
        let result = serde_json::json!({
            "sessionScopes": {
                "eip155:1": {
                    "methods": ["personal_sign"],
                    "notifications": [],
                    "accounts": [format!("eip155:1:{ADDR}")]
                }
            },
            "expiry": "2026-12-01T00:00:00Z"
        });
        let session = SessionData::from_result(&result).unwrap().unwrap();
        assert_eq!(session.scopes(), vec![Scope::from("eip155:1")]);
        assert!(session.expiry.is_some());

        assert!(SessionData::from_result(&Value::Null).unwrap().is_none());
        assert!(SessionData::from_result(&serde_json::json!({ "sessionScopes": {} }))
            .unwrap()
            .is_none());
    }

    #[test]
    fn create_params_serialize_camel_case() {
        let params = CreateSessionParams {
            optional_scopes: optional_scopes(&["eip155:1".into()]),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert!(value["optionalScopes"]["eip155:1"]["accounts"].is_array());
    }
}
