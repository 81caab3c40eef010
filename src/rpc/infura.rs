// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Built-in Infura endpoints, keyed by scope.

use std::collections::BTreeMap;

use crate::caip::Scope;

/// Scope to endpoint base URL. The API key is appended.
pub const INFURA_RPC_URLS: &[(&str, &str)] = &[
    // Ethereum
    ("eip155:1", "https://mainnet.infura.io/v3/"),
    ("eip155:5", "https://goerli.infura.io/v3/"),
    ("eip155:11155111", "https://sepolia.infura.io/v3/"),
    // Linea
    ("eip155:59144", "https://linea-mainnet.infura.io/v3/"),
    ("eip155:59140", "https://linea-goerli.infura.io/v3/"),
    // Polygon
    ("eip155:137", "https://polygon-mainnet.infura.io/v3/"),
    ("eip155:80001", "https://polygon-mumbai.infura.io/v3/"),
    // Optimism
    ("eip155:10", "https://optimism-mainnet.infura.io/v3/"),
    ("eip155:420", "https://optimism-goerli.infura.io/v3/"),
    // Arbitrum
    ("eip155:42161", "https://arbitrum-mainnet.infura.io/v3/"),
    ("eip155:421613", "https://arbitrum-goerli.infura.io/v3/"),
    // Palm
    ("eip155:11297108109", "https://palm-mainnet.infura.io/v3/"),
    ("eip155:11297108099", "https://palm-testnet.infura.io/v3/"),
    // Avalanche
    ("eip155:43114", "https://avalanche-mainnet.infura.io/v3/"),
    ("eip155:43113", "https://avalanche-fuji.infura.io/v3/"),
    // Aurora
    ("eip155:1313161554", "https://aurora-mainnet.infura.io/v3/"),
    ("eip155:1313161555", "https://aurora-testnet.infura.io/v3/"),
    // Celo
    ("eip155:42220", "https://celo-mainnet.infura.io/v3/"),
    ("eip155:44787", "https://celo-alfajores.infura.io/v3/"),
];

/// The Infura table completed with `api_key`.
pub fn infura_rpc_urls(api_key: &str) -> BTreeMap<Scope, String> {
    INFURA_RPC_URLS
        .iter()
        .map(|(scope, base)| (Scope::from(*scope), format!("{base}{api_key}")))
        .collect()
}

/// Endpoints in effect: the Infura table (when a key is set) overlaid with
/// the caller's map. Caller entries win.
pub fn resolve_rpc_urls(
    infura_api_key: Option<&str>,
    readonly_rpc_map: &BTreeMap<Scope, String>,
) -> BTreeMap<Scope, String> {
    let mut urls = match infura_api_key.filter(|k| !k.is_empty()) {
        Some(key) => infura_rpc_urls(key),
        None => BTreeMap::new(),
    };
    urls.extend(
        readonly_rpc_map
            .iter()
            .map(|(scope, url)| (scope.clone(), url.clone())),
    );
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_appended() {
        let urls = infura_rpc_urls("abc123");
        assert_eq!(
            urls[&Scope::from("eip155:1")],
            "https://mainnet.infura.io/v3/abc123"
        );
        assert_eq!(urls.len(), INFURA_RPC_URLS.len());
    }

    #[test]
    fn caller_map_overrides_infura() {
        let mut custom = BTreeMap::new();
        custom.insert(Scope::from("eip155:1"), "https://my-node.example".to_string());
        custom.insert(Scope::from("eip155:31337"), "http://localhost:8545".to_string());

        let urls = resolve_rpc_urls(Some("abc"), &custom);
        assert_eq!(urls[&Scope::from("eip155:1")], "https://my-node.example");
        assert_eq!(urls[&Scope::from("eip155:31337")], "http://localhost:8545");
        assert_eq!(
            urls[&Scope::from("eip155:137")],
            "https://polygon-mainnet.infura.io/v3/abc"
        );
    }

    #[test]
    fn no_key_means_caller_map_only() {
        let urls = resolve_rpc_urls(None, &BTreeMap::new());
        assert!(urls.is_empty());
        assert!(resolve_rpc_urls(Some(""), &BTreeMap::new()).is_empty());
    }
}
