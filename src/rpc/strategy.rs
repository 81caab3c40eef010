// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Which path serves a given method.

/// Read-only chain queries answered by a direct RPC node.
pub const RPC_HANDLED_METHODS: &[&str] = &[
    "eth_blockNumber",
    "eth_gasPrice",
    "eth_maxPriorityFeePerGas",
    "eth_blobBaseFee",
    "eth_feeHistory",
    "eth_getBalance",
    "eth_getCode",
    "eth_getStorageAt",
    "eth_call",
    "eth_estimateGas",
    "eth_getLogs",
    "eth_getProof",
    "eth_getTransactionCount",
    "eth_getBlockByNumber",
    "eth_getBlockByHash",
    "eth_getBlockTransactionCountByNumber",
    "eth_getBlockTransactionCountByHash",
    "eth_getUncleCountByBlockNumber",
    "eth_getUncleCountByBlockHash",
    "eth_getTransactionByHash",
    "eth_getTransactionByBlockNumberAndIndex",
    "eth_getTransactionByBlockHashAndIndex",
    "eth_getTransactionReceipt",
    "eth_getUncleByBlockNumberAndIndex",
    "eth_getUncleByBlockHashAndIndex",
    "eth_getFilterChanges",
    "eth_getFilterLogs",
    "eth_newBlockFilter",
    "eth_newFilter",
    "eth_newPendingTransactionFilter",
    "eth_sendRawTransaction",
    "eth_syncing",
    "eth_uninstallFilter",
    "web3_clientVersion",
];

/// Methods answerable from local session state.
pub const SDK_HANDLED_METHODS: &[&str] = &["eth_accounts", "eth_chainId"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestHandlingStrategy {
    /// Forward to the wallet as `wallet_invokeMethod`.
    Wallet,
    /// Direct HTTP call to a read-only node.
    RpcNode,
    /// Local session state. Falls back to the wallet for now.
    SdkState,
}

pub fn strategy_for(method: &str) -> RequestHandlingStrategy {
    if RPC_HANDLED_METHODS.contains(&method) {
        RequestHandlingStrategy::RpcNode
    } else if SDK_HANDLED_METHODS.contains(&method) {
        RequestHandlingStrategy::SdkState
    } else {
        RequestHandlingStrategy::Wallet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_map_to_strategies() {
        assert_eq!(strategy_for("eth_blockNumber"), RequestHandlingStrategy::RpcNode);
        assert_eq!(strategy_for("eth_call"), RequestHandlingStrategy::RpcNode);
        assert_eq!(strategy_for("eth_accounts"), RequestHandlingStrategy::SdkState);
        assert_eq!(strategy_for("personal_sign"), RequestHandlingStrategy::Wallet);
        assert_eq!(
            strategy_for("eth_sendTransaction"),
            RequestHandlingStrategy::Wallet
        );
    }
}
