// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Routing
//!
//! Every `invoke_method` call lands in one of three places:
//!
//! | Strategy | Methods | Path |
//! |----------|---------|------|
//! | RPC node | read-only chain queries ([`RPC_HANDLED_METHODS`]) | HTTP POST to the scope's endpoint, wallet if none configured |
//! | SDK state | `eth_accounts`, `eth_chainId` | wallet (reserved for session-state answers) |
//! | Wallet | everything else | `wallet_invokeMethod` over the active transport |

pub mod infura;
pub mod node;
pub mod router;
pub mod strategy;

pub use infura::{infura_rpc_urls, resolve_rpc_urls, INFURA_RPC_URLS};
pub use node::{RpcNodeClient, SDK_INFO_HEADER};
pub use router::{InvokeMethodOptions, MethodRequest, RequestRouter, WalletWake, DEEPLINK_DELAY};
pub use strategy::{strategy_for, RequestHandlingStrategy, RPC_HANDLED_METHODS, SDK_HANDLED_METHODS};
