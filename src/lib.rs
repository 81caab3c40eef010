// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Multichain Connect - Dapp-to-Wallet Connection SDK
//!
//! Connects an application to a wallet over either an in-page extension
//! bridge or an end-to-end encrypted relay channel, negotiates multichain
//! sessions keyed by CAIP-2 scopes, and routes JSON-RPC invocations to the
//! wallet or to read-only RPC nodes.
//!
//! ## Modules
//!
//! - `sdk` - Orchestrator state machine and host services
//! - `transport` - Transport trait, extension bridge, and relay transport
//! - `session` - Session model and scope/account negotiation
//! - `rpc` - Request routing and read-only RPC node client
//! - `ui` - Install/QR modal seams and connection links
//! - `crypto` - Relay channel key manager (ECIES over secp256k1)
//! - `storage` - Key-value persistence for transport, session, and ids
//! - `caip` - CAIP-2 chain ids and CAIP-10 account ids
//! - `config` / `logging` - Options and tracing setup

pub mod caip;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod rpc;
pub mod sdk;
pub mod session;
pub mod storage;
pub mod transport;
pub mod ui;

pub use config::{DappMetadata, SdkOptions};
pub use error::{SdkError, SdkResult};
pub use rpc::InvokeMethodOptions;
pub use sdk::{Environment, HostServices, MultichainSdk, PlatformType, SdkEvent, SdkState};
