// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Headless connect demo: prints the relay link, waits for a wallet, shows
//! the negotiated session, and disconnects on Ctrl-C.
//!
//! Usage: `multichain-connect [scope ...]` (defaults to `eip155:1`).

use std::env;
use std::io::Stdout;
use std::sync::Arc;

use multichain_connect::caip::Scope;
use multichain_connect::config::{data_dir_from_env, log_format_from_env};
use multichain_connect::logging::{self, NAMESPACE_ROOT};
use multichain_connect::sdk::WebSocketClientFactory;
use multichain_connect::storage::{FileStore, Store};
use multichain_connect::ui::TerminalModal;
use multichain_connect::{Environment, HostServices, MultichainSdk, SdkError, SdkOptions};
use tracing::{info, warn};

const DEFAULT_SCOPE: &str = "eip155:1";

#[tokio::main]
async fn main() -> Result<(), SdkError> {
    let options = SdkOptions::from_env()?;
    let store = Store::new(Arc::new(FileStore::in_dir(data_dir_from_env())));

    let debug = logging::is_debug_enabled(NAMESPACE_ROOT, &store).await;
    logging::init_tracing(log_format_from_env()?, debug.then_some(NAMESPACE_ROOT));

    let mut scopes: Vec<Scope> = env::args().skip(1).map(Scope::from).collect();
    if scopes.is_empty() {
        scopes.push(Scope::from(DEFAULT_SCOPE));
    }

    let terminal: Arc<TerminalModal<Stdout>> = Arc::new(TerminalModal::new(std::io::stdout()));
    let host = HostServices::new(
        store,
        Arc::new(WebSocketClientFactory::new(options.relay.relay_url.clone())),
    )
    .with_modal(terminal.clone())
    .with_link_opener(terminal);

    info!(relay = %options.relay.relay_url, "Starting multichain-connect");
    let sdk = MultichainSdk::create(options, Environment::headless(), host).await?;
    info!(state = %sdk.state(), "SDK ready");

    tokio::select! {
        result = sdk.connect(scopes, Vec::new()) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            return sdk.disconnect().await;
        }
    }

    match sdk.session().await? {
        Some(session) => match serde_json::to_string_pretty(&session) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => warn!(error = %e, "Failed to render session"),
        },
        None => warn!("Connected without a session"),
    }

    info!("Connected. Press Ctrl-C to disconnect");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
    }
    sdk.disconnect().await
}
