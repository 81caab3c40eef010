// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deep links and universal links carrying a connection request.

use url::Url;

use crate::error::TransportError;
use crate::transport::relay::ConnectionRequest;

/// Opens the wallet app directly.
pub const DEEPLINK_BASE: &str = "metamask://";

/// Opens the wallet app, or its install page when missing.
pub const UNIVERSAL_LINK_BASE: &str = "https://metamask.app.link";

const CONNECT_PATH: &str = "connect";

/// Query parameter holding the JSON-encoded request.
pub const PAYLOAD_PARAM: &str = "p";

/// Base link used to bring the wallet app to the foreground.
pub fn wallet_link(use_deeplink: bool) -> &'static str {
    if use_deeplink {
        DEEPLINK_BASE
    } else {
        UNIVERSAL_LINK_BASE
    }
}

/// Render `request` as a connect link under the chosen base.
pub fn connection_link(use_deeplink: bool, request: &ConnectionRequest) -> Result<String, TransportError> {
    let payload = serde_json::to_string(request)
        .map_err(|e| TransportError::Protocol(format!("unencodable connection request: {e}")))?;
    let base = format!("{}/{CONNECT_PATH}", wallet_link(use_deeplink).trim_end_matches('/'));
    let url = Url::parse_with_params(&base, &[(PAYLOAD_PARAM, payload)])
        .map_err(|e| TransportError::Protocol(format!("invalid connect link {base}: {e}")))?;
    Ok(url.to_string())
}

/// Inverse of [`connection_link`], used by wallets and tests.
pub fn parse_connection_link(link: &str) -> Result<ConnectionRequest, TransportError> {
    let url = Url::parse(link).map_err(|e| TransportError::Protocol(e.to_string()))?;
    let payload = url
        .query_pairs()
        .find(|(k, _)| k == PAYLOAD_PARAM)
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| TransportError::Protocol(format!("link has no `{PAYLOAD_PARAM}` parameter")))?;
    serde_json::from_str(&payload).map_err(|e| TransportError::Protocol(e.to_string()))
}
