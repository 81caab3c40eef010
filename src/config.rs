// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # SDK Configuration
//!
//! [`SdkOptions`] collects everything the orchestrator needs: dapp metadata,
//! RPC endpoints, presentation preferences, and relay timings. Hosts build
//! it in code; the headless binary loads it from the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MMC_DAPP_NAME` | Dapp name shown in the wallet | `multichain-connect` |
//! | `MMC_DAPP_URL` | Dapp URL, required outside web contexts | Required |
//! | `MMC_DAPP_ICON_URL` | Dapp icon URL (http/https only) | Optional |
//! | `MMC_INFURA_API_KEY` | Enables the built-in Infura endpoint table | Optional |
//! | `MMC_RPC_URLS` | Extra endpoints, `scope=url` pairs separated by commas | Optional |
//! | `MMC_RELAY_URL` | Relay WebSocket endpoint | [`DEFAULT_RELAY_URL`] |
//! | `MMC_DATA_DIR` | Directory of the file-backed store | `.` |
//! | `MMC_HEADLESS` | Skip modal rendering (`true`/`false`) | `false` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,multichain_connect=info` |

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::caip::Scope;
use crate::error::ConfigError;
use crate::logging::LogFormat;
use crate::rpc::resolve_rpc_urls;
use crate::transport::relay::client::DEFAULT_REQUEST_TTL;
use crate::transport::{CONNECTION_GRACE_PERIOD, DEFAULT_REQUEST_TIMEOUT};

pub const DAPP_NAME_ENV: &str = "MMC_DAPP_NAME";
pub const DAPP_URL_ENV: &str = "MMC_DAPP_URL";
pub const DAPP_ICON_URL_ENV: &str = "MMC_DAPP_ICON_URL";
pub const INFURA_API_KEY_ENV: &str = "MMC_INFURA_API_KEY";
pub const RPC_URLS_ENV: &str = "MMC_RPC_URLS";
pub const RELAY_URL_ENV: &str = "MMC_RELAY_URL";
pub const DATA_DIR_ENV: &str = "MMC_DATA_DIR";
pub const HEADLESS_ENV: &str = "MMC_HEADLESS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Relay endpoint used when none is configured.
pub const DEFAULT_RELAY_URL: &str = "wss://mm-sdk-relay.api.cx.metamask.io/connection/websocket";

/// Longer base64 icons break the connection to the mobile wallet.
pub const BASE64_ICON_MAX_LENGTH: usize = 163_400;

/// Version reported in connection metadata and the SDK info header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_DAPP_NAME: &str = "multichain-connect";

/// Dapp identity sent to the wallet with every connection request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DappMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_icon: Option<String>,
}

fn is_http_url(value: &str) -> bool {
    (value.starts_with("http://") || value.starts_with("https://"))
        && !value.chars().any(char::is_whitespace)
}

impl DappMetadata {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            icon_url: None,
            base64_icon: None,
        }
    }

    /// Check and normalise the metadata.
    ///
    /// A url is mandatory outside web contexts (web hosts fill in their own
    /// origin). Invalid icons are dropped with a warning rather than failing.
    pub fn validated(mut self, is_web: bool) -> Result<Self, ConfigError> {
        if self.url.as_deref().map_or(true, str::is_empty) {
            if !is_web {
                return Err(ConfigError::Missing("dapp url".into()));
            }
            self.url = None;
        }

        if let Some(icon_url) = self.icon_url.as_deref() {
            if !is_http_url(icon_url) {
                warn!(icon_url, "Invalid dapp icon url: must start with http:// or https://");
                self.icon_url = None;
            }
        }

        if let Some(icon) = self.base64_icon.as_deref() {
            if icon.len() > BASE64_ICON_MAX_LENGTH {
                warn!(
                    length = icon.len(),
                    max = BASE64_ICON_MAX_LENGTH,
                    "Invalid dapp base64 icon: too long"
                );
                self.base64_icon = None;
            }
        }

        if let Some(url) = self.url.as_deref() {
            if !is_http_url(url) {
                warn!(url, "Invalid dapp url: must start with http:// or https://");
            }
        }

        Ok(self)
    }

    /// Identifier reported to analytics.
    pub fn dapp_id(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else {
            self.url.as_deref().unwrap_or("N/A")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiOptions {
    pub infura_api_key: Option<String>,
    /// Per-scope endpoints. Entries here win over the Infura table.
    pub readonly_rpc_map: BTreeMap<Scope, String>,
}

impl ApiOptions {
    /// Endpoints in effect for the read-only RPC client.
    pub fn rpc_urls(&self) -> BTreeMap<Scope, String> {
        resolve_rpc_urls(self.infura_api_key.as_deref(), &self.readonly_rpc_map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    /// Never render a modal; links are only logged.
    pub headless: bool,
    pub prefer_extension: bool,
    pub prefer_desktop: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            headless: false,
            prefer_extension: true,
            prefer_desktop: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MobileOptions {
    /// Open `metamask://` links instead of universal links.
    pub use_deeplink: bool,
}

impl Default for MobileOptions {
    fn default() -> Self {
        Self { use_deeplink: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOptions {
    pub relay_url: String,
    pub request_timeout: Duration,
    /// Bounds resume and session negotiation on connect.
    pub connection_timeout: Duration,
    /// Lifetime of one connection request (QR code / deep link).
    pub request_ttl: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connection_timeout: DEFAULT_REQUEST_TIMEOUT + CONNECTION_GRACE_PERIOD,
            request_ttl: DEFAULT_REQUEST_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsOptions {
    pub enabled: bool,
    pub integration_type: String,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            integration_type: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SdkOptions {
    pub dapp: DappMetadata,
    pub api: ApiOptions,
    pub ui: UiOptions,
    pub mobile: MobileOptions,
    pub relay: RelayOptions,
    pub analytics: AnalyticsOptions,
}

impl SdkOptions {
    pub fn new(dapp: DappMetadata) -> Self {
        Self {
            dapp,
            ..Default::default()
        }
    }

    /// Load options from the `MMC_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dapp = DappMetadata {
            name: env_var(DAPP_NAME_ENV).unwrap_or_else(|| DEFAULT_DAPP_NAME.to_string()),
            url: env_var(DAPP_URL_ENV),
            icon_url: env_var(DAPP_ICON_URL_ENV),
            base64_icon: None,
        };

        let readonly_rpc_map = match env_var(RPC_URLS_ENV) {
            Some(raw) => parse_rpc_urls(&raw)?,
            None => BTreeMap::new(),
        };

        let headless = match env_var(HEADLESS_ENV) {
            Some(raw) => parse_bool(HEADLESS_ENV, &raw)?,
            None => false,
        };

        let mut relay = RelayOptions::default();
        if let Some(url) = env_var(RELAY_URL_ENV) {
            relay.relay_url = url;
        }

        Ok(Self {
            dapp,
            api: ApiOptions {
                infura_api_key: env_var(INFURA_API_KEY_ENV),
                readonly_rpc_map,
            },
            ui: UiOptions {
                headless,
                ..Default::default()
            },
            relay,
            ..Default::default()
        })
    }

    /// Value of the `Metamask-Sdk-Info` header.
    pub fn sdk_info(&self, platform: &str) -> String {
        let dapp = self.dapp.url.as_deref().unwrap_or(&self.dapp.name);
        format!(
            "Sdk/Rust SdkVersion/{SDK_VERSION} Platform/{platform} dApp/{dapp} dAppTitle/{}",
            self.dapp.name
        )
    }
}

/// Directory of the file-backed store.
pub fn data_dir_from_env() -> PathBuf {
    env_var(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn log_format_from_env() -> Result<LogFormat, ConfigError> {
    env_var(LOG_FORMAT_ENV)
        .map(|raw| raw.parse())
        .unwrap_or(Ok(LogFormat::Pretty))
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid(format!("{name}: expected a boolean, got `{other}`"))),
    }
}

/// Parse `eip155:1=https://a,eip155:137=https://b`.
pub fn parse_rpc_urls(raw: &str) -> Result<BTreeMap<Scope, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (scope, url) = pair.split_once('=').ok_or_else(|| {
                ConfigError::Invalid(format!("{RPC_URLS_ENV}: expected scope=url, got `{pair}`"))
            })?;
            let scope = Scope::from(scope.trim());
            scope
                .chain_id()
                .map_err(|e| ConfigError::Invalid(format!("{RPC_URLS_ENV}: {e}")))?;
            Ok((scope, url.trim().to_string()))
        })
        .collect()
}
