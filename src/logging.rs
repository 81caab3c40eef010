// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tracing setup and debug-flag resolution.
//!
//! Debug output for the SDK core is switched on by a `debug` environment
//! variable, or the `DEBUG` storage key, naming one of [`NAMESPACES`] (or a
//! wildcard). `RUST_LOG` still takes precedence when set.

use std::env;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;
use crate::storage::Store;

pub const NAMESPACE_ROOT: &str = "metamask-sdk";
pub const NAMESPACE_CORE: &str = "metamask-sdk:core";
pub const NAMESPACE_PROVIDER: &str = "metamask-sdk:provider";

/// Debug namespaces and the tracing targets they enable.
pub const NAMESPACES: &[(&str, &str)] = &[
    (NAMESPACE_ROOT, "multichain_connect"),
    (NAMESPACE_CORE, "multichain_connect::sdk"),
    (NAMESPACE_PROVIDER, "multichain_connect::rpc"),
];

/// Environment variable holding debug namespaces.
pub const DEBUG_ENV: &str = "debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid(format!("unknown LOG_FORMAT `{other}`"))),
        }
    }
}

/// Whether `debug_value` switches on `namespace`.
pub fn is_namespace_enabled(debug_value: &str, namespace: &str) -> bool {
    debug_value.contains(namespace)
        || debug_value.contains("metamask-sdk:*")
        || debug_value.contains('*')
}

/// Resolve the debug flag for `namespace`: environment first, then storage.
pub async fn is_debug_enabled(namespace: &str, store: &Store) -> bool {
    if let Some(value) = env::var(DEBUG_ENV).ok().filter(|v| !v.is_empty()) {
        return is_namespace_enabled(&value, namespace);
    }

    match store.get_debug().await {
        Ok(Some(value)) => is_namespace_enabled(&value, namespace),
        _ => false,
    }
}

fn tracing_target(namespace: &str) -> &'static str {
    NAMESPACES
        .iter()
        .find(|(ns, _)| *ns == namespace)
        .map(|(_, target)| *target)
        .unwrap_or("multichain_connect")
}

/// The filter used when `RUST_LOG` is not set.
pub fn default_filter(debug_namespace: Option<&str>) -> String {
    match debug_namespace {
        Some(namespace) => format!("info,multichain_connect=info,{}=debug", tracing_target(namespace)),
        None => "info,multichain_connect=info".to_string(),
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing(format: LogFormat, debug_namespace: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug_namespace)));

    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
