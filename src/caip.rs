// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CAIP-2 chain identifiers (scopes) and CAIP-10 account identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An opaque namespaced chain identifier (`<namespace>:<reference>`).
///
/// Equality is plain string equality; use [`Scope::chain_id`] when the
/// namespace/reference parts are needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the scope as a CAIP-2 chain id.
    pub fn chain_id(&self) -> Result<ChainId, CaipError> {
        self.0.parse()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A parsed CAIP-2 chain identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    pub namespace: String,
    pub reference: String,
}

impl FromStr for ChainId {
    type Err = CaipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| CaipError::InvalidChainId(s.to_string()))?;

        if !is_valid_namespace(namespace) || !is_valid_reference(reference) {
            return Err(CaipError::InvalidChainId(s.to_string()));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            reference: reference.to_string(),
        })
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

/// A parsed CAIP-10 account identifier (`<namespace>:<reference>:<address>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId {
    pub chain: ChainId,
    pub address: String,
}

impl AccountId {
    /// Whether this account lives on the chain named by `scope`.
    pub fn is_on(&self, scope: &Scope) -> bool {
        scope.chain_id().map(|c| c == self.chain).unwrap_or(false)
    }
}

impl FromStr for AccountId {
    type Err = CaipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(namespace), Some(reference), Some(address)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CaipError::InvalidAccountId(s.to_string()));
        };

        if !is_valid_namespace(namespace)
            || !is_valid_reference(reference)
            || !is_valid_address(address)
        {
            return Err(CaipError::InvalidAccountId(s.to_string()));
        }

        Ok(Self {
            chain: ChainId {
                namespace: namespace.to_string(),
                reference: reference.to_string(),
            },
            address: address.to_string(),
        })
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

/// CAIP parsing errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaipError {
    #[error("Invalid CAIP-2 chain id: {0}")]
    InvalidChainId(String),

    #[error("Invalid CAIP-10 account id: {0}")]
    InvalidAccountId(String),
}

// [-a-z0-9]{3,8}
fn is_valid_namespace(s: &str) -> bool {
    (3..=8).contains(&s.len())
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

// [-_a-zA-Z0-9]{1,32}
fn is_valid_reference(s: &str) -> bool {
    (1..=32).contains(&s.len())
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// [-.%a-zA-Z0-9]{1,128}
fn is_valid_address(s: &str) -> bool {
    (1..=128).contains(&s.len())
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '%')
}
