// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key manager for the encrypted relay channel.

pub mod key_manager;

pub use key_manager::{decrypt, encrypt, parse_public_key, KeyPair};
