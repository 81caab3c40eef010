// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Presentation seams: the install/QR modal, link opening, and the
//! controller that keeps the modal's connection request fresh.
//!
//! Hosts supply their own [`ConnectionModal`] and [`LinkOpener`];
//! [`TerminalModal`] covers headless use.

pub mod install;
pub mod links;
pub mod terminal;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use install::{format_remaining, should_log_countdown, InstallController, RequestSource};
pub use links::{connection_link, parse_connection_link, wallet_link, DEEPLINK_BASE, UNIVERSAL_LINK_BASE};
pub use terminal::TerminalModal;

/// The install/QR surface.
pub trait ConnectionModal: Send + Sync {
    /// Render `link`. `prefer_desktop` favours the extension install path
    /// over the QR code. The modal cancels `dismiss` if the user closes it.
    fn show(&self, link: &str, prefer_desktop: bool, dismiss: CancellationToken);

    /// Replace the rendered link after the request was regenerated.
    fn update_link(&self, link: &str);

    fn close(&self);
}

/// Hands a URL to the OS (deep link, universal link, browser tab).
pub trait LinkOpener: Send + Sync {
    fn open_link(&self, url: &str);
}

/// Stand-in modal for hosts without a UI: links go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogModal;

impl ConnectionModal for LogModal {
    fn show(&self, link: &str, _prefer_desktop: bool, _dismiss: CancellationToken) {
        info!(link, "Open this link with your wallet to connect");
    }

    fn update_link(&self, link: &str) {
        info!(link, "Connection request renewed");
    }

    fn close(&self) {
        debug!("Connection prompt closed");
    }
}
