// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Host capabilities, resolved once when the SDK is built.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformType {
    DesktopWeb,
    MobileWeb,
    /// The wallet's own in-app browser.
    WalletWebview,
    ReactNative,
    /// Servers, CLIs, and other non-browser hosts.
    NonBrowser,
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::DesktopWeb => "web-desktop",
            PlatformType::MobileWeb => "web-mobile",
            PlatformType::WalletWebview => "in-app-browser",
            PlatformType::ReactNative => "react-native",
            PlatformType::NonBrowser => "nodejs",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the host can do. Passed in explicitly instead of being sniffed at
/// each decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub platform: PlatformType,
    /// A wallet browser extension is installed and reachable.
    pub has_extension: bool,
}

impl Environment {
    pub fn new(platform: PlatformType, has_extension: bool) -> Self {
        Self {
            platform,
            has_extension,
        }
    }

    /// A server or CLI host.
    pub fn headless() -> Self {
        Self::new(PlatformType::NonBrowser, false)
    }

    /// Whether the host is a browser page that can see an extension.
    pub fn is_web(&self) -> bool {
        matches!(
            self.platform,
            PlatformType::DesktopWeb | PlatformType::WalletWebview
        )
    }

    /// Any browser-like host, used for metadata defaults and analytics.
    pub fn is_browser(&self) -> bool {
        matches!(
            self.platform,
            PlatformType::DesktopWeb | PlatformType::MobileWeb | PlatformType::WalletWebview
        )
    }

    /// A mobile host that can foreground the wallet app through links.
    pub fn is_secure_mobile(&self) -> bool {
        matches!(
            self.platform,
            PlatformType::MobileWeb | PlatformType::ReactNative
        )
    }

    pub fn is_headless(&self) -> bool {
        self.platform == PlatformType::NonBrowser
    }
}
