// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Plain-text install modal for headless hosts.

use std::io::Write;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{ConnectionModal, LinkOpener};

/// Prints connect links to a writer (stdout in the binary).
pub struct TerminalModal<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> TerminalModal<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = writeln!(out, "{text}").and_then(|_| out.flush()) {
            warn!(error = %e, "Failed to write to terminal");
        }
    }

    /// Recover the writer, mainly for inspecting output.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}

impl<W: Write + Send> ConnectionModal for TerminalModal<W> {
    fn show(&self, link: &str, _prefer_desktop: bool, _dismiss: CancellationToken) {
        self.write("Open this link on the device running your wallet to connect:");
        self.write(link);
    }

    fn update_link(&self, link: &str) {
        self.write("Connection request renewed, use this link instead:");
        self.write(link);
    }

    fn close(&self) {
        self.write("Connection prompt closed.");
    }
}

impl<W: Write + Send> LinkOpener for TerminalModal<W> {
    fn open_link(&self, url: &str) {
        self.write(&format!("Open your wallet: {url}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_each_stage() {
        let modal = TerminalModal::new(Vec::new());
        modal.show("https://metamask.app.link/connect?p=1", false, CancellationToken::new());
        modal.update_link("https://metamask.app.link/connect?p=2");
        modal.close();

        let text = String::from_utf8(modal.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "https://metamask.app.link/connect?p=1");
        assert_eq!(lines[3], "https://metamask.app.link/connect?p=2");
        assert_eq!(lines[4], "Connection prompt closed.");
    }
}
