// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keeps the install/QR modal's connection request alive.
//!
//! The controller owns one live [`ConnectionRequest`]. A 1s ticker tracks
//! time to expiry; once the deadline passes it asks the [`RequestSource`]
//! for a replacement and pushes the new link to the modal. The transport's
//! handshake listener stays attached throughout, so a wallet that scanned
//! the previous link can still complete.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::links::connection_link;
use super::ConnectionModal;
use crate::error::TransportError;
use crate::transport::relay::ConnectionRequest;

const TICK: Duration = Duration::from_secs(1);

/// Produces a fresh connection request when the live one expires.
#[async_trait]
pub trait RequestSource: Send + Sync {
    async fn next_request(&self) -> Result<ConnectionRequest, TransportError>;
}

/// Whether the countdown should be logged with `remaining_secs` left.
pub fn should_log_countdown(remaining_secs: u64) -> bool {
    match remaining_secs {
        0..=9 => true,
        10..=29 => remaining_secs % 5 == 0,
        30..=59 => remaining_secs % 10 == 0,
        60..=299 => remaining_secs % 30 == 0,
        _ => remaining_secs % 60 == 0,
    }
}

/// `1m 05s`, `42s`.
pub fn format_remaining(remaining_secs: u64) -> String {
    let minutes = remaining_secs / 60;
    let seconds = remaining_secs % 60;
    if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

fn deadline_for(request: &ConnectionRequest) -> Instant {
    let remaining = request.session_request.remaining_ms(Utc::now()).max(0) as u64;
    Instant::now() + Duration::from_millis(remaining)
}

pub struct InstallController {
    current: Arc<Mutex<ConnectionRequest>>,
    token: CancellationToken,
    ticker: Option<JoinHandle<()>>,
}

impl InstallController {
    /// Start ticking for `initial`, which the modal is already showing.
    pub fn start(
        initial: ConnectionRequest,
        source: Arc<dyn RequestSource>,
        modal: Arc<dyn ConnectionModal>,
        use_deeplink: bool,
    ) -> Self {
        let token = CancellationToken::new();
        let current = Arc::new(Mutex::new(initial));
        let ticker = tokio::spawn(run(
            current.clone(),
            source,
            modal,
            use_deeplink,
            token.clone(),
        ));

        Self {
            current,
            token,
            ticker: Some(ticker),
        }
    }

    /// The request the modal currently shows.
    pub fn current_request(&self) -> ConnectionRequest {
        self.current
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the ticker and wait for it to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.await;
        }
    }
}

impl Drop for InstallController {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(
    current: Arc<Mutex<ConnectionRequest>>,
    source: Arc<dyn RequestSource>,
    modal: Arc<dyn ConnectionModal>,
    use_deeplink: bool,
    token: CancellationToken,
) {
    let mut deadline = {
        let request = current.lock().unwrap_or_else(|p| p.into_inner());
        deadline_for(&request)
    };
    let mut ticks = interval(TICK);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticks.tick() => {}
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            let secs = remaining.as_secs();
            if should_log_countdown(secs) {
                debug!(remaining = %format_remaining(secs), "Connection request expires soon");
            }
            continue;
        }

        info!("Connection request expired, generating a new one");
        let next = tokio::select! {
            _ = token.cancelled() => break,
            next = source.next_request() => next,
        };
        let request = match next {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Failed to regenerate connection request");
                break;
            }
        };

        match connection_link(use_deeplink, &request) {
            Ok(link) => modal.update_link(&link),
            Err(e) => {
                warn!(error = %e, "Failed to render connection link");
                break;
            }
        }
        deadline = deadline_for(&request);
        *current.lock().unwrap_or_else(|p| p.into_inner()) = request;
    }
    debug!("Install controller stopped");
}
