// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The SDK facade: host capabilities, host-supplied services, and the
//! orchestrator that ties transports, sessions, and routing together.

pub mod analytics;
pub mod environment;
pub mod host;
pub mod orchestrator;

pub use analytics::{AnalyticsSink, TracingAnalytics};
pub use environment::{Environment, PlatformType};
pub use host::{DappClientFactory, HostServices, WebSocketClientFactory};
pub use orchestrator::{MultichainSdk, SdkEvent, SdkState};
