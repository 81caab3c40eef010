// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Analytics emission seam. Delivery is up to the host.

use serde_json::Value;
use tracing::debug;

pub trait AnalyticsSink: Send + Sync {
    fn set_global_property(&self, key: &str, value: &str);

    /// Start delivering tracked events.
    fn enable(&self);

    fn track(&self, event: &str, properties: &Value);
}

/// Writes analytics calls to the debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn set_global_property(&self, key: &str, value: &str) {
        debug!(key, value, "Analytics global property");
    }

    fn enable(&self) {
        debug!("Analytics enabled");
    }

    fn track(&self, event: &str, properties: &Value) {
        debug!(event, %properties, "Analytics event");
    }
}
