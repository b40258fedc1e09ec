// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Settings that shape the notification delegate chain and the host process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Display notifications that arrive while the app is in the foreground.
    pub show_foreground_notifications: bool,
    /// Always answer the environment with the bridge's own completion value,
    /// even when the chained delegate supplied one.
    pub force_own_completion_response: bool,
    /// Install the delegate chain as soon as the application finishes
    /// launching. When false the embedding application registers it.
    pub automatically_register: bool,
    /// Upper bound on notifications held before the readiness signal.
    /// `None` keeps every event.
    pub max_pending_notifications: Option<usize>,
    /// Fallback `tracing` filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            show_foreground_notifications: false,
            force_own_completion_response: false,
            automatically_register: true,
            max_pending_notifications: None,
            log_filter: "info".into(),
        }
    }
}

impl BridgeConfig {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults; unreadable or malformed files are
    /// reported as `BridgeError::Config`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| BridgeError::Config(format!("parse {}: {e}", path.display())))
    }
}
