// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pushbridge host
//
// Entry point. Loads configuration, initialises logging, wires the bridge to
// the in-memory SDK and serves one JSON request per stdin line. Results and
// callback events are written to stdout; logs go to stderr.

mod session;

use pushbridge_core::BridgeConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use session::Session;

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1);
    let (config, config_error) = match config_path.as_deref().map(BridgeConfig::load) {
        None => (BridgeConfig::default(), None),
        Some(Ok(config)) => (config, None),
        Some(Err(err)) => (BridgeConfig::default(), Some(err)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(err) = config_error {
        tracing::warn!(error = %err, "configuration not loaded, using defaults");
    }
    tracing::info!("Pushbridge host starting");

    let session = match Session::start(&config, session::stdout_sink()) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "bridge setup failed");
            std::process::exit(1);
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => session.handle_line(&line),
            Ok(None) => break,
            Err(err) => {
                tracing::error!(error = %err, "reading stdin failed");
                break;
            }
        }
    }
    tracing::info!("stdin closed, shutting down");
}
