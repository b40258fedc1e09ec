// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One host session: request parsing, dispatch and output framing.

use std::io::Write;
use std::sync::Arc;

use pushbridge_core::BridgeConfig;
use pushbridge_core::error::{BridgeError, Result};
use pushbridge_core::types::CallbackEvent;
use pushbridge_interop::notification::{
    self, CallbackObserver, HostNotificationCenter, Notification, NotificationDelegateChain,
};
use pushbridge_interop::traits::NativeSdk;
use pushbridge_interop::{ActionDispatcher, BridgeCallback, bridge, platform_sdk};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

/// Where output lines go.
pub type Sink = Arc<dyn Fn(Value) + Send + Sync>;

/// Write each value as one line of compact JSON on stdout.
pub fn stdout_sink() -> Sink {
    Arc::new(|line: Value| {
        let mut out = std::io::stdout().lock();
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(error = %err, "writing stdout failed");
        }
    })
}

#[derive(Debug, Deserialize)]
struct IncomingNotification {
    identifier: String,
    #[serde(default)]
    payload: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum NotificationEvent {
    #[default]
    Foreground,
    Opened,
}

/// One stdin line.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Request {
    Action {
        action: String,
        #[serde(default)]
        parameters: Value,
    },
    Notification {
        notification: IncomingNotification,
        #[serde(default)]
        event: NotificationEvent,
    },
}

pub struct Session {
    dispatcher: ActionDispatcher,
    center: HostNotificationCenter,
    callback: Arc<dyn BridgeCallback>,
    sink: Sink,
}

impl Session {
    /// Session around the process-wide delegate chain.
    pub fn start(config: &BridgeConfig, sink: Sink) -> Result<Self> {
        let chain = NotificationDelegateChain::shared();
        chain.configure(config);
        notification::set_automatically_register(config.automatically_register);

        let session = Self::with_chain(platform_sdk(), Arc::clone(&chain), sink)?;
        if !notification::application_did_finish_launching(&session.center) {
            debug!("registering notification delegate chain explicitly");
            chain.register_as_delegate(&session.center);
        }
        Ok(session)
    }

    fn with_chain(
        sdk: Arc<dyn NativeSdk>,
        chain: Arc<NotificationDelegateChain>,
        sink: Sink,
    ) -> Result<Self> {
        let callback_sink = Arc::clone(&sink);
        let callback: Arc<dyn BridgeCallback> = Arc::new(move |event: &str, result: Value| {
            callback_sink(json!({ "callback": event, "result": result }));
        });
        chain.set_observer(Arc::new(CallbackObserver::new(Arc::clone(&callback))));

        Ok(Self {
            dispatcher: bridge(sdk, chain)?,
            center: HostNotificationCenter::new(),
            callback,
            sink,
        })
    }

    /// Handle one input line. Never fails: problems become
    /// `onBridgeFailure` callback lines.
    pub fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match serde_json::from_str::<Request>(line) {
            Ok(Request::Action { action, parameters }) => self.run_action(action, parameters),
            Ok(Request::Notification { notification, event }) => {
                self.deliver(Notification::new(notification.identifier, notification.payload), event)
            }
            Err(err) => {
                let err = BridgeError::invalid_parameter(format!("malformed request: {err}"));
                warn!(error = %err, "request rejected");
                self.callback.call(
                    CallbackEvent::BridgeFailure.name(),
                    json!({
                        "action": Value::Null,
                        "error": { "cause": err.to_string(), "kind": err.kind() },
                    }),
                );
            }
        }
    }

    fn run_action(&self, action: String, parameters: Value) {
        let result = self.dispatcher.call(&action, parameters, Some(Arc::clone(&self.callback)));
        let sink = Arc::clone(&self.sink);
        result.then(move |result| sink(json!({ "action": action, "result": result })));
    }

    fn deliver(&self, notification: Notification, event: NotificationEvent) {
        let sink = Arc::clone(&self.sink);
        let id = notification.identifier.clone();
        match event {
            NotificationEvent::Foreground => self.center.present(&notification, move |options| {
                sink(json!({
                    "notification": id,
                    "presentation": {
                        "alert": options.show_alert,
                        "sound": options.play_sound,
                        "badge": options.update_badge,
                    },
                }))
            }),
            NotificationEvent::Opened => self.center.respond(&notification, move || {
                sink(json!({ "notification": id, "handled": true }))
            }),
        }
    }
}
