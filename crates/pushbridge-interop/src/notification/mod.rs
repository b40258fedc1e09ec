// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Notification delegate chaining.
//
// The host environment allows one notification delegate at a time. The
// bridge installs itself in that slot while keeping a weak link to whoever
// held it before, forwards every event there, and decides which answer the
// environment finally receives. Events that arrive before the bridge is
// ready are queued and replayed in order.

mod center;
mod chain;
mod completion;

use std::sync::Arc;

use pushbridge_core::types::CallbackEvent;
use serde_json::{Map, Value, json};

use crate::dispatch::BridgeCallback;

pub use center::{
    HostNotificationCenter, NotificationCenter, application_did_finish_launching,
    automatically_register, set_automatically_register,
};
pub use chain::NotificationDelegateChain;
pub use completion::Completion;

/// A delivered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub identifier: String,
    pub payload: Map<String, Value>,
}

impl Notification {
    pub fn new(identifier: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            identifier: identifier.into(),
            payload,
        }
    }

    /// A landing message rides in the `ld` entry of the `com.batch` object.
    pub fn has_landing_message(&self) -> bool {
        self.payload
            .get("com.batch")
            .and_then(Value::as_object)
            .is_some_and(|internal| internal.contains_key("ld"))
    }
}

/// How a notification arriving in the foreground is presented.
///
/// The default presents nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentationOptions {
    pub show_alert: bool,
    pub play_sound: bool,
    pub update_badge: bool,
}

impl PresentationOptions {
    pub const NONE: Self = Self {
        show_alert: false,
        play_sound: false,
        update_badge: false,
    };

    pub const ALL: Self = Self {
        show_alert: true,
        play_sound: true,
        update_badge: true,
    };
}

/// The slot the host environment fills with one delegate.
///
/// Each method receives exactly one completion; dropping it answers with the
/// default.
pub trait NotificationDelegate: Send + Sync {
    /// A notification arrived while the app is in the foreground.
    fn will_present(&self, notification: &Notification, completion: Completion<PresentationOptions>);

    /// The user interacted with a notification.
    fn did_receive_response(&self, notification: &Notification, completion: Completion<()>);
}

/// Which delegate event produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Foreground,
    Opened,
}

impl NotificationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Foreground => "foreground",
            Self::Opened => "opened",
        }
    }
}

/// Receives the bridge's own view of every notification event.
pub trait NotificationObserver: Send + Sync {
    fn on_notification(&self, kind: NotificationKind, notification: &Notification);
}

/// Forwards notifications to the scripting side as `_dispatchPush`.
pub struct CallbackObserver {
    callback: Arc<dyn BridgeCallback>,
}

impl CallbackObserver {
    pub fn new(callback: Arc<dyn BridgeCallback>) -> Self {
        Self { callback }
    }
}

impl NotificationObserver for CallbackObserver {
    fn on_notification(&self, kind: NotificationKind, notification: &Notification) {
        self.callback.call(
            CallbackEvent::DispatchPush.name(),
            json!({
                "kind": kind.name(),
                "identifier": notification.identifier,
                "payload": notification.payload,
                "hasLandingMessage": notification.has_landing_message(),
            }),
        );
    }
}
