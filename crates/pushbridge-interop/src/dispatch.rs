// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Action dispatch: named actions with JSON parameters, routed to handlers.
//
// The dispatch table is assembled once through `DispatcherBuilder` and is
// read-only afterwards. Every invocation returns a promise. Failures detected
// at the dispatch boundary (unknown action, malformed parameters, a handler
// refusing its input) reject that promise and are also reported once through
// the callback channel as `onBridgeFailure`, for callers that only listen
// there.

use std::collections::HashMap;
use std::sync::Arc;

use pushbridge_core::error::{BridgeError, Result};
use pushbridge_core::types::CallbackEvent;
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

use crate::legacy::{self, LegacyPromise, StructuredPromise};
use crate::params::Parameters;

/// Out-of-band channel back to the scripting side.
pub trait BridgeCallback: Send + Sync {
    /// Deliver `result` under the event name `event`.
    fn call(&self, event: &str, result: Value);
}

impl<F> BridgeCallback for F
where
    F: Fn(&str, Value) + Send + Sync,
{
    fn call(&self, event: &str, result: Value) {
        self(event, result)
    }
}

/// What a handler produced.
#[derive(Debug)]
pub enum ActionResult {
    /// Fire-and-forget action; resolves with `null`.
    Ack,
    /// Synchronously known value.
    Value(Value),
    /// Value that will be known later.
    Pending(StructuredPromise),
}

impl ActionResult {
    /// Normalise into the promise vocabulary.
    pub fn into_promise(self) -> StructuredPromise {
        match self {
            Self::Ack => StructuredPromise::resolved(Value::Null),
            Self::Value(value) => StructuredPromise::resolved(value),
            Self::Pending(promise) => promise,
        }
    }

    /// A string result, or `null` when absent.
    pub fn optional_string(value: Option<String>) -> Self {
        Self::Value(value.map_or(Value::Null, Value::String))
    }
}

/// Per-invocation context handed to a handler.
pub struct ActionContext {
    action: String,
    callback: Option<Arc<dyn BridgeCallback>>,
}

impl ActionContext {
    pub fn new(action: impl Into<String>, callback: Option<Arc<dyn BridgeCallback>>) -> Self {
        Self {
            action: action.into(),
            callback,
        }
    }

    /// Name of the action being handled.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The caller's callback channel, for events emitted after the handler
    /// returns.
    pub fn callback(&self) -> Option<Arc<dyn BridgeCallback>> {
        self.callback.clone()
    }

    /// Emit an event now. Silently dropped when the caller gave no channel.
    pub fn emit(&self, event: CallbackEvent, result: Value) {
        if let Some(callback) = &self.callback {
            callback.call(event.name(), result);
        }
    }
}

/// Something that can run one action.
pub trait ActionHandler: Send + Sync {
    fn handle(&self, parameters: &Parameters, context: &ActionContext) -> Result<ActionResult>;
}

impl<F> ActionHandler for F
where
    F: Fn(&Parameters, &ActionContext) -> Result<ActionResult> + Send + Sync,
{
    fn handle(&self, parameters: &Parameters, context: &ActionContext) -> Result<ActionResult> {
        self(parameters, context)
    }
}

/// Collects handlers before the dispatcher is frozen.
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure for `action`.
    ///
    /// Fails with `BridgeError::DuplicateAction` if the name is taken.
    pub fn register<F>(&mut self, action: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&Parameters, &ActionContext) -> Result<ActionResult> + Send + Sync + 'static,
    {
        self.register_handler(action, Arc::new(handler))
    }

    /// Register a shared handler object for `action`.
    pub fn register_handler(
        &mut self,
        action: &str,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<&mut Self> {
        if action.is_empty() {
            return Err(BridgeError::invalid_parameter("action names must not be empty"));
        }
        if self.handlers.contains_key(action) {
            return Err(BridgeError::DuplicateAction(action.to_owned()));
        }
        debug!(action, "action handler registered");
        self.handlers.insert(action.to_owned(), handler);
        Ok(self)
    }

    pub fn build(self) -> ActionDispatcher {
        ActionDispatcher {
            handlers: self.handlers,
        }
    }
}

/// Routes action names to their handlers.
pub struct ActionDispatcher {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Whether `action` is registered. Names are case-sensitive.
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run `action` and return a promise of its structured result.
    #[instrument(skip(self, parameters, callback))]
    pub fn dispatch(
        &self,
        action: &str,
        parameters: &Parameters,
        callback: Option<Arc<dyn BridgeCallback>>,
    ) -> StructuredPromise {
        if action.is_empty() {
            return self.fail(
                action,
                BridgeError::invalid_parameter("empty action name"),
                callback.as_deref(),
            );
        }

        let Some(handler) = self.handlers.get(action) else {
            return self.fail(
                action,
                BridgeError::UnknownAction(action.to_owned()),
                callback.as_deref(),
            );
        };

        let context = ActionContext::new(action, callback.clone());
        match handler.handle(parameters, &context) {
            Ok(result) => result.into_promise(),
            Err(err) => self.fail(action, err, callback.as_deref()),
        }
    }

    /// Like [`ActionDispatcher::dispatch`] but accepts any decoded JSON
    /// payload; payloads that are not a parameter object are rejected.
    pub fn dispatch_value(
        &self,
        action: &str,
        parameters: Value,
        callback: Option<Arc<dyn BridgeCallback>>,
    ) -> StructuredPromise {
        match Parameters::from_value(parameters) {
            Ok(parameters) => self.dispatch(action, &parameters, callback),
            Err(err) => self.fail(action, err, callback.as_deref()),
        }
    }

    /// Legacy entry point: the returned promise always resolves to a string.
    pub fn call(
        &self,
        action: &str,
        parameters: Value,
        callback: Option<Arc<dyn BridgeCallback>>,
    ) -> LegacyPromise {
        legacy::convert(&self.dispatch_value(action, parameters, callback))
    }

    fn fail(
        &self,
        action: &str,
        err: BridgeError,
        callback: Option<&dyn BridgeCallback>,
    ) -> StructuredPromise {
        error!(action, kind = err.kind(), error = %err, "bridge call failed");
        if let Some(callback) = callback {
            callback.call(
                CallbackEvent::BridgeFailure.name(),
                json!({
                    "action": action,
                    "error": { "cause": err.to_string(), "kind": err.kind() },
                }),
            );
        }
        StructuredPromise::rejected(err)
    }
}
