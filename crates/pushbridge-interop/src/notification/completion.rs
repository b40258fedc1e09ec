// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use tracing::warn;

type Handler<V> = Box<dyn FnOnce(Option<V>) + Send>;

/// One-shot completion handed to a notification delegate.
///
/// `complete` consumes the handle, so a delegate cannot answer twice. A
/// completion dropped without an answer still fires: the environment
/// receives `V::default()`, the conservative answer.
pub struct Completion<V> {
    handler: Option<Handler<V>>,
}

impl<V: Default + Send + 'static> Completion<V> {
    pub fn new(on_complete: impl FnOnce(V) + Send + 'static) -> Self {
        Self {
            handler: Some(Box::new(move |answer: Option<V>| {
                let value = answer.unwrap_or_else(|| {
                    warn!("notification completion dropped unanswered, using default");
                    V::default()
                });
                on_complete(value);
            })),
        }
    }
}

impl<V> Completion<V> {
    /// Completion whose handler learns whether it was answered or dropped.
    pub(crate) fn with_abandon(on_answer: impl FnOnce(Option<V>) + Send + 'static) -> Self {
        Self {
            handler: Some(Box::new(on_answer)),
        }
    }

    pub fn complete(mut self, value: V) {
        if let Some(handler) = self.handler.take() {
            handler(Some(value));
        }
    }
}

impl<V> Drop for Completion<V> {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler(None);
        }
    }
}

impl<V> std::fmt::Debug for Completion<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("answered", &self.handler.is_none())
            .finish()
    }
}
