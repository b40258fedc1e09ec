// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-fire promise used as the only concurrency vocabulary of the bridge.
//
// A promise settles exactly once, from Pending to Resolved or Rejected. It
// holds at most one success handler and one error handler; a handler attached
// after settlement runs immediately on the attaching thread. State and handler
// slots share one mutex, and handlers always run after the lock is released so
// they may freely touch the promise again.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use pushbridge_core::error::{BridgeError, Result};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type SuccessHandler<T> = Box<dyn FnOnce(T) + Send>;
type ErrorHandler = Box<dyn FnOnce(BridgeError) + Send>;

enum State<T> {
    Pending,
    Resolved(T),
    Rejected(BridgeError),
}

struct Inner<T> {
    state: State<T>,
    on_success: Option<SuccessHandler<T>>,
    on_error: Option<ErrorHandler>,
}

/// A single-resolution future with callback attachment.
///
/// Cloning yields another handle on the same promise: every handle observes
/// the same settlement.
pub struct SimplePromise<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for SimplePromise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Default for SimplePromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> SimplePromise<T> {
    /// A pending promise.
    pub fn new() -> Self {
        Self::with_state(State::Pending)
    }

    /// An already-resolved promise.
    pub fn resolved(value: T) -> Self {
        Self::with_state(State::Resolved(value))
    }

    /// An already-rejected promise.
    pub fn rejected(error: BridgeError) -> Self {
        Self::with_state(State::Rejected(error))
    }

    /// Create a pending promise and hand a handle to `executor`, which is
    /// expected to settle it later (typically from a native SDK callback).
    pub fn deferred(executor: impl FnOnce(SimplePromise<T>)) -> Self {
        let promise = Self::new();
        executor(promise.clone());
        promise
    }

    fn with_state(state: State<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                on_success: None,
                on_error: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // A handler never runs under the lock, so a poisoned mutex still
        // holds a consistent state.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve the promise, running the success handler if one is attached.
    ///
    /// Returns `BridgeError::AlreadySettled` when the promise is terminal; the
    /// state is left untouched in that case.
    pub fn try_resolve(&self, value: T) -> Result<()> {
        let (handler, discarded) = {
            let mut inner = self.lock();
            if !matches!(inner.state, State::Pending) {
                return Err(BridgeError::AlreadySettled);
            }
            let handler = inner.on_success.take();
            let discarded = inner.on_error.take();
            inner.state = State::Resolved(value.clone());
            (handler, discarded)
        };
        drop(discarded);

        if let Some(handler) = handler {
            handler(value);
        }
        Ok(())
    }

    /// Reject the promise, running the error handler if one is attached.
    pub fn try_reject(&self, error: BridgeError) -> Result<()> {
        let (handler, discarded) = {
            let mut inner = self.lock();
            if !matches!(inner.state, State::Pending) {
                return Err(BridgeError::AlreadySettled);
            }
            let handler = inner.on_error.take();
            let discarded = inner.on_success.take();
            inner.state = State::Rejected(error.clone());
            (handler, discarded)
        };
        drop(discarded);

        if let Some(handler) = handler {
            handler(error);
        }
        Ok(())
    }

    /// Resolve the promise. Settling a terminal promise is a logged no-op.
    pub fn resolve(&self, value: T) {
        if let Err(err) = self.try_resolve(value) {
            debug!(error = %err, "ignoring resolve on a settled promise");
        }
    }

    /// Reject the promise. Settling a terminal promise is a logged no-op.
    pub fn reject(&self, error: BridgeError) {
        if let Err(err) = self.try_reject(error) {
            debug!(error = %err, "ignoring reject on a settled promise");
        }
    }

    /// Resolve or reject from a `Result`.
    pub fn settle(&self, outcome: Result<T>) {
        match outcome {
            Ok(value) => self.resolve(value),
            Err(error) => self.reject(error),
        }
    }

    /// Attach the success handler.
    ///
    /// Runs immediately if the promise is already resolved; never runs if it
    /// is rejected. Attaching a second handler while pending replaces the
    /// first.
    pub fn then(&self, on_success: impl FnOnce(T) + Send + 'static) {
        let mut inner = self.lock();
        let settled = match &inner.state {
            State::Pending => None,
            State::Resolved(value) => Some(Some(value.clone())),
            State::Rejected(_) => Some(None),
        };

        match settled {
            Some(Some(value)) => {
                drop(inner);
                on_success(value);
            }
            Some(None) => {}
            None => {
                let replaced = inner.on_success.replace(Box::new(on_success));
                drop(inner);
                if replaced.is_some() {
                    warn!("success handler replaced on a pending promise");
                }
            }
        }
    }

    /// Attach the error handler. Mirror image of [`SimplePromise::then`].
    pub fn catch(&self, on_error: impl FnOnce(BridgeError) + Send + 'static) {
        let mut inner = self.lock();
        let settled = match &inner.state {
            State::Pending => None,
            State::Rejected(error) => Some(Some(error.clone())),
            State::Resolved(_) => Some(None),
        };

        match settled {
            Some(Some(error)) => {
                drop(inner);
                on_error(error);
            }
            Some(None) => {}
            None => {
                let replaced = inner.on_error.replace(Box::new(on_error));
                drop(inner);
                if replaced.is_some() {
                    warn!("error handler replaced on a pending promise");
                }
            }
        }
    }

    /// Whether the promise has not settled yet.
    pub fn is_pending(&self) -> bool {
        matches!(self.lock().state, State::Pending)
    }

    /// Snapshot of the outcome, or `None` while pending.
    pub fn peek(&self) -> Option<Result<T>> {
        match &self.lock().state {
            State::Pending => None,
            State::Resolved(value) => Some(Ok(value.clone())),
            State::Rejected(error) => Some(Err(error.clone())),
        }
    }

    /// Await the outcome from async code.
    ///
    /// Occupies both handler slots. If every handle is dropped while the
    /// promise is still pending the future yields `BridgeError::Abandoned`.
    pub fn into_future(self) -> impl Future<Output = Result<T>> + Send {
        let (tx, rx) = oneshot::channel::<Result<T>>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let tx_error = Arc::clone(&tx);

        self.then(move |value| send_once(&tx, Ok(value)));
        self.catch(move |error| send_once(&tx_error, Err(error)));
        drop(self);

        async move { rx.await.unwrap_or(Err(BridgeError::Abandoned)) }
    }
}

fn send_once<T>(slot: &Mutex<Option<oneshot::Sender<Result<T>>>>, outcome: Result<T>) {
    let sender = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(sender) = sender {
        // The receiver may already be gone; nothing to report then.
        let _ = sender.send(outcome);
    }
}

impl<T> std::fmt::Debug for SimplePromise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner.try_lock() {
            Ok(inner) => match inner.state {
                State::Pending => "pending",
                State::Resolved(_) => "resolved",
                State::Rejected(_) => "rejected",
            },
            Err(_) => "locked",
        };
        f.debug_struct("SimplePromise").field("state", &state).finish()
    }
}
