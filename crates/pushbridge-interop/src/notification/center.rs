// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The host side of the delegate slot, and launch-time registration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once, Weak};

use tracing::{debug, info};

use super::{Completion, Notification, NotificationDelegate, NotificationDelegateChain, PresentationOptions};

static AUTOMATICALLY_REGISTER: AtomicBool = AtomicBool::new(true);
static LAUNCH: Once = Once::new();

/// Whether the shared chain installs itself when the application finishes
/// launching. Must be changed before launch to have any effect.
pub fn set_automatically_register(enabled: bool) {
    AUTOMATICALLY_REGISTER.store(enabled, Ordering::SeqCst);
}

pub fn automatically_register() -> bool {
    AUTOMATICALLY_REGISTER.load(Ordering::SeqCst)
}

/// Launch hook. Registers the shared chain with `center` at most once per
/// process, and only if automatic registration is still enabled.
///
/// Returns whether this call performed the registration.
pub fn application_did_finish_launching(center: &dyn NotificationCenter) -> bool {
    let mut registered = false;
    LAUNCH.call_once(|| {
        if automatically_register() {
            NotificationDelegateChain::shared().register_as_delegate(center);
            registered = true;
        } else {
            info!("automatic notification delegate registration disabled");
        }
    });
    registered
}

/// A place that holds one notification delegate.
///
/// The slot holds its delegate weakly, so whoever installs a delegate keeps
/// it alive.
pub trait NotificationCenter: Send + Sync {
    fn delegate(&self) -> Option<Arc<dyn NotificationDelegate>>;

    fn set_delegate(&self, delegate: Weak<dyn NotificationDelegate>);
}

/// In-process notification center used on hosts without a native one.
#[derive(Default)]
pub struct HostNotificationCenter {
    delegate: Mutex<Option<Weak<dyn NotificationDelegate>>>,
}

impl HostNotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a foreground notification. Without a delegate the default
    /// presentation is used.
    pub fn present(
        &self,
        notification: &Notification,
        on_complete: impl FnOnce(PresentationOptions) + Send + 'static,
    ) {
        let completion = Completion::new(on_complete);
        match self.delegate() {
            Some(delegate) => delegate.will_present(notification, completion),
            None => {
                debug!(id = %notification.identifier, "no notification delegate installed");
                completion.complete(PresentationOptions::default());
            }
        }
    }

    /// Deliver a user response to a notification.
    pub fn respond(&self, notification: &Notification, on_complete: impl FnOnce() + Send + 'static) {
        let completion = Completion::new(move |()| on_complete());
        match self.delegate() {
            Some(delegate) => delegate.did_receive_response(notification, completion),
            None => completion.complete(()),
        }
    }
}

impl NotificationCenter for HostNotificationCenter {
    fn delegate(&self) -> Option<Arc<dyn NotificationDelegate>> {
        self.delegate
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn set_delegate(&self, delegate: Weak<dyn NotificationDelegate>) {
        *self.delegate.lock().unwrap_or_else(|p| p.into_inner()) = Some(delegate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn empty_center_answers_with_default() {
        let center = HostNotificationCenter::new();
        let answered = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&answered);
        center.present(&Notification::new("n", Map::new()), move |options| {
            *sink.lock().expect("lock") = Some(options)
        });
        assert_eq!(*answered.lock().expect("lock"), Some(PresentationOptions::NONE));
    }

    #[test]
    fn respond_without_delegate_still_completes() {
        let center = HostNotificationCenter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        center.respond(&Notification::new("n", Map::new()), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn launch_registers_shared_chain_once() {
        let center = HostNotificationCenter::new();
        let first = application_did_finish_launching(&center);
        let second = application_did_finish_launching(&center);
        assert!(automatically_register());
        assert!(first);
        assert!(!second);

        let installed = center.delegate().expect("installed");
        let shared = NotificationDelegateChain::shared();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&installed), Arc::as_ptr(&shared)));
    }
}
