// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The delegate that sits in the host's notification slot.
//
// Each event is forwarded to the previous delegate (if it still exists) and
// then handled by the bridge itself. Until `mark_ready` is called the bridge's
// own handling is deferred in a FIFO queue; forwarding is never deferred.
// Exactly one answer reaches the environment per event, chosen by `Arbiter`.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use pushbridge_core::config::BridgeConfig;
use tracing::{debug, error, info, warn};

use super::{
    Completion, Notification, NotificationCenter, NotificationDelegate, NotificationKind,
    NotificationObserver, PresentationOptions,
};

const UNBOUNDED: usize = usize::MAX;

static SHARED: OnceLock<Arc<NotificationDelegateChain>> = OnceLock::new();

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Progress of the forwarded half of an event.
enum Chained<V> {
    NotForwarded,
    Waiting,
    Answered(V),
    Abandoned,
    Delivered,
}

struct ArbiterState<V> {
    environment: Option<Completion<V>>,
    chained: Chained<V>,
    own: Option<(V, bool)>,
}

impl<V> ArbiterState<V> {
    /// The environment's answer, once it can be decided.
    ///
    /// With `force` the bridge's own value wins as soon as it exists.
    /// Otherwise the previous delegate's answer wins, and the own value is
    /// only used when nothing was forwarded or the forwarded completion was
    /// dropped.
    fn take_delivery(&mut self) -> Option<(Completion<V>, V)> {
        self.environment.as_ref()?;
        let force = self.own.as_ref()?.1;
        if !force && matches!(self.chained, Chained::Waiting) {
            return None;
        }
        let (own, _) = self.own.take()?;
        let value = match std::mem::replace(&mut self.chained, Chained::Delivered) {
            Chained::Answered(answer) if !force => answer,
            _ => own,
        };
        Some((self.environment.take()?, value))
    }
}

/// Merges the bridge's answer with the previous delegate's for one event.
struct Arbiter<V> {
    state: Mutex<ArbiterState<V>>,
}

impl<V: Default + Send + 'static> Arbiter<V> {
    fn new(environment: Completion<V>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ArbiterState {
                environment: Some(environment),
                chained: Chained::NotForwarded,
                own: None,
            }),
        })
    }

    fn chained_completion(self: &Arc<Self>) -> Completion<V> {
        lock(&self.state).chained = Chained::Waiting;
        let arbiter = Arc::clone(self);
        Completion::with_abandon(move |answer| arbiter.on_chained(answer))
    }

    fn on_chained(&self, answer: Option<V>) {
        let delivery = {
            let mut state = lock(&self.state);
            if matches!(state.chained, Chained::Waiting) {
                state.chained = match answer {
                    Some(value) => Chained::Answered(value),
                    None => {
                        debug!("previous delegate dropped its completion");
                        Chained::Abandoned
                    }
                };
            }
            state.take_delivery()
        };
        if let Some((environment, value)) = delivery {
            environment.complete(value);
        }
    }

    fn resolve_own(&self, value: V, force: bool) {
        let delivery = {
            let mut state = lock(&self.state);
            if state.own.is_none() {
                state.own = Some((value, force));
            }
            state.take_delivery()
        };
        if let Some((environment, value)) = delivery {
            environment.complete(value);
        }
    }
}

enum PendingEvent {
    Present(Notification, Arc<Arbiter<PresentationOptions>>),
    Response(Notification, Arc<Arbiter<()>>),
}

impl PendingEvent {
    /// Answer the environment without running the bridge's handling.
    fn settle_conservatively(self) {
        match self {
            Self::Present(_, arbiter) => arbiter.resolve_own(PresentationOptions::NONE, true),
            Self::Response(_, arbiter) => arbiter.resolve_own((), true),
        }
    }
}

#[derive(Default)]
struct ChainState {
    ready: bool,
    draining: bool,
    queue: VecDeque<PendingEvent>,
}

/// Notification delegate that chains to whichever delegate it replaced.
pub struct NotificationDelegateChain {
    previous: Mutex<Option<Weak<dyn NotificationDelegate>>>,
    observer: Mutex<Option<Arc<dyn NotificationObserver>>>,
    state: Mutex<ChainState>,
    show_foreground: AtomicBool,
    force_own_response: AtomicBool,
    max_pending: AtomicUsize,
}

impl Default for NotificationDelegateChain {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationDelegateChain {
    pub fn new() -> Self {
        Self {
            previous: Mutex::new(None),
            observer: Mutex::new(None),
            state: Mutex::new(ChainState::default()),
            show_foreground: AtomicBool::new(false),
            force_own_response: AtomicBool::new(false),
            max_pending: AtomicUsize::new(UNBOUNDED),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        let chain = Self::new();
        chain.configure(config);
        chain
    }

    /// The process-wide instance.
    pub fn shared() -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Apply the notification policies from `config`.
    pub fn configure(&self, config: &BridgeConfig) {
        self.set_show_foreground_notifications(config.show_foreground_notifications);
        self.set_force_own_completion_response(config.force_own_completion_response);
        self.set_max_pending(config.max_pending_notifications);
    }

    pub fn set_show_foreground_notifications(&self, show: bool) {
        self.show_foreground.store(show, Ordering::SeqCst);
    }

    pub fn show_foreground_notifications(&self) -> bool {
        self.show_foreground.load(Ordering::SeqCst)
    }

    /// When set, the bridge's own answer reaches the environment even if the
    /// previous delegate answered too.
    pub fn set_force_own_completion_response(&self, force: bool) {
        self.force_own_response.store(force, Ordering::SeqCst);
    }

    pub fn force_own_completion_response(&self) -> bool {
        self.force_own_response.load(Ordering::SeqCst)
    }

    /// Bound on events held before readiness. `None` is unbounded.
    pub fn set_max_pending(&self, max: Option<usize>) {
        self.max_pending.store(max.unwrap_or(UNBOUNDED), Ordering::SeqCst);
    }

    pub fn set_observer(&self, observer: Arc<dyn NotificationObserver>) {
        *lock(&self.observer) = Some(observer);
    }

    /// Replace the delegate events are forwarded to.
    pub fn set_previous_delegate(&self, previous: Option<Weak<dyn NotificationDelegate>>) {
        *lock(&self.previous) = previous;
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.state).ready
    }

    pub fn pending_events(&self) -> usize {
        lock(&self.state).queue.len()
    }

    /// Install this chain in `center`, keeping a weak link to the delegate
    /// already there. Registering twice never links the chain to itself.
    pub fn register_as_delegate(self: &Arc<Self>, center: &dyn NotificationCenter) {
        let current = center.delegate();
        if let Some(current) = &current {
            if std::ptr::addr_eq(Arc::as_ptr(current), Arc::as_ptr(self)) {
                debug!("notification delegate chain already registered");
                return;
            }
        }
        if current.is_some() {
            info!("chaining to existing notification delegate");
        }
        self.set_previous_delegate(current.as_ref().map(Arc::downgrade));

        let delegate: Arc<dyn NotificationDelegate> = self.clone();
        center.set_delegate(Arc::downgrade(&delegate));
    }

    /// Replay every queued event in arrival order, then handle later events
    /// immediately. Events that arrive while replaying join the back of the
    /// queue and are replayed in the same pass.
    pub fn mark_ready(&self) {
        {
            let mut state = lock(&self.state);
            if state.ready || state.draining {
                return;
            }
            state.draining = true;
        }

        let mut replayed = 0usize;
        loop {
            let next = {
                let mut state = lock(&self.state);
                match state.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        state.draining = false;
                        state.ready = true;
                        break;
                    }
                }
            };
            self.handle(next);
            replayed += 1;
        }
        info!(replayed, "notification delegate chain ready");
    }

    fn previous_delegate(&self) -> Option<Arc<dyn NotificationDelegate>> {
        let previous = lock(&self.previous).clone()?;
        let upgraded = previous.upgrade();
        if upgraded.is_none() {
            debug!("previous notification delegate no longer exists");
        }
        upgraded
    }

    fn forward(&self, forward: impl FnOnce(&dyn NotificationDelegate)) {
        let Some(previous) = self.previous_delegate() else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| forward(previous.as_ref()))).is_err() {
            error!("previous notification delegate panicked");
        }
    }

    fn enqueue_or_handle(&self, event: PendingEvent) {
        let overflow = {
            let mut state = lock(&self.state);
            if state.ready {
                Some(Ok(event))
            } else if state.queue.len() >= self.max_pending.load(Ordering::SeqCst) {
                Some(Err(event))
            } else {
                state.queue.push_back(event);
                debug!(queued = state.queue.len(), "notification event deferred");
                None
            }
        };
        match overflow {
            Some(Ok(event)) => self.handle(event),
            Some(Err(event)) => {
                warn!("notification queue full, answering conservatively");
                event.settle_conservatively();
            }
            None => {}
        }
    }

    fn handle(&self, event: PendingEvent) {
        let force = self.force_own_completion_response();
        match event {
            PendingEvent::Present(notification, arbiter) => {
                self.observe(NotificationKind::Foreground, &notification);
                let own = if self.show_foreground_notifications() {
                    PresentationOptions::ALL
                } else {
                    PresentationOptions::NONE
                };
                arbiter.resolve_own(own, force);
            }
            PendingEvent::Response(notification, arbiter) => {
                self.observe(NotificationKind::Opened, &notification);
                arbiter.resolve_own((), force);
            }
        }
    }

    fn observe(&self, kind: NotificationKind, notification: &Notification) {
        let observer = lock(&self.observer).clone();
        if let Some(observer) = observer {
            if catch_unwind(AssertUnwindSafe(|| observer.on_notification(kind, notification)))
                .is_err()
            {
                error!(kind = kind.name(), "notification observer panicked");
            }
        }
    }
}

impl NotificationDelegate for NotificationDelegateChain {
    fn will_present(&self, notification: &Notification, completion: Completion<PresentationOptions>) {
        let arbiter = Arbiter::new(completion);
        self.forward(|previous| {
            previous.will_present(notification, arbiter.chained_completion())
        });
        self.enqueue_or_handle(PendingEvent::Present(notification.clone(), arbiter));
    }

    fn did_receive_response(&self, notification: &Notification, completion: Completion<()>) {
        let arbiter = Arbiter::new(completion);
        self.forward(|previous| {
            previous.did_receive_response(notification, arbiter.chained_completion())
        });
        self.enqueue_or_handle(PendingEvent::Response(notification.clone(), arbiter));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::HostNotificationCenter;
    use serde_json::Map;

    type Answers<V> = Arc<Mutex<Vec<V>>>;

    fn note(id: &str) -> Notification {
        Notification::new(id, Map::new())
    }

    fn presented(answers: &Answers<PresentationOptions>) -> Completion<PresentationOptions> {
        let sink = Arc::clone(answers);
        Completion::new(move |options| lock(&sink).push(options))
    }

    /// Completion that records which notification it answered.
    fn tagged(answered: &Answers<String>, id: &str) -> Completion<PresentationOptions> {
        let sink = Arc::clone(answered);
        let id = id.to_owned();
        Completion::new(move |_| lock(&sink).push(id))
    }

    /// How a test delegate treats the completions it receives.
    #[derive(Clone, Copy)]
    enum Behaviour {
        Answer(PresentationOptions),
        Drop,
        Hold,
        Panic,
    }

    struct TestDelegate {
        behaviour: Behaviour,
        forwarded: Mutex<Vec<String>>,
        held: Mutex<Vec<Completion<PresentationOptions>>>,
        responses: AtomicUsize,
    }

    impl TestDelegate {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                forwarded: Mutex::new(Vec::new()),
                held: Mutex::new(Vec::new()),
                responses: AtomicUsize::new(0),
            })
        }

        fn forwarded(&self) -> Vec<String> {
            lock(&self.forwarded).clone()
        }
    }

    impl NotificationDelegate for TestDelegate {
        fn will_present(
            &self,
            notification: &Notification,
            completion: Completion<PresentationOptions>,
        ) {
            lock(&self.forwarded).push(notification.identifier.clone());
            match self.behaviour {
                Behaviour::Answer(options) => completion.complete(options),
                Behaviour::Drop => drop(completion),
                Behaviour::Hold => lock(&self.held).push(completion),
                Behaviour::Panic => panic!("delegate failure"),
            }
        }

        fn did_receive_response(&self, _: &Notification, completion: Completion<()>) {
            self.responses.fetch_add(1, Ordering::SeqCst);
            completion.complete(());
        }
    }

    struct RecordingObserver(Mutex<Vec<(NotificationKind, String)>>);

    impl NotificationObserver for RecordingObserver {
        fn on_notification(&self, kind: NotificationKind, notification: &Notification) {
            lock(&self.0).push((kind, notification.identifier.clone()));
        }
    }

    fn chained_to(previous: &Arc<TestDelegate>) -> NotificationDelegateChain {
        let chain = NotificationDelegateChain::new();
        let previous: Arc<dyn NotificationDelegate> = previous.clone();
        chain.set_previous_delegate(Some(Arc::downgrade(&previous)));
        chain
    }

    #[test]
    fn queued_events_drain_in_order_with_one_answer_each() {
        let previous = TestDelegate::new(Behaviour::Answer(PresentationOptions::ALL));
        let chain = chained_to(&previous);
        let observer = Arc::new(RecordingObserver(Mutex::new(Vec::new())));
        chain.set_observer(observer.clone());
        chain.set_force_own_completion_response(true);

        let answered: Answers<String> = Arc::default();
        for id in ["a", "b", "c"] {
            chain.will_present(&note(id), tagged(&answered, id));
        }

        assert_eq!(previous.forwarded(), vec!["a", "b", "c"]);
        assert_eq!(chain.pending_events(), 3);
        assert!(lock(&answered).is_empty());

        chain.mark_ready();

        assert_eq!(*lock(&answered), vec!["a", "b", "c"]);
        let seen: Vec<String> = lock(&observer.0).iter().map(|(_, id)| id.clone()).collect();
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(chain.pending_events(), 0);
        assert!(chain.is_ready());
    }

    #[test]
    fn concurrent_arrivals_and_ready_answer_each_event_once() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 200;

        let chain = Arc::new(NotificationDelegateChain::new());
        let answered: Answers<String> = Arc::default();

        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                let chain = Arc::clone(&chain);
                let answered = Arc::clone(&answered);
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let id = format!("{t}-{i}");
                        chain.will_present(&note(&id), tagged(&answered, &id));
                        if t == 0 && i == PER_THREAD / 2 {
                            chain.mark_ready();
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }
        chain.mark_ready();

        let answered = lock(&answered).clone();
        assert_eq!(answered.len(), THREADS * PER_THREAD);
        let unique: std::collections::HashSet<&String> = answered.iter().collect();
        assert_eq!(unique.len(), THREADS * PER_THREAD);
        assert_eq!(chain.pending_events(), 0);

        // Each producer's events are answered in the order it sent them.
        for t in 0..THREADS {
            let prefix = format!("{t}-");
            let order: Vec<usize> = answered
                .iter()
                .filter_map(|id| id.strip_prefix(&prefix))
                .filter_map(|i| i.parse().ok())
                .collect();
            assert_eq!(order, (0..PER_THREAD).collect::<Vec<_>>());
        }
    }

    #[test]
    fn forced_own_answer_hides_foreground_notifications() {
        let previous = TestDelegate::new(Behaviour::Answer(PresentationOptions::ALL));
        let chain = chained_to(&previous);
        chain.set_force_own_completion_response(true);
        chain.set_show_foreground_notifications(false);
        chain.mark_ready();

        let answers: Answers<PresentationOptions> = Arc::default();
        chain.will_present(&note("fg"), presented(&answers));
        assert_eq!(*lock(&answers), vec![PresentationOptions::NONE]);
    }

    #[test]
    fn forced_own_answer_shows_when_enabled() {
        let chain = NotificationDelegateChain::new();
        chain.set_force_own_completion_response(true);
        chain.set_show_foreground_notifications(true);
        chain.mark_ready();

        let answers: Answers<PresentationOptions> = Arc::default();
        chain.will_present(&note("fg"), presented(&answers));
        assert_eq!(*lock(&answers), vec![PresentationOptions::ALL]);
    }

    #[test]
    fn previous_answer_wins_without_force() {
        let previous = TestDelegate::new(Behaviour::Answer(PresentationOptions::ALL));
        let chain = chained_to(&previous);
        chain.mark_ready();

        let answers: Answers<PresentationOptions> = Arc::default();
        chain.will_present(&note("x"), presented(&answers));
        assert_eq!(*lock(&answers), vec![PresentationOptions::ALL]);
    }

    #[test]
    fn own_answer_used_when_previous_drops_completion() {
        let previous = TestDelegate::new(Behaviour::Drop);
        let chain = chained_to(&previous);
        chain.set_show_foreground_notifications(true);
        chain.mark_ready();

        let answers: Answers<PresentationOptions> = Arc::default();
        chain.will_present(&note("x"), presented(&answers));
        assert_eq!(*lock(&answers), vec![PresentationOptions::ALL]);
    }

    #[test]
    fn late_previous_answer_is_awaited_without_force() {
        let previous = TestDelegate::new(Behaviour::Hold);
        let chain = chained_to(&previous);
        chain.mark_ready();

        let answers: Answers<PresentationOptions> = Arc::default();
        chain.will_present(&note("x"), presented(&answers));
        assert!(lock(&answers).is_empty());

        let held = lock(&previous.held).pop().expect("held completion");
        held.complete(PresentationOptions {
            show_alert: true,
            ..PresentationOptions::NONE
        });
        assert_eq!(lock(&answers).len(), 1);
        assert!(lock(&answers)[0].show_alert);
    }

    #[test]
    fn late_previous_answer_is_ignored_with_force() {
        let previous = TestDelegate::new(Behaviour::Hold);
        let chain = chained_to(&previous);
        chain.set_force_own_completion_response(true);
        chain.mark_ready();

        let answers: Answers<PresentationOptions> = Arc::default();
        chain.will_present(&note("x"), presented(&answers));
        assert_eq!(*lock(&answers), vec![PresentationOptions::NONE]);

        lock(&previous.held).pop().expect("held").complete(PresentationOptions::ALL);
        assert_eq!(*lock(&answers), vec![PresentationOptions::NONE]);
    }

    #[test]
    fn vanished_previous_delegate_is_skipped() {
        let previous = TestDelegate::new(Behaviour::Answer(PresentationOptions::ALL));
        let chain = chained_to(&previous);
        drop(previous);

        let answers: Answers<PresentationOptions> = Arc::default();
        chain.will_present(&note("x"), presented(&answers));
        chain.mark_ready();
        assert_eq!(*lock(&answers), vec![PresentationOptions::NONE]);
    }

    #[test]
    fn panicking_previous_delegate_does_not_block_the_answer() {
        let previous = TestDelegate::new(Behaviour::Panic);
        let chain = chained_to(&previous);
        chain.mark_ready();

        let answers: Answers<PresentationOptions> = Arc::default();
        chain.will_present(&note("x"), presented(&answers));
        assert_eq!(*lock(&answers), vec![PresentationOptions::NONE]);
    }

    #[test]
    fn responses_are_forwarded_and_completed() {
        let previous = TestDelegate::new(Behaviour::Drop);
        let chain = chained_to(&previous);

        let completed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completed);
        chain.did_receive_response(
            &note("tap"),
            Completion::new(move |()| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(previous.responses.load(Ordering::SeqCst), 1);
        assert_eq!(completed.load(Ordering::SeqCst), 0);

        chain.mark_ready();
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn overflow_answers_immediately() {
        let chain = NotificationDelegateChain::new();
        chain.set_max_pending(Some(1));
        chain.set_show_foreground_notifications(true);

        let answers: Answers<PresentationOptions> = Arc::default();
        chain.will_present(&note("kept"), presented(&answers));
        chain.will_present(&note("overflow"), presented(&answers));

        assert_eq!(*lock(&answers), vec![PresentationOptions::NONE]);
        assert_eq!(chain.pending_events(), 1);

        chain.mark_ready();
        assert_eq!(
            *lock(&answers),
            vec![PresentationOptions::NONE, PresentationOptions::ALL]
        );
    }

    /// Observer that delivers one more notification while the queue drains.
    struct ReentrantObserver {
        chain: Weak<NotificationDelegateChain>,
        answers: Answers<PresentationOptions>,
        seen: Mutex<Vec<String>>,
    }

    impl NotificationObserver for ReentrantObserver {
        fn on_notification(&self, _: NotificationKind, notification: &Notification) {
            lock(&self.seen).push(notification.identifier.clone());
            if notification.identifier == "first" {
                if let Some(chain) = self.chain.upgrade() {
                    chain.will_present(&note("during-drain"), presented(&self.answers));
                }
            }
        }
    }

    #[test]
    fn arrivals_during_drain_keep_their_order() {
        let chain = Arc::new(NotificationDelegateChain::new());
        let answers: Answers<PresentationOptions> = Arc::default();
        let observer = Arc::new(ReentrantObserver {
            chain: Arc::downgrade(&chain),
            answers: Arc::clone(&answers),
            seen: Mutex::new(Vec::new()),
        });
        chain.set_observer(observer.clone());

        chain.will_present(&note("first"), presented(&answers));
        chain.will_present(&note("second"), presented(&answers));
        chain.mark_ready();

        assert_eq!(*lock(&observer.seen), vec!["first", "second", "during-drain"]);
        assert_eq!(lock(&answers).len(), 3);
    }

    #[test]
    fn mark_ready_is_idempotent() {
        let chain = NotificationDelegateChain::new();
        chain.mark_ready();
        chain.mark_ready();
        assert!(chain.is_ready());
    }

    #[test]
    fn registration_chains_instead_of_overwriting() {
        let center = HostNotificationCenter::new();
        let existing = TestDelegate::new(Behaviour::Answer(PresentationOptions::ALL));
        let existing_dyn: Arc<dyn NotificationDelegate> = existing.clone();
        center.set_delegate(Arc::downgrade(&existing_dyn));

        let chain = Arc::new(NotificationDelegateChain::new());
        chain.register_as_delegate(&center);
        chain.register_as_delegate(&center);
        chain.mark_ready();

        let installed = center.delegate().expect("delegate installed");
        assert!(std::ptr::addr_eq(Arc::as_ptr(&installed), Arc::as_ptr(&chain)));

        let answers: Answers<PresentationOptions> = Arc::default();
        center.present(&note("x"), {
            let sink = Arc::clone(&answers);
            move |options| lock(&sink).push(options)
        });
        assert_eq!(existing.forwarded(), vec!["x"]);
        assert_eq!(*lock(&answers), vec![PresentationOptions::ALL]);
    }

    #[test]
    fn configure_applies_policies() {
        let config = BridgeConfig {
            show_foreground_notifications: true,
            force_own_completion_response: true,
            max_pending_notifications: Some(4),
            ..BridgeConfig::default()
        };
        let chain = NotificationDelegateChain::from_config(&config);
        assert!(chain.show_foreground_notifications());
        assert!(chain.force_own_completion_response());
    }
}
