// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory SDK for desktop/CI builds where the native push SDK is unavailable.
//
// Keeps every piece of user data in process memory and answers asynchronous
// calls synchronously. Also used by the test suite to observe what the action
// handlers hand to the SDK.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use pushbridge_core::error::{BridgeError, Result};
use pushbridge_core::types::{
    EmailSubscription, FetcherOptions, FetcherOwner, InboxNotification, InboxPage, Location,
    PendingMessage, PushPlatform, SdkConfig, TrackedEvent, UserAttribute, UserDataOperation,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::traits::*;

/// Page size used when a fetcher is created without one.
const DEFAULT_PAGE_SIZE: usize = 20;

/// How many SDK entry points `StubState::calls` remembers.
pub const RECORDED_CALLS: usize = 64;

/// Everything the stub remembers.
#[derive(Debug, Default)]
pub struct StubState {
    pub config: Option<SdkConfig>,
    pub started: bool,
    pub opted_out: bool,
    pub push_token: Option<String>,
    pub installation_id: Option<String>,
    pub language: Option<String>,
    pub region: Option<String>,
    pub identifier: Option<String>,
    pub attributes: BTreeMap<String, UserAttribute>,
    pub tags: BTreeMap<String, BTreeSet<String>>,
    pub events: Vec<TrackedEvent>,
    pub transactions: Vec<(f64, Option<Map<String, Value>>)>,
    pub locations: Vec<Location>,
    pub notification_types: BTreeMap<&'static str, u32>,
    /// Custom user ID of the identified profile; `None` when logged out.
    pub custom_user_id: Option<String>,
    pub profile: ProfileState,
    pub do_not_disturb: bool,
    pub pending_message: Option<PendingMessage>,
    /// When set, every asynchronous fetch fails with this message.
    pub fetch_failure: Option<String>,
    /// Names of the most recent SDK entry points called, oldest first.
    /// Holds at most [`RECORDED_CALLS`] entries.
    pub calls: VecDeque<String>,
}

/// Data held for the identified profile.
#[derive(Debug, Default)]
pub struct ProfileState {
    pub language: Option<String>,
    pub region: Option<String>,
    pub email: Option<String>,
    pub email_marketing: Option<EmailSubscription>,
    pub attributes: BTreeMap<String, UserAttribute>,
    pub events: Vec<TrackedEvent>,
    pub locations: Vec<Location>,
}

/// In-memory `NativeSdk`.
#[derive(Clone, Default)]
pub struct StubSdk {
    state: Arc<Mutex<StubState>>,
    inbox: Arc<Mutex<Vec<InboxNotification>>>,
}

impl StubSdk {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stub with a fixed installation ID and push token.
    pub fn with_identity(installation_id: &str, push_token: Option<&str>) -> Self {
        let sdk = Self::new();
        {
            let mut state = sdk.state();
            state.installation_id = Some(installation_id.to_owned());
            state.push_token = push_token.map(str::to_owned);
        }
        sdk
    }

    /// Lock and expose the recorded state.
    pub fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the notifications every fetcher reads from (newest first).
    pub fn seed_inbox(&self, notifications: Vec<InboxNotification>) {
        *self.inbox.lock().unwrap_or_else(|p| p.into_inner()) = notifications;
    }

    fn record(&self, call: &str) -> MutexGuard<'_, StubState> {
        let mut state = self.state();
        if state.calls.len() == RECORDED_CALLS {
            state.calls.pop_front();
        }
        state.calls.push_back(call.to_owned());
        state
    }

    fn fetch_failure(&self) -> Option<BridgeError> {
        self.state()
            .fetch_failure
            .clone()
            .map(BridgeError::CollaboratorFailure)
    }
}

impl NativeSdk for StubSdk {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl CoreSdk for StubSdk {
    fn set_config(&self, config: SdkConfig) -> Result<()> {
        if config.api_key.trim().is_empty() {
            return Err(BridgeError::invalid_parameter("APIKey must not be empty"));
        }
        self.record("set_config").config = Some(config);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut state = self.record("start");
        if state.config.is_none() {
            warn!("stub SDK started without configuration");
        }
        if state.installation_id.is_none() {
            state.installation_id = Some(Uuid::new_v4().to_string());
        }
        state.started = true;
        info!("stub SDK started");
        Ok(())
    }

    fn opt_in(&self) -> Result<()> {
        self.record("opt_in").opted_out = false;
        Ok(())
    }

    fn opt_out(&self, wipe_data: bool) -> Result<()> {
        let mut state = self.record(if wipe_data { "opt_out_and_wipe" } else { "opt_out" });
        state.opted_out = true;
        if wipe_data {
            state.attributes.clear();
            state.tags.clear();
            state.events.clear();
            state.identifier = None;
        }
        Ok(())
    }
}

impl PushSdk for StubSdk {
    fn last_known_push_token(&self) -> Option<String> {
        self.record("last_known_push_token").push_token.clone()
    }

    fn register_for_remote_notifications(&self) -> Result<()> {
        self.record("register_for_remote_notifications");
        Ok(())
    }

    fn refresh_token(&self) -> Result<()> {
        self.record("refresh_token");
        Ok(())
    }

    fn request_authorization(&self, provisional: bool) -> Result<()> {
        self.record(if provisional {
            "request_provisional_authorization"
        } else {
            "request_authorization"
        });
        Ok(())
    }

    fn clear_badge(&self) -> Result<()> {
        self.record("clear_badge");
        Ok(())
    }

    fn dismiss_notifications(&self) -> Result<()> {
        self.record("dismiss_notifications");
        Ok(())
    }

    fn set_notification_types(&self, platform: PushPlatform, types: u32) -> Result<()> {
        let key = match platform {
            PushPlatform::Ios => "ios",
            PushPlatform::Android => "android",
        };
        self.record("set_notification_types")
            .notification_types
            .insert(key, types);
        Ok(())
    }
}

impl UserSdk for StubSdk {
    fn installation_id(&self) -> Option<String> {
        self.state().installation_id.clone()
    }

    fn language(&self) -> Option<String> {
        self.state().language.clone()
    }

    fn region(&self) -> Option<String> {
        self.state().region.clone()
    }

    fn identifier(&self) -> Option<String> {
        self.state().identifier.clone()
    }

    fn apply_edits(&self, operations: Vec<UserDataOperation>) -> Result<()> {
        let mut state = self.record("apply_edits");
        for operation in operations {
            match operation {
                UserDataOperation::SetLanguage(language) => state.language = language,
                UserDataOperation::SetRegion(region) => state.region = region,
                UserDataOperation::SetIdentifier(identifier) => state.identifier = identifier,
                UserDataOperation::AddTag { collection, tag } => {
                    state.tags.entry(collection).or_default().insert(tag);
                }
                UserDataOperation::RemoveTag { collection, tag } => {
                    if let Some(tags) = state.tags.get_mut(&collection) {
                        tags.remove(&tag);
                    }
                }
                UserDataOperation::ClearTags => state.tags.clear(),
                UserDataOperation::ClearTagCollection(collection) => {
                    state.tags.remove(&collection);
                }
                other => {
                    if let Err(other) = edit_attributes(&mut state.attributes, other) {
                        debug!(operation = ?other, "installation data ignores profile-only edit");
                    }
                }
            }
        }
        Ok(())
    }

    fn track_event(&self, event: TrackedEvent) -> Result<()> {
        self.record("track_event").events.push(event);
        Ok(())
    }

    fn track_transaction(&self, amount: f64, data: Option<Map<String, Value>>) -> Result<()> {
        self.record("track_transaction").transactions.push((amount, data));
        Ok(())
    }

    fn track_location(&self, location: Location) -> Result<()> {
        self.record("track_location").locations.push(location);
        Ok(())
    }

    fn print_debug_information(&self) {
        let state = self.record("print_debug_information");
        info!(
            installation_id = ?state.installation_id,
            identifier = ?state.identifier,
            attributes = state.attributes.len(),
            tag_collections = state.tags.len(),
            "stub SDK user data"
        );
    }

    fn fetch_attributes(&self, done: SdkCallback<BTreeMap<String, UserAttribute>>) {
        let outcome = match self.fetch_failure() {
            Some(err) => Err(err),
            None => Ok(self.record("fetch_attributes").attributes.clone()),
        };
        done(outcome);
    }

    fn fetch_tag_collections(&self, done: SdkCallback<BTreeMap<String, Vec<String>>>) {
        let outcome = match self.fetch_failure() {
            Some(err) => Err(err),
            None => Ok(self
                .record("fetch_tag_collections")
                .tags
                .iter()
                .map(|(collection, tags)| (collection.clone(), tags.iter().cloned().collect()))
                .collect()),
        };
        done(outcome);
    }
}

impl ProfileSdk for StubSdk {
    fn identify(&self, custom_user_id: Option<String>) -> Result<()> {
        self.record("identify").custom_user_id = custom_user_id;
        Ok(())
    }

    fn apply_profile_edits(&self, operations: Vec<UserDataOperation>) -> Result<()> {
        let mut state = self.record("apply_profile_edits");
        let profile = &mut state.profile;
        for operation in operations {
            match operation {
                UserDataOperation::SetLanguage(language) => profile.language = language,
                UserDataOperation::SetRegion(region) => profile.region = region,
                UserDataOperation::SetEmailAddress(email) => profile.email = email,
                UserDataOperation::SetEmailMarketingSubscription(consent) => {
                    profile.email_marketing = Some(consent);
                }
                other => {
                    if let Err(other) = edit_attributes(&mut profile.attributes, other) {
                        return Err(BridgeError::invalid_parameter(format!(
                            "profiles do not support {other:?}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn track_profile_event(&self, event: TrackedEvent) -> Result<()> {
        self.record("track_profile_event").profile.events.push(event);
        Ok(())
    }

    fn track_profile_location(&self, location: Location) -> Result<()> {
        self.record("track_profile_location").profile.locations.push(location);
        Ok(())
    }
}

/// Apply an attribute edit. Any other operation is handed back.
fn edit_attributes(
    attributes: &mut BTreeMap<String, UserAttribute>,
    operation: UserDataOperation,
) -> std::result::Result<(), UserDataOperation> {
    match operation {
        UserDataOperation::SetAttribute { key, value } => {
            attributes.insert(key, value);
        }
        UserDataOperation::RemoveAttribute(key) => {
            attributes.remove(&key);
        }
        UserDataOperation::ClearAttributes => attributes.clear(),
        UserDataOperation::AddToArray { key, values } => {
            let entry = attributes
                .entry(key)
                .or_insert_with(|| UserAttribute::Array(Vec::new()));
            match entry {
                UserAttribute::Array(items) => {
                    for value in values {
                        if !items.contains(&value) {
                            items.push(value);
                        }
                    }
                }
                other => *other = UserAttribute::Array(values),
            }
        }
        UserDataOperation::RemoveFromArray { key, values } => {
            if let Some(UserAttribute::Array(items)) = attributes.get_mut(&key) {
                items.retain(|item| !values.contains(item));
            }
        }
        other => return Err(other),
    }
    Ok(())
}

impl InboxSdk for StubSdk {
    fn create_fetcher(
        &self,
        owner: FetcherOwner,
        options: FetcherOptions,
    ) -> Result<Box<dyn InboxFetcher>> {
        if let FetcherOwner::User { identifier, auth_key } = &owner {
            if identifier.is_empty() || auth_key.is_empty() {
                return Err(BridgeError::invalid_parameter(
                    "user fetchers need a non-empty user identifier and auth key",
                ));
            }
        }
        self.record("create_fetcher");
        debug!(?owner, ?options, "stub inbox fetcher created");
        Ok(Box::new(StubFetcher {
            sdk: self.clone(),
            options,
            fetched: Mutex::new(Vec::new()),
        }))
    }
}

impl MessagingSdk for StubSdk {
    fn set_do_not_disturb(&self, enabled: bool) -> Result<()> {
        self.record("set_do_not_disturb").do_not_disturb = enabled;
        Ok(())
    }

    fn show_pending_message(&self) -> Result<Option<PendingMessage>> {
        Ok(self.record("show_pending_message").pending_message.take())
    }
}

/// Paginated reader over the stub's shared inbox.
struct StubFetcher {
    sdk: StubSdk,
    options: FetcherOptions,
    fetched: Mutex<Vec<InboxNotification>>,
}

impl StubFetcher {
    fn fetched(&self) -> MutexGuard<'_, Vec<InboxNotification>> {
        self.fetched.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append the next page after `fetched` and describe it.
    fn next_page(&self, restart: bool) -> Result<InboxPage> {
        if let Some(err) = self.sdk.fetch_failure() {
            return Err(err);
        }

        let inbox = self.sdk.inbox.lock().unwrap_or_else(|p| p.into_inner());
        let limit = self
            .options
            .limit
            .map_or(inbox.len(), |l| (l as usize).min(inbox.len()));
        let page_size = self
            .options
            .max_page_size
            .map_or(DEFAULT_PAGE_SIZE, |s| s as usize);

        let mut fetched = self.fetched();
        if restart {
            fetched.clear();
        }
        let start = fetched.len();
        let end = (start + page_size).min(limit);
        let page: Vec<InboxNotification> = inbox[start.min(end)..end].to_vec();
        fetched.extend(page.iter().cloned());

        Ok(InboxPage {
            found_new: restart.then_some(!page.is_empty()),
            end_reached: end >= limit,
            notifications: page,
        })
    }

    fn update(&self, identifier: &str, apply: impl Fn(&mut InboxNotification)) -> bool {
        {
            let mut fetched = self.fetched();
            let Some(local) = fetched.iter_mut().find(|n| n.identifier == identifier) else {
                return false;
            };
            apply(local);
        }

        let mut inbox = self.sdk.inbox.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(shared) = inbox.iter_mut().find(|n| n.identifier == identifier) {
            apply(shared);
        }
        true
    }
}

impl InboxFetcher for StubFetcher {
    fn fetch_new_notifications(&self, done: SdkCallback<InboxPage>) {
        done(self.next_page(true));
    }

    fn fetch_next_page(&self, done: SdkCallback<InboxPage>) {
        done(self.next_page(false));
    }

    fn fetched_notifications(&self) -> Vec<InboxNotification> {
        self.fetched().clone()
    }

    fn mark_as_read(&self, identifier: &str) -> bool {
        self.update(identifier, |n| n.is_unread = false)
    }

    fn mark_all_as_read(&self) {
        let identifiers: Vec<String> =
            self.fetched().iter().map(|n| n.identifier.clone()).collect();
        for identifier in identifiers {
            self.mark_as_read(&identifier);
        }
    }

    fn mark_as_deleted(&self, identifier: &str) -> bool {
        self.update(identifier, |n| n.is_deleted = true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pushbridge_core::types::NotificationSource;

    fn notification(id: &str) -> InboxNotification {
        InboxNotification {
            identifier: id.into(),
            title: Some(format!("title {id}")),
            body: format!("body {id}"),
            is_unread: true,
            is_deleted: false,
            date: Utc::now(),
            source: NotificationSource::Campaign,
            payload: Map::new(),
        }
    }

    fn page(fetcher: &dyn InboxFetcher, restart: bool) -> InboxPage {
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        let done: SdkCallback<InboxPage> = Box::new(move |r| *sink.lock().expect("lock") = Some(r));
        if restart {
            fetcher.fetch_new_notifications(done);
        } else {
            fetcher.fetch_next_page(done);
        }
        let outcome = slot.lock().expect("lock").take().expect("answered synchronously");
        outcome.expect("fetch succeeds")
    }

    #[test]
    fn edits_update_user_data() {
        let sdk = StubSdk::new();
        sdk.apply_edits(vec![
            UserDataOperation::SetLanguage(Some("fr".into())),
            UserDataOperation::AddTag { collection: "c".into(), tag: "t".into() },
            UserDataOperation::SetAttribute {
                key: "age".into(),
                value: UserAttribute::Integer(30),
            },
        ])
        .expect("edit");

        assert_eq!(sdk.language(), Some("fr".into()));
        let state = sdk.state();
        assert!(state.tags["c"].contains("t"));
        assert_eq!(state.attributes["age"], UserAttribute::Integer(30));
    }

    #[test]
    fn array_edits_merge_and_remove_items() {
        let sdk = StubSdk::new();
        sdk.apply_profile_edits(vec![
            UserDataOperation::AddToArray { key: "colors".into(), values: vec!["red".into()] },
            UserDataOperation::AddToArray {
                key: "colors".into(),
                values: vec!["red".into(), "blue".into()],
            },
            UserDataOperation::RemoveFromArray { key: "colors".into(), values: vec!["red".into()] },
            UserDataOperation::SetEmailMarketingSubscription(EmailSubscription::Subscribed),
        ])
        .expect("profile edit");

        let state = sdk.state();
        assert_eq!(state.profile.attributes["colors"], UserAttribute::Array(vec!["blue".into()]));
        assert_eq!(state.profile.email_marketing, Some(EmailSubscription::Subscribed));
        assert!(state.attributes.is_empty());
    }

    #[test]
    fn profile_rejects_installation_only_edits() {
        let sdk = StubSdk::new();
        let err = sdk
            .apply_profile_edits(vec![UserDataOperation::ClearTags])
            .expect_err("tags are installation data");
        assert_eq!(err.kind(), "InvalidParameters");
    }

    #[test]
    fn fetcher_pages_through_inbox() {
        let sdk = StubSdk::new();
        sdk.seed_inbox((0..5).map(|i| notification(&format!("n{i}"))).collect());
        let fetcher = sdk
            .create_fetcher(
                FetcherOwner::Installation,
                FetcherOptions { max_page_size: Some(2), limit: Some(4) },
            )
            .expect("fetcher");

        let first = page(fetcher.as_ref(), true);
        assert_eq!(first.found_new, Some(true));
        assert_eq!(first.notifications.len(), 2);
        assert!(!first.end_reached);

        let second = page(fetcher.as_ref(), false);
        assert_eq!(second.found_new, None);
        assert!(second.end_reached);
        assert_eq!(fetcher.fetched_notifications().len(), 4);
    }

    #[test]
    fn mark_as_read_only_touches_fetched_notifications() {
        let sdk = StubSdk::new();
        sdk.seed_inbox(vec![notification("a"), notification("b")]);
        let fetcher = sdk
            .create_fetcher(FetcherOwner::Installation, FetcherOptions::default())
            .expect("fetcher");

        assert!(!fetcher.mark_as_read("a"));
        page(fetcher.as_ref(), true);
        assert!(fetcher.mark_as_read("a"));
        assert!(!fetcher.fetched_notifications()[0].is_unread);
        assert!(!fetcher.mark_as_deleted("zzz"));
    }

    #[test]
    fn call_log_keeps_only_recent_entries() {
        let sdk = StubSdk::new();
        for _ in 0..RECORDED_CALLS {
            sdk.clear_badge().expect("badge");
        }
        sdk.refresh_token().expect("refresh");

        let state = sdk.state();
        assert_eq!(state.calls.len(), RECORDED_CALLS);
        assert_eq!(state.calls.back().map(String::as_str), Some("refresh_token"));
    }

    #[test]
    fn user_fetcher_requires_credentials() {
        let sdk = StubSdk::new();
        let owner = FetcherOwner::User { identifier: String::new(), auth_key: "k".into() };
        assert!(sdk.create_fetcher(owner, FetcherOptions::default()).is_err());
    }
}
