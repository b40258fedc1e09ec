// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the native push SDK.
//
// The bridge never talks to a concrete SDK. Action handlers receive plain data
// back from these traits; platforms plug in their own implementation, and the
// stub module provides an in-memory one for desktop and CI builds.

use std::collections::BTreeMap;

use pushbridge_core::error::Result;
use pushbridge_core::types::{
    FetcherOptions, FetcherOwner, InboxNotification, InboxPage, Location, PendingMessage,
    PushPlatform, SdkConfig, TrackedEvent, UserAttribute, UserDataOperation,
};
use serde_json::{Map, Value};

/// One-shot continuation for SDK calls that complete asynchronously.
pub type SdkCallback<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// Unified SDK surface that groups every capability the bridge calls into.
pub trait NativeSdk:
    CoreSdk + PushSdk + UserSdk + ProfileSdk + InboxSdk + MessagingSdk + Send + Sync
{
    /// Human-readable platform name (e.g. "iOS 17", "Android 14").
    fn platform_name(&self) -> &str;
}

/// SDK lifecycle and privacy switches.
pub trait CoreSdk {
    fn set_config(&self, config: SdkConfig) -> Result<()>;

    /// Start the SDK. Once this returns the bridge is considered ready.
    fn start(&self) -> Result<()>;

    fn opt_in(&self) -> Result<()>;

    /// Opt out of all tracking, optionally wiping data already collected.
    fn opt_out(&self, wipe_data: bool) -> Result<()>;
}

/// Push registration and token access.
pub trait PushSdk {
    /// Last push token the SDK saw, if any.
    fn last_known_push_token(&self) -> Option<String>;

    fn register_for_remote_notifications(&self) -> Result<()>;

    fn refresh_token(&self) -> Result<()>;

    /// Ask the user for notification permission. Provisional authorization
    /// delivers quietly without prompting.
    fn request_authorization(&self, provisional: bool) -> Result<()>;

    fn clear_badge(&self) -> Result<()>;

    fn dismiss_notifications(&self) -> Result<()>;

    /// Set the platform's notification-type bit mask.
    fn set_notification_types(&self, platform: PushPlatform, types: u32) -> Result<()>;
}

/// User data, tracking and attribute reads.
pub trait UserSdk {
    fn installation_id(&self) -> Option<String>;

    fn language(&self) -> Option<String>;

    fn region(&self) -> Option<String>;

    fn identifier(&self) -> Option<String>;

    /// Apply a batch of edits atomically.
    fn apply_edits(&self, operations: Vec<UserDataOperation>) -> Result<()>;

    fn track_event(&self, event: TrackedEvent) -> Result<()>;

    fn track_transaction(&self, amount: f64, data: Option<Map<String, Value>>) -> Result<()>;

    fn track_location(&self, location: Location) -> Result<()>;

    /// Dump the SDK's user data to its own log.
    fn print_debug_information(&self);

    fn fetch_attributes(&self, done: SdkCallback<BTreeMap<String, UserAttribute>>);

    fn fetch_tag_collections(&self, done: SdkCallback<BTreeMap<String, Vec<String>>>);
}

/// Profile identity and data, shared across the installations of one user.
pub trait ProfileSdk {
    /// Attach this installation to the profile with this custom user ID.
    /// `None` logs out of the current profile.
    fn identify(&self, custom_user_id: Option<String>) -> Result<()>;

    fn apply_profile_edits(&self, operations: Vec<UserDataOperation>) -> Result<()>;

    fn track_profile_event(&self, event: TrackedEvent) -> Result<()>;

    fn track_profile_location(&self, location: Location) -> Result<()>;
}

/// Inbox fetcher factory.
pub trait InboxSdk {
    fn create_fetcher(
        &self,
        owner: FetcherOwner,
        options: FetcherOptions,
    ) -> Result<Box<dyn InboxFetcher>>;
}

/// A stateful, paginated reader over one inbox.
pub trait InboxFetcher: Send + Sync {
    /// Restart from the newest notification.
    fn fetch_new_notifications(&self, done: SdkCallback<InboxPage>);

    fn fetch_next_page(&self, done: SdkCallback<InboxPage>);

    /// Every notification fetched so far, newest first.
    fn fetched_notifications(&self) -> Vec<InboxNotification>;

    /// Returns false when no fetched notification has this identifier.
    fn mark_as_read(&self, identifier: &str) -> bool;

    fn mark_all_as_read(&self);

    /// Returns false when no fetched notification has this identifier.
    fn mark_as_deleted(&self, identifier: &str) -> bool;
}

/// In-app messaging.
pub trait MessagingSdk {
    fn set_do_not_disturb(&self, enabled: bool) -> Result<()>;

    /// Show the message held back while do-not-disturb was on.
    /// Returns the message shown, or `None` if nothing was pending.
    fn show_pending_message(&self) -> Result<Option<PendingMessage>>;
}
