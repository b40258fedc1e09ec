// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `inbox.*` actions.
//
// Fetchers are stateful, so the bridge keeps them alive under a random
// identifier until the scripting side releases them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use pushbridge_core::error::{BridgeError, Result};
use pushbridge_core::types::{FetcherId, FetcherOptions, FetcherOwner, InboxPage};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::dispatch::{ActionContext, ActionResult, DispatcherBuilder};
use crate::legacy::StructuredPromise;
use crate::params::Parameters;
use crate::traits::{InboxFetcher, InboxSdk, NativeSdk, SdkCallback};

pub const CREATE_INSTALLATION_FETCHER: &str = "inbox.createInstallationFetcher";
pub const CREATE_USER_FETCHER: &str = "inbox.createUserFetcher";
pub const RELEASE_FETCHER: &str = "inbox.releaseFetcher";
pub const FETCH_NEW_NOTIFICATIONS: &str = "inbox.fetcher.fetchNewNotifications";
pub const FETCH_NEXT_PAGE: &str = "inbox.fetcher.fetchNextPage";
pub const GET_FETCHED_NOTIFICATIONS: &str = "inbox.fetcher.getFetchedNotifications";
pub const MARK_AS_READ: &str = "inbox.fetcher.markAsRead";
pub const MARK_ALL_AS_READ: &str = "inbox.fetcher.markAllAsRead";
pub const MARK_AS_DELETED: &str = "inbox.fetcher.markAsDeleted";

/// Live fetchers keyed by the identifier handed to the scripting side.
#[derive(Default)]
pub struct FetcherRegistry {
    fetchers: Mutex<HashMap<FetcherId, Arc<dyn InboxFetcher>>>,
}

impl FetcherRegistry {
    fn fetchers(&self) -> MutexGuard<'_, HashMap<FetcherId, Arc<dyn InboxFetcher>>> {
        self.fetchers.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn insert(&self, fetcher: Arc<dyn InboxFetcher>) -> FetcherId {
        let id = FetcherId::new();
        self.fetchers().insert(id, fetcher);
        id
    }

    pub fn release(&self, id: &FetcherId) -> bool {
        self.fetchers().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.fetchers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the `fetcherID` parameter to a live fetcher.
    fn lookup(&self, p: &Parameters) -> Result<Arc<dyn InboxFetcher>> {
        let raw: String = p.required("fetcherID")?;
        FetcherId::parse(&raw)
            .and_then(|id| self.fetchers().get(&id).cloned())
            .ok_or_else(|| {
                BridgeError::invalid_parameter(format!(
                    "no inbox fetcher '{raw}': it was released or never created"
                ))
            })
    }
}

/// Positive paging options only; anything else keeps the SDK default.
fn fetcher_options(p: &Parameters) -> FetcherOptions {
    let positive = |key: &str| {
        p.optional::<i64>(key)
            .filter(|v| *v > 0)
            .and_then(|v| u32::try_from(v).ok())
    };
    FetcherOptions {
        max_page_size: positive("maxPageSize"),
        limit: positive("limit"),
    }
}

fn page_value(page: InboxPage) -> Result<Value> {
    Ok(serde_json::to_value(page)?)
}

/// Run one page fetch and adapt its callback to a promise.
fn fetch_page(
    fetcher: Arc<dyn InboxFetcher>,
    start: fn(&dyn InboxFetcher, SdkCallback<InboxPage>),
) -> StructuredPromise {
    StructuredPromise::deferred(|promise| {
        start(
            fetcher.as_ref(),
            Box::new(move |outcome| promise.settle(outcome.and_then(page_value))),
        );
    })
}

pub(crate) fn register(builder: &mut DispatcherBuilder, sdk: &Arc<dyn NativeSdk>) -> Result<()> {
    let registry = Arc::new(FetcherRegistry::default());

    let s = Arc::clone(sdk);
    let r = Arc::clone(&registry);
    builder.register(CREATE_INSTALLATION_FETCHER, move |p: &Parameters, _: &ActionContext| {
        let fetcher = s.create_fetcher(FetcherOwner::Installation, fetcher_options(p))?;
        let id = r.insert(Arc::from(fetcher));
        debug!(%id, "installation inbox fetcher created");
        Ok(ActionResult::Value(Value::String(id.to_string())))
    })?;

    let s = Arc::clone(sdk);
    let r = Arc::clone(&registry);
    builder.register(CREATE_USER_FETCHER, move |p: &Parameters, _: &ActionContext| {
        let owner = FetcherOwner::User {
            identifier: p.required("user")?,
            auth_key: p.required("authKey")?,
        };
        let fetcher = s.create_fetcher(owner, fetcher_options(p))?;
        let id = r.insert(Arc::from(fetcher));
        debug!(%id, "user inbox fetcher created");
        Ok(ActionResult::Value(Value::String(id.to_string())))
    })?;

    let r = Arc::clone(&registry);
    builder.register(RELEASE_FETCHER, move |p: &Parameters, _: &ActionContext| {
        let raw: String = p.required("fetcherID")?;
        let released = FetcherId::parse(&raw).is_some_and(|id| r.release(&id));
        if !released {
            debug!(fetcher = %raw, "release of unknown inbox fetcher ignored");
        }
        Ok(ActionResult::Ack)
    })?;

    let r = Arc::clone(&registry);
    builder.register(FETCH_NEW_NOTIFICATIONS, move |p: &Parameters, _: &ActionContext| {
        Ok(ActionResult::Pending(fetch_page(r.lookup(p)?, |f, done| {
            f.fetch_new_notifications(done)
        })))
    })?;

    let r = Arc::clone(&registry);
    builder.register(FETCH_NEXT_PAGE, move |p: &Parameters, _: &ActionContext| {
        Ok(ActionResult::Pending(fetch_page(r.lookup(p)?, |f, done| {
            f.fetch_next_page(done)
        })))
    })?;

    let r = Arc::clone(&registry);
    builder.register(GET_FETCHED_NOTIFICATIONS, move |p: &Parameters, _: &ActionContext| {
        let notifications = r.lookup(p)?.fetched_notifications();
        Ok(ActionResult::Value(json!({
            "notifications": serde_json::to_value(notifications)?,
        })))
    })?;

    let r = Arc::clone(&registry);
    builder.register(MARK_AS_READ, move |p: &Parameters, _: &ActionContext| {
        let fetcher = r.lookup(p)?;
        let id: String = p.required("notifID")?;
        if !fetcher.mark_as_read(&id) {
            warn!(notification = %id, "cannot mark unknown inbox notification as read");
        }
        Ok(ActionResult::Ack)
    })?;

    let r = Arc::clone(&registry);
    builder.register(MARK_ALL_AS_READ, move |p: &Parameters, _: &ActionContext| {
        r.lookup(p)?.mark_all_as_read();
        Ok(ActionResult::Ack)
    })?;

    let r = Arc::clone(&registry);
    builder.register(MARK_AS_DELETED, move |p: &Parameters, _: &ActionContext| {
        let fetcher = r.lookup(p)?;
        let id: String = p.required("notifID")?;
        if !fetcher.mark_as_deleted(&id) {
            warn!(notification = %id, "cannot delete unknown inbox notification");
        }
        Ok(ActionResult::Ack)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::Harness;
    use chrono::{TimeZone, Utc};
    use pushbridge_core::types::{InboxNotification, NotificationSource};
    use serde_json::Map;

    fn seeded(count: usize) -> Harness {
        let h = Harness::new();
        let notifications = (0..count)
            .map(|i| InboxNotification {
                identifier: format!("n{i}"),
                title: None,
                body: format!("body {i}"),
                is_unread: true,
                is_deleted: false,
                date: Utc.timestamp_millis_opt(1_000 * i as i64).single().expect("date"),
                source: NotificationSource::Transactional,
                payload: Map::new(),
            })
            .collect();
        h.sdk.seed_inbox(notifications);
        h
    }

    fn fetcher_id(h: &Harness, parameters: Value) -> String {
        let id = h.call(CREATE_INSTALLATION_FETCHER, parameters).expect("fetcher");
        id.as_str().expect("string id").to_owned()
    }

    #[test]
    fn fetch_pages_through_the_inbox() {
        let h = seeded(3);
        let id = fetcher_id(&h, json!({ "maxPageSize": 2 }));

        let first = h
            .call(FETCH_NEW_NOTIFICATIONS, json!({ "fetcherID": id }))
            .expect("first page");
        assert_eq!(first["foundNew"], true);
        assert_eq!(first["endReached"], false);
        assert_eq!(first["notifications"].as_array().map(Vec::len), Some(2));
        assert_eq!(first["notifications"][0]["id"], "n0");
        assert_eq!(first["notifications"][0]["source"], 2);

        let second = h
            .call(FETCH_NEXT_PAGE, json!({ "fetcherID": id }))
            .expect("second page");
        assert!(second.get("foundNew").is_none());
        assert_eq!(second["endReached"], true);

        let all = h
            .call(GET_FETCHED_NOTIFICATIONS, json!({ "fetcherID": id }))
            .expect("fetched");
        assert_eq!(all["notifications"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn non_positive_options_are_ignored() {
        let h = seeded(25);
        let id = fetcher_id(&h, json!({ "maxPageSize": 0, "limit": -5 }));
        let page = h
            .call(FETCH_NEW_NOTIFICATIONS, json!({ "fetcherID": id }))
            .expect("page");
        assert_eq!(page["notifications"].as_array().map(Vec::len), Some(20));
    }

    #[test]
    fn mark_as_read_updates_fetched_notifications() {
        let h = seeded(2);
        let id = fetcher_id(&h, json!({}));
        h.call(FETCH_NEW_NOTIFICATIONS, json!({ "fetcherID": id })).expect("page");

        h.call(MARK_AS_READ, json!({ "fetcherID": id, "notifID": "n1" })).expect("read");
        h.call(MARK_AS_READ, json!({ "fetcherID": id, "notifID": "missing" }))
            .expect("unknown notification is not an error");
        h.call(MARK_AS_DELETED, json!({ "fetcherID": id, "notifID": "n0" })).expect("deleted");

        let all = h
            .call(GET_FETCHED_NOTIFICATIONS, json!({ "fetcherID": id }))
            .expect("fetched");
        assert_eq!(all["notifications"][1]["isUnread"], false);
        assert_eq!(all["notifications"][0]["isDeleted"], true);

        h.call(MARK_ALL_AS_READ, json!({ "fetcherID": id })).expect("all read");
        let all = h
            .call(GET_FETCHED_NOTIFICATIONS, json!({ "fetcherID": id }))
            .expect("fetched");
        assert_eq!(all["notifications"][0]["isUnread"], false);
    }

    #[test]
    fn released_fetcher_is_invalid() {
        let h = seeded(1);
        let id = fetcher_id(&h, json!({}));
        h.call(RELEASE_FETCHER, json!({ "fetcherID": id })).expect("released");

        let err = h
            .call(FETCH_NEXT_PAGE, json!({ "fetcherID": id }))
            .expect_err("released");
        assert_eq!(err.kind(), "InvalidParameters");
        assert!(err.to_string().contains("released or never created"));

        let err = h
            .call(MARK_ALL_AS_READ, json!({ "fetcherID": "not-a-uuid" }))
            .expect_err("garbage id");
        assert_eq!(err.kind(), "InvalidParameters");
    }

    #[test]
    fn user_fetcher_needs_credentials() {
        let h = seeded(1);
        let err = h
            .call(CREATE_USER_FETCHER, json!({ "user": "ada" }))
            .expect_err("auth key");
        assert!(err.to_string().contains("authKey"));

        let id = h
            .call(CREATE_USER_FETCHER, json!({ "user": "ada", "authKey": "secret" }))
            .expect("fetcher");
        assert!(FetcherId::parse(id.as_str().expect("string")).is_some());
    }

    #[test]
    fn fetch_failure_rejects_the_page_promise() {
        let h = seeded(1);
        let id = fetcher_id(&h, json!({}));
        h.sdk.state().fetch_failure = Some("network down".into());
        let err = h
            .call(FETCH_NEW_NOTIFICATIONS, json!({ "fetcherID": id }))
            .expect_err("fetch fails");
        assert_eq!(err.kind(), "CollaboratorFailure");
    }

    #[test]
    fn registry_tracks_live_fetchers() {
        let h = seeded(0);
        let registry = FetcherRegistry::default();
        let fetcher = h
            .sdk
            .create_fetcher(FetcherOwner::Installation, FetcherOptions::default())
            .expect("fetcher");
        let id = registry.insert(Arc::from(fetcher));
        assert_eq!(registry.len(), 1);
        assert!(registry.release(&id));
        assert!(!registry.release(&id));
        assert!(registry.is_empty());
    }
}
