// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Domain types exchanged between the action handlers and the native SDK.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Identifier under which the bridge retains an inbox fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetcherId(pub Uuid);

impl FetcherId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the textual form handed back by the scripting side.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for FetcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FetcherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Out-of-band events sent through the callback channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackEvent {
    /// A dispatch failed before the action could run.
    BridgeFailure,
    /// A notification was processed and should reach the scripting side.
    DispatchPush,
    /// An in-app message changed lifecycle state.
    DispatchMessagingEvent,
}

impl CallbackEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BridgeFailure => "onBridgeFailure",
            Self::DispatchPush => "_dispatchPush",
            Self::DispatchMessagingEvent => "_dispatchMessagingEvent",
        }
    }
}

impl std::fmt::Display for CallbackEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration handed to the native SDK by `setConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkConfig {
    pub api_key: String,
    /// Whether the SDK may read the advertising identifier. `None` keeps the
    /// SDK default.
    pub use_advertising_id: Option<bool>,
}

/// Platform a notification-type mask applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPlatform {
    Ios,
    Android,
}

/// A typed user, profile or event attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAttribute {
    Bool(bool),
    Date(DateTime<Utc>),
    String(String),
    Integer(i64),
    Float(f64),
    Url(String),
    /// String array; profile attributes and event attributes only.
    Array(Vec<String>),
    /// Nested attributes; event attributes only.
    Object(BTreeMap<String, UserAttribute>),
    ObjectArray(Vec<BTreeMap<String, UserAttribute>>),
}

impl UserAttribute {
    /// Type code used on the wire.
    pub fn type_code(&self) -> &'static str {
        match self {
            Self::Bool(_) => "b",
            Self::Date(_) => "d",
            Self::String(_) => "s",
            Self::Integer(_) => "i",
            Self::Float(_) => "f",
            Self::Url(_) => "u",
            Self::Array(_) => "sa",
            Self::Object(_) => "o",
            Self::ObjectArray(_) => "oa",
        }
    }

    /// `{"type": ..., "value": ...}` form. Dates become epoch milliseconds;
    /// nested objects keep the same form for every entry.
    pub fn to_bridge_value(&self) -> Value {
        let value = match self {
            Self::Bool(b) => json!(b),
            Self::Date(d) => json!(d.timestamp_millis()),
            Self::String(s) | Self::Url(s) => json!(s),
            Self::Integer(i) => json!(i),
            Self::Float(f) => json!(f),
            Self::Array(items) => json!(items),
            Self::Object(map) => Value::Object(bridge_object(map)),
            Self::ObjectArray(maps) => {
                Value::Array(maps.iter().map(|m| Value::Object(bridge_object(m))).collect())
            }
        };
        json!({ "type": self.type_code(), "value": value })
    }
}

fn bridge_object(map: &BTreeMap<String, UserAttribute>) -> Map<String, Value> {
    map.iter()
        .map(|(key, attribute)| (key.clone(), attribute.to_bridge_value()))
        .collect()
}

/// Email marketing consent set through `profile.edit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSubscription {
    Subscribed,
    Unsubscribed,
}

impl EmailSubscription {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "subscribed" => Some(Self::Subscribed),
            "unsubscribed" => Some(Self::Unsubscribed),
            _ => None,
        }
    }
}

/// A single mutation applied through `user.edit` or `profile.edit`.
#[derive(Debug, Clone, PartialEq)]
pub enum UserDataOperation {
    SetLanguage(Option<String>),
    SetRegion(Option<String>),
    SetIdentifier(Option<String>),
    SetAttribute { key: String, value: UserAttribute },
    RemoveAttribute(String),
    ClearAttributes,
    AddTag { collection: String, tag: String },
    RemoveTag { collection: String, tag: String },
    ClearTags,
    ClearTagCollection(String),
    SetEmailAddress(Option<String>),
    SetEmailMarketingSubscription(EmailSubscription),
    /// Append to a string-array attribute, creating it if absent.
    AddToArray { key: String, values: Vec<String> },
    RemoveFromArray { key: String, values: Vec<String> },
}

/// Tags and typed attributes attached to a tracked event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventData {
    pub tags: Vec<String>,
    pub attributes: BTreeMap<String, UserAttribute>,
}

/// Extra data carried by a tracked event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    Attributes(EventData),
    /// Free-form object used by the older tracking API.
    Legacy(Map<String, Value>),
}

/// Event passed to the SDK by the `user.track.*` and `profile.track.event`
/// actions.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    pub name: String,
    pub label: Option<String>,
    pub payload: EventPayload,
}

/// Location passed to the SDK by `user.track.location`.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub precision: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Which inbox a fetcher reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetcherOwner {
    Installation,
    User { identifier: String, auth_key: String },
}

/// Paging options shared by both fetcher kinds. Non-positive values are
/// dropped before they reach the SDK.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetcherOptions {
    pub max_page_size: Option<u32>,
    pub limit: Option<u32>,
}

/// Why a notification was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSource {
    Unknown,
    Campaign,
    Transactional,
    Trigger,
}

impl NotificationSource {
    pub fn code(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Campaign => 1,
            Self::Transactional => 2,
            Self::Trigger => 3,
        }
    }
}

impl Serialize for NotificationSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// A notification held by an inbox fetcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxNotification {
    #[serde(rename = "id")]
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    pub is_unread: bool,
    pub is_deleted: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub source: NotificationSource,
    pub payload: Map<String, Value>,
}

/// Result of one inbox fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxPage {
    /// Only reported when fetching new notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_new: Option<bool>,
    pub end_reached: bool,
    pub notifications: Vec<InboxNotification>,
}

/// An in-app message waiting to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub identifier: Option<String>,
}
