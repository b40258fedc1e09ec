// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `profile.*` actions: identity, profile data edits and profile tracking.
//
// Profile edits share the record format of `user.edit` but accept a
// different set of operations, and attribute keys and values are checked
// before anything reaches the SDK.

use std::sync::Arc;

use pushbridge_core::error::{BridgeError, Result};
use pushbridge_core::types::{
    EmailSubscription, EventData, EventPayload, TrackedEvent, UserAttribute, UserDataOperation,
};
use serde_json::{Map, Value};

use super::user::{parse_attributes, parse_location, parse_operation, parse_operations};
use crate::dispatch::{ActionContext, ActionResult, DispatcherBuilder};
use crate::params::{Parameters, optional_in, required_in};
use crate::traits::{NativeSdk, ProfileSdk};

pub const IDENTIFY: &str = "profile.identify";
pub const EDIT: &str = "profile.edit";
pub const TRACK_EVENT: &str = "profile.track.event";
pub const TRACK_LOCATION: &str = "profile.track.location";

const CUSTOM_USER_ID_MAX_LENGTH: usize = 1024;
const ATTRIBUTE_KEY_MAX_LENGTH: usize = 30;
const ATTRIBUTE_STRING_MAX_LENGTH: usize = 64;

/// Event data keys lifted out of the attribute map.
const LABEL_KEY: &str = "$label";
const TAGS_KEY: &str = "$tags";

/// `custom_user_id` must be present: a string identifies, `null` logs out.
fn custom_user_id(p: &Parameters) -> Result<Option<String>> {
    match p.get("custom_user_id") {
        Some(Value::String(id)) if id.chars().count() > CUSTOM_USER_ID_MAX_LENGTH => {
            Err(BridgeError::invalid_parameter(format!(
                "custom_user_id longer than {CUSTOM_USER_ID_MAX_LENGTH} characters"
            )))
        }
        Some(Value::String(id)) => Ok(Some(id.clone())),
        Some(Value::Null) => Ok(None),
        Some(_) => Err(BridgeError::invalid_parameter(
            "custom_user_id must be a string, or null to log out",
        )),
        None => Err(BridgeError::invalid_parameter(
            "required parameter 'custom_user_id' missing; pass null to log out",
        )),
    }
}

fn attribute_key(record: &Map<String, Value>) -> Result<String> {
    let key: String = required_in(record, "key")?;
    let valid = (1..=ATTRIBUTE_KEY_MAX_LENGTH).contains(&key.len())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(BridgeError::invalid_parameter(format!(
            "invalid attribute key '{key}': use 1 to {ATTRIBUTE_KEY_MAX_LENGTH} of a-z, A-Z, 0-9 and _"
        )));
    }
    Ok(key)
}

fn bounded_string(item: &str) -> Result<()> {
    if item.is_empty() || item.chars().count() > ATTRIBUTE_STRING_MAX_LENGTH {
        return Err(BridgeError::invalid_parameter(format!(
            "string values must hold 1 to {ATTRIBUTE_STRING_MAX_LENGTH} characters"
        )));
    }
    Ok(())
}

/// `value` as one string or a non-empty list of strings.
fn array_items(record: &Map<String, Value>) -> Result<Vec<String>> {
    let items = match required_in::<Value>(record, "value")? {
        Value::String(item) => vec![item],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(item) => Ok(item),
                _ => Err(BridgeError::invalid_parameter("array items must be strings")),
            })
            .collect::<Result<Vec<_>>>()?,
        _ => {
            return Err(BridgeError::invalid_parameter(
                "value must be a string or an array of strings",
            ));
        }
    };
    if items.is_empty() {
        return Err(BridgeError::invalid_parameter("array value must not be empty"));
    }
    items.iter().try_for_each(|item| bounded_string(item))?;
    Ok(items)
}

fn parse_profile_operation(record: &Map<String, Value>) -> Result<UserDataOperation> {
    let operation: String = required_in(record, "operation")?;
    let op = match operation.as_str() {
        "SET_LANGUAGE" | "SET_REGION" => parse_operation(record)?,
        "SET_ATTRIBUTE" => {
            attribute_key(record)?;
            let op = parse_operation(record)?;
            match &op {
                UserDataOperation::SetAttribute {
                    value: UserAttribute::String(s),
                    ..
                } => bounded_string(s)?,
                UserDataOperation::SetAttribute {
                    value: UserAttribute::Array(items),
                    ..
                } => {
                    if items.is_empty() {
                        return Err(BridgeError::invalid_parameter("array value must not be empty"));
                    }
                    items.iter().try_for_each(|item| bounded_string(item))?;
                }
                _ => {}
            }
            op
        }
        "REMOVE_ATTRIBUTE" => UserDataOperation::RemoveAttribute(attribute_key(record)?),
        "SET_EMAIL_ADDRESS" => UserDataOperation::SetEmailAddress(optional_in(record, "value")),
        "SET_EMAIL_MARKETING_SUBSCRIPTION" => {
            let state: String = required_in(record, "value")?;
            UserDataOperation::SetEmailMarketingSubscription(
                EmailSubscription::parse(&state).ok_or_else(|| {
                    BridgeError::invalid_parameter(format!(
                        "email marketing subscription must be 'subscribed' or 'unsubscribed', got '{state}'"
                    ))
                })?,
            )
        }
        "ADD_TO_ARRAY" => UserDataOperation::AddToArray {
            key: attribute_key(record)?,
            values: array_items(record)?,
        },
        "REMOVE_FROM_ARRAY" => UserDataOperation::RemoveFromArray {
            key: attribute_key(record)?,
            values: array_items(record)?,
        },
        other => {
            return Err(BridgeError::invalid_parameter(format!(
                "unknown profile data operation '{other}'"
            )));
        }
    };
    Ok(op)
}

/// Build a profile event. `event_data` is a flat `{key: {type, value}}` map
/// where `$label` and `$tags` carry the label and tags.
fn profile_event(p: &Parameters) -> Result<TrackedEvent> {
    let name: String = p.required("name")?;
    let Some(raw) = p.optional::<Map<String, Value>>("event_data") else {
        return Ok(TrackedEvent {
            name,
            label: None,
            payload: EventPayload::None,
        });
    };

    let mut attributes = parse_attributes(&raw)?;
    let label = match attributes.remove(LABEL_KEY) {
        Some(UserAttribute::String(label)) => Some(label),
        Some(_) => return Err(BridgeError::invalid_parameter("'$label' must be a string")),
        None => None,
    };
    let tags = match attributes.remove(TAGS_KEY) {
        Some(UserAttribute::Array(tags)) => tags,
        Some(_) => {
            return Err(BridgeError::invalid_parameter("'$tags' must be a string array"));
        }
        None => Vec::new(),
    };

    Ok(TrackedEvent {
        name,
        label,
        payload: EventPayload::Attributes(EventData { tags, attributes }),
    })
}

pub(crate) fn register(builder: &mut DispatcherBuilder, sdk: &Arc<dyn NativeSdk>) -> Result<()> {
    let s = Arc::clone(sdk);
    builder.register(IDENTIFY, move |p: &Parameters, _: &ActionContext| {
        s.identify(custom_user_id(p)?)?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(EDIT, move |p: &Parameters, _: &ActionContext| {
        s.apply_profile_edits(parse_operations(p, parse_profile_operation)?)?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(TRACK_EVENT, move |p: &Parameters, _: &ActionContext| {
        s.track_profile_event(profile_event(p)?)?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(TRACK_LOCATION, move |p: &Parameters, _: &ActionContext| {
        s.track_profile_location(parse_location(p)?)?;
        Ok(ActionResult::Ack)
    })?;

    Ok(())
}
