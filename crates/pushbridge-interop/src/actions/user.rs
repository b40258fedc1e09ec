// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `user.*` actions: identity getters, data edits, tracking and attribute
// reads.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pushbridge_core::error::{BridgeError, Result};
use pushbridge_core::types::{
    EventData, EventPayload, Location, TrackedEvent, UserAttribute, UserDataOperation,
};
use serde_json::{Map, Value};
use tracing::warn;

use crate::dispatch::{ActionContext, ActionResult, DispatcherBuilder};
use crate::legacy::StructuredPromise;
use crate::params::{FromParam, Parameters, optional_in, required_in};
use crate::traits::{NativeSdk, UserSdk};

pub const GET_INSTALLATION_ID: &str = "user.getInstallationID";
pub const GET_LANGUAGE: &str = "user.getLanguage";
pub const GET_REGION: &str = "user.getRegion";
pub const GET_IDENTIFIER: &str = "user.getIdentifier";
pub const EDIT: &str = "user.edit";
pub const TRACK_EVENT: &str = "user.track.event";
pub const TRACK_LEGACY_EVENT: &str = "user.track.legacy_event";
pub const TRACK_TRANSACTION: &str = "user.track.transaction";
pub const TRACK_LOCATION: &str = "user.track.location";
pub const DATA_DEBUG: &str = "user.data.debug";
pub const FETCH_ATTRIBUTES: &str = "user.fetchAttributes";
pub const FETCH_TAGS: &str = "user.fetchTags";

pub(super) fn millis(raw: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(raw)
        .ok_or_else(|| BridgeError::invalid_parameter(format!("date out of range: {raw}")))
}

/// Build a typed attribute from its wire type code.
///
/// Integer, float and boolean values may also arrive as strings. Object
/// codes recurse through [`parse_attributes`].
pub(super) fn typed_attribute(code: &str, value: &Value) -> Result<UserAttribute> {
    let mismatch = || {
        BridgeError::invalid_parameter(format!("attribute value does not match type '{code}'"))
    };
    let attribute = match (code, value) {
        ("s", Value::String(s)) => UserAttribute::String(s.clone()),
        ("b", Value::Bool(b)) => UserAttribute::Bool(*b),
        ("b", Value::String(s)) => UserAttribute::Bool(s.parse().map_err(|_| mismatch())?),
        ("i", Value::String(s)) => UserAttribute::Integer(s.trim().parse().map_err(|_| mismatch())?),
        ("i", other) => UserAttribute::Integer(i64::from_param(other).ok_or_else(mismatch)?),
        ("f", Value::String(s)) => UserAttribute::Float(s.trim().parse().map_err(|_| mismatch())?),
        ("f", other) => UserAttribute::Float(other.as_f64().ok_or_else(mismatch)?),
        ("d", other) => UserAttribute::Date(millis(other.as_i64().ok_or_else(mismatch)?)?),
        ("u", Value::String(s)) => UserAttribute::Url(s.clone()),
        ("sa", Value::Array(items)) => UserAttribute::Array(
            items
                .iter()
                .map(|item| item.as_str().map(str::to_owned))
                .collect::<Option<_>>()
                .ok_or_else(mismatch)?,
        ),
        ("o", Value::Object(map)) => UserAttribute::Object(parse_attributes(map)?),
        ("oa", Value::Array(items)) => UserAttribute::ObjectArray(
            items
                .iter()
                .map(|item| item.as_object().ok_or_else(mismatch).and_then(parse_attributes))
                .collect::<Result<_>>()?,
        ),
        ("s" | "b" | "u" | "sa" | "o" | "oa", _) => return Err(mismatch()),
        (unknown, _) => {
            return Err(BridgeError::invalid_parameter(format!(
                "unknown attribute type '{unknown}'"
            )));
        }
    };
    Ok(attribute)
}

/// Long type names used by `SET_ATTRIBUTE`.
pub(super) fn attribute_code(name: &str) -> Result<&'static str> {
    match name {
        "string" => Ok("s"),
        "date" => Ok("d"),
        "integer" => Ok("i"),
        "float" => Ok("f"),
        "boolean" => Ok("b"),
        "url" => Ok("u"),
        "array" => Ok("sa"),
        other => Err(BridgeError::invalid_parameter(format!(
            "unknown attribute type '{other}'"
        ))),
    }
}

pub(super) fn parse_operation(record: &Map<String, Value>) -> Result<UserDataOperation> {
    let operation: String = required_in(record, "operation")?;
    let op = match operation.as_str() {
        "SET_LANGUAGE" => UserDataOperation::SetLanguage(optional_in(record, "value")),
        "SET_REGION" => UserDataOperation::SetRegion(optional_in(record, "value")),
        "SET_IDENTIFIER" => UserDataOperation::SetIdentifier(optional_in(record, "value")),
        "SET_ATTRIBUTE" => {
            let key: String = required_in(record, "key")?;
            let code = attribute_code(&required_in::<String>(record, "type")?)?;
            let value: Value = required_in(record, "value")?;
            UserDataOperation::SetAttribute {
                key,
                value: typed_attribute(code, &value)?,
            }
        }
        "REMOVE_ATTRIBUTE" => UserDataOperation::RemoveAttribute(required_in(record, "key")?),
        "CLEAR_ATTRIBUTES" => UserDataOperation::ClearAttributes,
        "ADD_TAG" => UserDataOperation::AddTag {
            collection: required_in(record, "collection")?,
            tag: required_in(record, "tag")?,
        },
        "REMOVE_TAG" => UserDataOperation::RemoveTag {
            collection: required_in(record, "collection")?,
            tag: required_in(record, "tag")?,
        },
        "CLEAR_TAGS" => UserDataOperation::ClearTags,
        "CLEAR_TAG_COLLECTION" => {
            UserDataOperation::ClearTagCollection(required_in(record, "collection")?)
        }
        other => {
            return Err(BridgeError::invalid_parameter(format!(
                "unknown user data operation '{other}'"
            )));
        }
    };
    Ok(op)
}

/// Parse the `operations` list with `parse`, skipping malformed entries.
pub(super) fn parse_operations(
    p: &Parameters,
    parse: fn(&Map<String, Value>) -> Result<UserDataOperation>,
) -> Result<Vec<UserDataOperation>> {
    let records: Vec<Value> = p.required("operations")?;
    let mut operations = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let parsed = record
            .as_object()
            .ok_or_else(|| BridgeError::invalid_parameter("operation must be an object"))
            .and_then(parse);
        match parsed {
            Ok(op) => operations.push(op),
            Err(err) => warn!(index, error = %err, "skipping malformed user data operation"),
        }
    }
    Ok(operations)
}

/// Parse `{key: {type, value}}` into typed attributes.
pub(super) fn parse_attributes(raw: &Map<String, Value>) -> Result<BTreeMap<String, UserAttribute>> {
    let mut attributes = BTreeMap::new();
    for (key, entry) in raw {
        let entry = entry.as_object().ok_or_else(|| {
            BridgeError::invalid_parameter(format!("event attribute '{key}' must be an object"))
        })?;
        let code: String = required_in(entry, "type")?;
        let value = entry.get("value").unwrap_or(&Value::Null);
        attributes.insert(key.clone(), typed_attribute(&code, value)?);
    }
    Ok(attributes)
}

fn parse_event_data(raw: &Map<String, Value>) -> Result<EventData> {
    let tags = optional_in::<Vec<Value>>(raw, "tags")
        .unwrap_or_default()
        .iter()
        .filter_map(|tag| tag.as_str().map(str::to_owned))
        .collect();
    let attributes = parse_attributes(
        &optional_in::<Map<String, Value>>(raw, "attributes").unwrap_or_default(),
    )?;
    Ok(EventData { tags, attributes })
}

pub(super) fn parse_location(p: &Parameters) -> Result<Location> {
    Ok(Location {
        latitude: p.required("latitude")?,
        longitude: p.required("longitude")?,
        precision: p.optional("precision"),
        timestamp: p.optional::<i64>("date").map(millis).transpose()?,
    })
}

fn string_getter(
    builder: &mut DispatcherBuilder,
    sdk: &Arc<dyn NativeSdk>,
    action: &str,
    read: fn(&dyn NativeSdk) -> Option<String>,
) -> Result<()> {
    let s = Arc::clone(sdk);
    builder.register(action, move |_: &Parameters, _: &ActionContext| {
        Ok(ActionResult::Value(Value::String(read(s.as_ref()).unwrap_or_default())))
    })?;
    Ok(())
}

pub(crate) fn register(builder: &mut DispatcherBuilder, sdk: &Arc<dyn NativeSdk>) -> Result<()> {
    string_getter(builder, sdk, GET_INSTALLATION_ID, |s| s.installation_id())?;
    string_getter(builder, sdk, GET_LANGUAGE, |s| s.language())?;
    string_getter(builder, sdk, GET_REGION, |s| s.region())?;
    string_getter(builder, sdk, GET_IDENTIFIER, |s| s.identifier())?;

    let s = Arc::clone(sdk);
    builder.register(EDIT, move |p: &Parameters, _: &ActionContext| {
        s.apply_edits(parse_operations(p, parse_operation)?)?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(TRACK_EVENT, move |p: &Parameters, _: &ActionContext| {
        let payload = match p.optional::<Map<String, Value>>("event_data") {
            Some(raw) => EventPayload::Attributes(parse_event_data(&raw)?),
            None => EventPayload::None,
        };
        s.track_event(TrackedEvent {
            name: p.required("name")?,
            label: p.optional("label"),
            payload,
        })?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(TRACK_LEGACY_EVENT, move |p: &Parameters, _: &ActionContext| {
        s.track_event(TrackedEvent {
            name: p.required("name")?,
            label: p.optional("label"),
            payload: p
                .optional::<Map<String, Value>>("data")
                .map_or(EventPayload::None, EventPayload::Legacy),
        })?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(TRACK_TRANSACTION, move |p: &Parameters, _: &ActionContext| {
        s.track_transaction(p.required("amount")?, p.optional("data"))?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(TRACK_LOCATION, move |p: &Parameters, _: &ActionContext| {
        s.track_location(parse_location(p)?)?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(DATA_DEBUG, move |_: &Parameters, _: &ActionContext| {
        s.print_debug_information();
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(FETCH_ATTRIBUTES, move |_: &Parameters, _: &ActionContext| {
        let promise = StructuredPromise::deferred(|promise| {
            s.fetch_attributes(Box::new(move |outcome| {
                promise.settle(outcome.map(|attributes| {
                    Value::Object(
                        attributes
                            .iter()
                            .map(|(key, attribute)| (key.clone(), attribute.to_bridge_value()))
                            .collect(),
                    )
                }));
            }));
        });
        Ok(ActionResult::Pending(promise))
    })?;

    let s = Arc::clone(sdk);
    builder.register(FETCH_TAGS, move |_: &Parameters, _: &ActionContext| {
        let promise = StructuredPromise::deferred(|promise| {
            s.fetch_tag_collections(Box::new(move |outcome| {
                promise.settle(outcome.map(|collections| {
                    Value::Object(
                        collections
                            .into_iter()
                            .map(|(name, tags)| (name, Value::from(tags)))
                            .collect(),
                    )
                }));
            }));
        });
        Ok(ActionResult::Pending(promise))
    })?;

    Ok(())
}
