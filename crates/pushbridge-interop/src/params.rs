// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoded action parameters and typed accessors.

use pushbridge_core::error::{BridgeError, Result};
use serde_json::{Map, Value};

/// A value that can be read out of a JSON parameter.
pub trait FromParam: Sized {
    /// Human-readable type name used in error messages.
    const EXPECTED: &'static str;

    fn from_param(value: &Value) -> Option<Self>;
}

impl FromParam for String {
    const EXPECTED: &'static str = "string";

    fn from_param(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromParam for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_param(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

/// Doubles in `[I64_LOWER, I64_UPPER)` convert to `i64` without saturating.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

impl FromParam for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_param(value: &Value) -> Option<Self> {
        value.as_i64().or_else(|| {
            // Script-side numbers are doubles; accept integral ones.
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(f))
                .map(|f| f as i64)
        })
    }
}

impl FromParam for f64 {
    const EXPECTED: &'static str = "number";

    fn from_param(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromParam for Map<String, Value> {
    const EXPECTED: &'static str = "object";

    fn from_param(value: &Value) -> Option<Self> {
        value.as_object().cloned()
    }
}

impl FromParam for Vec<Value> {
    const EXPECTED: &'static str = "array";

    fn from_param(value: &Value) -> Option<Self> {
        value.as_array().cloned()
    }
}

impl FromParam for Value {
    const EXPECTED: &'static str = "value";

    fn from_param(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// String-keyed JSON parameters of one action invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Accept an object, `null`, or a positional array wrapping one object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            Value::Array(items) => match <[Value; 1]>::try_from(items) {
                Ok([Value::Object(map)]) => Ok(Self(map)),
                Ok([Value::Null]) => Ok(Self::default()),
                Ok(_) => Err(BridgeError::invalid_parameter(
                    "positional parameters must wrap a single object",
                )),
                Err(items) if items.is_empty() => Ok(Self::default()),
                Err(items) => Err(BridgeError::invalid_parameter(format!(
                    "expected one positional parameter object, got {}",
                    items.len()
                ))),
            },
            other => Err(BridgeError::invalid_parameter(format!(
                "parameters must be an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Parse JSON text, then apply [`Parameters::from_value`].
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| BridgeError::invalid_parameter(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Read a required field. Missing, `null` and mistyped values are
    /// `InvalidParameters` errors naming the field.
    pub fn required<T: FromParam>(&self, key: &str) -> Result<T> {
        required_in(&self.0, key)
    }

    /// Read an optional field. Missing, `null` and mistyped values are `None`.
    pub fn optional<T: FromParam>(&self, key: &str) -> Option<T> {
        optional_in(&self.0, key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// [`Parameters::required`] for nested objects.
pub fn required_in<T: FromParam>(map: &Map<String, Value>, key: &str) -> Result<T> {
    match map.get(key) {
        None | Some(Value::Null) => Err(BridgeError::invalid_parameter(format!(
            "required parameter '{key}' missing"
        ))),
        Some(value) => T::from_param(value).ok_or_else(|| {
            BridgeError::invalid_parameter(format!(
                "required parameter '{key}' of wrong type, expected {}",
                T::EXPECTED
            ))
        }),
    }
}

/// [`Parameters::optional`] for nested objects.
pub fn optional_in<T: FromParam>(map: &Map<String, Value>, key: &str) -> Option<T> {
    map.get(key).and_then(T::from_param)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
