// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion from structured promises to the legacy string contract.
//
// Older scripting bridges can only forward a string and have no rejection
// path. The legacy promise therefore always resolves: structured values are
// serialized to JSON text, and rejections become an error-shaped JSON object.
// New actions should expose `StructuredPromise` directly.

use pushbridge_core::error::BridgeError;
use serde_json::{Value, json};
use tracing::debug;

use crate::promise::SimplePromise;

/// Promise that may resolve to any JSON value and may reject.
pub type StructuredPromise = SimplePromise<Value>;

/// Promise that always resolves to a string and never rejects.
pub type LegacyPromise = SimplePromise<String>;

/// Code reported for every rejected action in the legacy payload.
pub const LEGACY_REJECTION_CODE: i64 = -1101;

/// Payload used when a resolved value cannot be serialized.
const SERIALIZATION_FALLBACK: &str = r#"{"error":"Internal native error (-1100)","code":-1100}"#;

/// Null-safe conversion: an absent source yields an absent target.
pub fn to_legacy(source: Option<&StructuredPromise>) -> Option<LegacyPromise> {
    source.map(convert)
}

/// Build a legacy promise that mirrors `source`.
///
/// Settles synchronously when `source` is already terminal.
pub fn convert(source: &StructuredPromise) -> LegacyPromise {
    let target = LegacyPromise::new();

    let on_value = target.clone();
    source.then(move |value| on_value.resolve(legacy_string(&value)));

    let on_error = target.clone();
    source.catch(move |error| on_error.resolve(legacy_error(&error)));

    target
}

/// String form of a resolved value.
///
/// Strings pass through untouched, `null` becomes the empty string and
/// everything else is compact JSON.
pub fn legacy_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|e| {
            debug!(error = %e, "could not serialize resolved value");
            SERIALIZATION_FALLBACK.to_string()
        }),
    }
}

/// Error-shaped payload for a rejected action.
pub fn legacy_error(error: &BridgeError) -> String {
    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
        "code": LEGACY_REJECTION_CODE,
    });
    serde_json::to_string(&payload).unwrap_or_else(|_| SERIALIZATION_FALLBACK.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_source_gives_absent_target() {
        assert!(to_legacy(None).is_none());
    }

    #[test]
    fn resolved_object_becomes_json_text() {
        let source = StructuredPromise::resolved(json!({ "tags": ["a"] }));
        let legacy = to_legacy(Some(&source)).expect("target");
        assert_eq!(legacy.peek(), Some(Ok(r#"{"tags":["a"]}"#.to_string())));
    }

    #[test]
    fn strings_and_null_pass_through() {
        assert_eq!(legacy_string(&json!("abc")), "abc");
        assert_eq!(legacy_string(&Value::Null), "");
        assert_eq!(legacy_string(&json!(12)), "12");
        assert_eq!(legacy_string(&json!(true)), "true");
    }

    #[test]
    fn rejection_resolves_with_error_payload() {
        let source = StructuredPromise::rejected(BridgeError::collaborator("fetch failed"));
        let legacy = convert(&source);

        let text = legacy.peek().expect("settled").expect("never rejects");
        let payload: Value = serde_json::from_str(&text).expect("json");
        assert_eq!(payload["code"], LEGACY_REJECTION_CODE);
        assert_eq!(payload["kind"], "CollaboratorFailure");
        assert_eq!(payload["error"], "native SDK call failed: fetch failed");
    }

    #[test]
    fn pending_source_settles_target_later() {
        let source = StructuredPromise::new();
        let legacy = convert(&source);
        assert!(legacy.is_pending());

        source.resolve(json!("late"));
        assert_eq!(legacy.peek(), Some(Ok("late".to_string())));
    }

    #[test]
    fn terminal_source_gives_terminal_target() {
        let resolved = StructuredPromise::resolved(json!({ "k": 1 }));
        let first = convert(&resolved).peek();
        let second = convert(&resolved).peek();
        assert!(first.is_some());
        assert_eq!(first, second);
    }
}
