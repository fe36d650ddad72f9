//! Enum Guard
//!
//! Unknown enum members from newer service versions must never break older
//! clients: values outside the allowed set are replaced by a sentinel.

use super::diagnostics::{Diagnostic, DiagnosticsSink};
use serde_json::Value;

/// Whether `value` is one of `allowed`. Numbers match numerically (`1` == `1.0`).
pub fn is_allowed(value: &Value, allowed: &[Value]) -> bool {
    allowed.iter().any(|candidate| match (candidate, value) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    })
}

/// Return `value` if it is allowed, otherwise the `unknown` sentinel
pub fn coerce_enum(value: &Value, allowed: &[Value], unknown: &str) -> Value {
    if is_allowed(value, allowed) {
        value.clone()
    } else {
        Value::String(unknown.to_string())
    }
}

/// [`coerce_enum`] that reports substitutions to a sink
pub fn coerce_enum_reporting(
    value: &Value,
    allowed: &[Value],
    unknown: &str,
    path: &str,
    sink: &dyn DiagnosticsSink,
) -> Value {
    if is_allowed(value, allowed) {
        return value.clone();
    }
    sink.emit(Diagnostic::UnknownEnumValue {
        path: path.to_string(),
        value: value.clone(),
        substituted: unknown.to_string(),
    });
    Value::String(unknown.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::diagnostics::RecordingSink;
    use crate::model::types::UNKNOWN_ENUM_VALUE;
    use serde_json::json;

    fn lifecycle_states() -> Vec<Value> {
        vec![json!("CREATING"), json!("ACTIVE"), json!("DELETED")]
    }

    #[test]
    fn test_known_value_passes_through() {
        let value = coerce_enum(&json!("ACTIVE"), &lifecycle_states(), UNKNOWN_ENUM_VALUE);
        assert_eq!(value, json!("ACTIVE"));
    }

    #[test]
    fn test_unknown_value_becomes_sentinel() {
        let value = coerce_enum(
            &json!("TOTALLY_NEW_STATE"),
            &lifecycle_states(),
            UNKNOWN_ENUM_VALUE,
        );
        assert_eq!(value, json!("UNKNOWN_ENUM_VALUE"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let value = coerce_enum(&json!("active"), &lifecycle_states(), UNKNOWN_ENUM_VALUE);
        assert_eq!(value, json!(UNKNOWN_ENUM_VALUE));
    }

    #[test]
    fn test_numeric_enums() {
        let allowed = vec![json!(1), json!(2), json!(5)];
        assert_eq!(coerce_enum(&json!(2), &allowed, "UNKNOWN"), json!(2));
        assert_eq!(coerce_enum(&json!(2.0), &allowed, "UNKNOWN"), json!(2.0));
        assert_eq!(coerce_enum(&json!(3), &allowed, "UNKNOWN"), json!("UNKNOWN"));
        assert_eq!(coerce_enum(&json!("2"), &allowed, "UNKNOWN"), json!("UNKNOWN"));
    }

    #[test]
    fn test_substitution_is_reported() {
        let sink = RecordingSink::new();
        coerce_enum_reporting(
            &json!("ACTIVE"),
            &lifecycle_states(),
            UNKNOWN_ENUM_VALUE,
            "$.lifecycleState",
            &sink,
        );
        assert!(sink.take().is_empty());

        coerce_enum_reporting(
            &json!("MIGRATING"),
            &lifecycle_states(),
            UNKNOWN_ENUM_VALUE,
            "$.lifecycleState",
            &sink,
        );
        assert_eq!(
            sink.take(),
            vec![Diagnostic::UnknownEnumValue {
                path: "$.lifecycleState".to_string(),
                value: json!("MIGRATING"),
                substituted: UNKNOWN_ENUM_VALUE.to_string(),
            }]
        );
    }
}
