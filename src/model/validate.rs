//! Model-level validation
//!
//! Violations are reported as human-readable strings instead of errors so the
//! caller decides whether to send a partially valid request.

use super::enum_guard::is_allowed;
use super::registry::{get_registry, Registry};
use super::types::{PrimitiveKind, TypeRef};
use super::value::{FieldValue, Instance};
use serde_json::Value;

/// List every violation found in `instance` (and nested instances)
pub fn list_invalid_properties_in(registry: &Registry, instance: &Instance) -> Vec<String> {
    let mut out = Vec::new();
    check_instance(registry, instance, "", &mut out);
    out
}

/// [`list_invalid_properties_in`] against the global registry
pub fn list_invalid_properties(instance: &Instance) -> Vec<String> {
    list_invalid_properties_in(get_registry(), instance)
}

pub fn is_valid_in(registry: &Registry, instance: &Instance) -> bool {
    list_invalid_properties_in(registry, instance).is_empty()
}

pub fn is_valid(instance: &Instance) -> bool {
    is_valid_in(get_registry(), instance)
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn check_instance(registry: &Registry, instance: &Instance, prefix: &str, out: &mut Vec<String>) {
    let Some(def) = registry.model(instance.model()) else {
        out.push(format!("{}: unknown model '{}'", display_path(prefix), instance.model()));
        return;
    };

    for field in &def.fields {
        let path = join(prefix, &field.logical);
        match instance.get(&field.logical) {
            None if field.required => {
                out.push(format!("{}: required field is not set", path));
            }
            None => {}
            Some(FieldValue::Null) => {
                if field.required || !field.nullable {
                    out.push(format!("{}: cannot be null", path));
                }
            }
            Some(value) => check_value(registry, value, &field.ty, &path, out),
        }
    }

    for (name, _) in instance.fields() {
        if def.field(name).is_none() {
            out.push(format!("{}: not a field of {}", join(prefix, name), def.name));
        }
    }
}

fn check_value(registry: &Registry, value: &FieldValue, ty: &TypeRef, path: &str, out: &mut Vec<String>) {
    if value.is_null() {
        // Null collection members are accepted as sent by the service
        return;
    }

    match (ty, value) {
        (TypeRef::Primitive(kind), value) => {
            if !matches_primitive(*kind, value) {
                out.push(format!(
                    "{}: expected {}, found {}",
                    path,
                    kind.name(),
                    value.kind()
                ));
            }
        }
        (TypeRef::EnumOf(def), value) => {
            let raw = match value {
                FieldValue::String(s) => Value::String(s.clone()),
                FieldValue::Integer(i) => Value::from(*i),
                other => {
                    out.push(format!("{}: expected enum value, found {}", path, other.kind()));
                    return;
                }
            };
            if !is_allowed(&raw, &def.allowed) {
                let allowed: Vec<String> = def.allowed.iter().map(|v| v.to_string()).collect();
                out.push(format!(
                    "{}: invalid value {}, must be one of [{}]",
                    path,
                    raw,
                    allowed.join(", ")
                ));
            }
        }
        (TypeRef::Composite(model), FieldValue::Object(nested)) => {
            if !registry.is_subtype(nested.model(), model) {
                out.push(format!(
                    "{}: expected {}, found {}",
                    path,
                    model,
                    nested.model()
                ));
                return;
            }
            check_instance(registry, nested, path, out);
        }
        (TypeRef::ArrayOf(inner), FieldValue::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_value(registry, item, inner, &format!("{}[{}]", path, i), out);
            }
        }
        (TypeRef::MapOf(_, inner), FieldValue::Map(entries)) => {
            for (key, item) in entries {
                check_value(registry, item, inner, &join(path, key), out);
            }
        }
        (ty, value) => {
            out.push(format!("{}: expected {}, found {}", path, ty, value.kind()));
        }
    }
}

fn matches_primitive(kind: PrimitiveKind, value: &FieldValue) -> bool {
    match kind {
        PrimitiveKind::String => matches!(value, FieldValue::String(_)),
        PrimitiveKind::Integer => matches!(value, FieldValue::Integer(_)),
        PrimitiveKind::Float => matches!(value, FieldValue::Float(_) | FieldValue::Integer(_)),
        PrimitiveKind::Boolean => matches!(value, FieldValue::Boolean(_)),
        PrimitiveKind::DateTime => matches!(value, FieldValue::DateTime(_)),
        PrimitiveKind::Date => matches!(value, FieldValue::Date(_)),
        PrimitiveKind::Object => true,
    }
}

fn display_path(prefix: &str) -> &str {
    if prefix.is_empty() {
        "$"
    } else {
        prefix
    }
}
