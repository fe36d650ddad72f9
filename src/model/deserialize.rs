//! Deserializer
//!
//! Rebuilds typed values from raw JSON against a declared [`TypeRef`],
//! resolving composite references through the [`Registry`] and polymorphic
//! bases through their discriminator.
//!
//! Forgiving rules kept for wire compatibility:
//! - unknown enum members become the enum's sentinel
//! - unknown discriminator values fall back to the base model
//! - array fields holding a non-array are treated as absent
//! - booleans accept `true`, `t`, `yes`, `y`, `1` (any case); anything else is `false`

use super::diagnostics::{Diagnostic, DiagnosticsSink, NoopSink};
use super::enum_guard::coerce_enum_reporting;
use super::error::{AmbiguousInputError, DeserializeError};
use super::registry::{get_registry, Dispatch, Registry};
use super::types::{EnumDef, FieldDef, ModelDef, PrimitiveKind, TypeRef};
use super::value::{FieldValue, Instance};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Path of the document root in error messages and diagnostics
pub const ROOT_PATH: &str = "$";

static NOOP_SINK: NoopSink = NoopSink;

/// Which object keys identify a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// Service responses: wire names only
    #[default]
    Wire,
    /// Request construction: logical or wire names, but not both
    Attributes,
}

/// Turns raw JSON into [`FieldValue`]s and [`Instance`]s
#[derive(Clone, Copy)]
pub struct Deserializer<'r> {
    registry: &'r Registry,
    sink: &'r dyn DiagnosticsSink,
    keys: KeyMode,
}

impl<'r> Deserializer<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            sink: &NOOP_SINK,
            keys: KeyMode::Wire,
        }
    }

    /// Report degraded input (enum and subtype fallbacks) to `sink`
    pub fn with_sink(mut self, sink: &'r dyn DiagnosticsSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_key_mode(mut self, keys: KeyMode) -> Self {
        self.keys = keys;
        self
    }

    /// Deserialize `raw` against any declared type.
    ///
    /// Returns `Ok(None)` when the input must be treated as absent
    /// (an array type given a non-array).
    pub fn deserialize(&self, raw: &Value, ty: &TypeRef) -> Result<Option<FieldValue>, DeserializeError> {
        self.value(raw, ty, ROOT_PATH)
    }

    /// Deserialize `raw` into an instance of `model` (or one of its subtypes)
    pub fn deserialize_model(&self, raw: &Value, model: &str) -> Result<Instance, DeserializeError> {
        tracing::trace!("Deserializing {} ({:?} keys)", model, self.keys);
        self.composite(raw, model, ROOT_PATH)
    }

    fn value(&self, raw: &Value, ty: &TypeRef, path: &str) -> Result<Option<FieldValue>, DeserializeError> {
        if raw.is_null() {
            return Ok(Some(FieldValue::Null));
        }

        match ty {
            TypeRef::Primitive(kind) => coerce_primitive(raw, *kind, path).map(Some),
            TypeRef::EnumOf(def) => self.enum_value(raw, def, path).map(Some),
            TypeRef::Composite(model) => self
                .composite(raw, model, path)
                .map(|instance| Some(FieldValue::Object(instance))),
            TypeRef::ArrayOf(inner) => {
                let Value::Array(items) = raw else {
                    tracing::debug!("Ignoring non-array value at {}", path);
                    self.sink.emit(Diagnostic::Skipped {
                        path: path.to_string(),
                        reason: format!("expected an array, found {}", json_kind(raw)),
                    });
                    return Ok(None);
                };

                let mut values = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    if let Some(value) = self.value(item, inner, &index_path(path, i))? {
                        values.push(value);
                    }
                }
                Ok(Some(FieldValue::Array(values)))
            }
            TypeRef::MapOf(key_kind, inner) => {
                let Value::Object(entries) = raw else {
                    return Err(DeserializeError::UnexpectedShape {
                        path: path.to_string(),
                        expected: "map".to_string(),
                        found: json_kind(raw),
                    });
                };

                let mut map = BTreeMap::new();
                for (key, item) in entries {
                    let item_path = child_path(path, key);
                    let key = coerce_key(key, *key_kind, &item_path)?;
                    if map.contains_key(&key) {
                        return Err(DeserializeError::DuplicateKey { path: item_path, key });
                    }
                    if let Some(value) = self.value(item, inner, &item_path)? {
                        map.insert(key, value);
                    }
                }
                Ok(Some(FieldValue::Map(map)))
            }
        }
    }

    fn enum_value(&self, raw: &Value, def: &EnumDef, path: &str) -> Result<FieldValue, DeserializeError> {
        match coerce_enum_reporting(raw, &def.allowed, &def.unknown, path, self.sink) {
            Value::String(s) => Ok(FieldValue::String(s)),
            other => coerce_primitive(&other, def.base, path),
        }
    }

    fn composite(&self, raw: &Value, model: &str, path: &str) -> Result<Instance, DeserializeError> {
        let def = self
            .registry
            .model(model)
            .ok_or_else(|| DeserializeError::UnknownModel {
                path: path.to_string(),
                model: model.to_string(),
            })?;

        let Value::Object(obj) = raw else {
            return Err(DeserializeError::UnexpectedShape {
                path: path.to_string(),
                expected: format!("object ({})", model),
                found: json_kind(raw),
            });
        };

        let def = self.resolve(def, obj, path);
        if self.keys == KeyMode::Attributes {
            log_unknown_keys(def, obj, path);
        }

        let mut instance = Instance::new(def.name.clone());
        for field in &def.fields {
            let field_path = child_path(path, &field.wire);
            match self.lookup(def, field, obj, &field_path)? {
                None => {
                    if let Some(default) = &field.default {
                        if let Some(value) = self.value(default, &field.ty, &field_path)? {
                            instance.set(field.logical.clone(), value);
                        }
                    }
                }
                Some(Value::Null) if !field.nullable => {
                    tracing::debug!("Treating null as absent for non-nullable {}", field_path);
                }
                Some(raw_value) => {
                    if let Some(value) = self.value(raw_value, &field.ty, &field_path)? {
                        instance.set(field.logical.clone(), value);
                    }
                }
            }
        }

        if let Some((field, value)) = self.registry.discriminator_slot(def) {
            if !instance.is_set(&field.logical) {
                instance.set(field.logical.clone(), value);
            }
        }

        Ok(instance)
    }

    /// Follow discriminators down to the most specific registered model
    fn resolve(&self, def: &'r ModelDef, obj: &Map<String, Value>, path: &str) -> &'r ModelDef {
        let mut current = def;
        loop {
            let raw = self.discriminator_raw(current, obj);
            match self.registry.dispatch_value(current, raw.and_then(Value::as_str)) {
                Dispatch::Plain(resolved) => return resolved,
                Dispatch::Concrete(resolved) => {
                    if resolved.discriminator.is_none() || std::ptr::eq(resolved, current) {
                        return resolved;
                    }
                    current = resolved;
                }
                Dispatch::Fallback(resolved) => {
                    if std::ptr::eq(resolved, def) {
                        let value = raw.map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()));
                        self.sink.emit(Diagnostic::UnknownDiscriminator {
                            path: path.to_string(),
                            base: resolved.name.clone(),
                            value,
                        });
                    }
                    return resolved;
                }
            }
        }
    }

    /// Raw discriminator value; attribute maps may key it by logical name
    fn discriminator_raw<'v>(&self, def: &ModelDef, obj: &'v Map<String, Value>) -> Option<&'v Value> {
        let discriminator = def.discriminator.as_ref()?;
        obj.get(&discriminator.field).or_else(|| {
            if self.keys == KeyMode::Attributes {
                let field = def.field_by_wire(&discriminator.field)?;
                obj.get(&field.logical)
            } else {
                None
            }
        })
    }

    fn lookup<'v>(
        &self,
        def: &ModelDef,
        field: &FieldDef,
        obj: &'v Map<String, Value>,
        path: &str,
    ) -> Result<Option<&'v Value>, DeserializeError> {
        let by_wire = obj.get(&field.wire);
        if self.keys == KeyMode::Wire || field.logical == field.wire {
            return Ok(by_wire);
        }

        match (obj.get(&field.logical), by_wire) {
            (Some(_), Some(_)) => Err(DeserializeError::Ambiguous {
                path: path.to_string(),
                source: AmbiguousInputError {
                    model: def.name.clone(),
                    logical: field.logical.clone(),
                    wire: field.wire.clone(),
                },
            }),
            (by_logical, by_wire) => Ok(by_logical.or(by_wire)),
        }
    }
}

fn log_unknown_keys(def: &ModelDef, obj: &Map<String, Value>, path: &str) {
    for key in obj.keys() {
        if !def.fields.iter().any(|f| &f.wire == key || &f.logical == key) {
            tracing::debug!("Ignoring unknown attribute '{}' for {} at {}", key, def.name, path);
        }
    }
}

/// Deserialize `raw` into `model` using the global registry and no diagnostics
pub fn deserialize(raw: &Value, model: &str) -> Result<Instance, DeserializeError> {
    Deserializer::new(get_registry()).deserialize_model(raw, model)
}

/// Coerce a raw scalar to a primitive kind
pub fn coerce_primitive(raw: &Value, kind: PrimitiveKind, path: &str) -> Result<FieldValue, DeserializeError> {
    let invalid = |expected: &'static str| DeserializeError::InvalidValue {
        path: path.to_string(),
        expected,
        value: raw.to_string(),
    };
    let shape = |expected: &str| DeserializeError::UnexpectedShape {
        path: path.to_string(),
        expected: expected.to_string(),
        found: json_kind(raw),
    };

    match kind {
        PrimitiveKind::String => match raw {
            Value::String(s) => Ok(FieldValue::String(s.clone())),
            Value::Number(n) => Ok(FieldValue::String(n.to_string())),
            Value::Bool(b) => Ok(FieldValue::String(b.to_string())),
            _ => Err(shape("string")),
        },
        PrimitiveKind::Integer => match raw {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FieldValue::Integer(i))
                } else if n.is_u64() {
                    Err(invalid("integer"))
                } else {
                    match n.as_f64() {
                        Some(f) if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                            Ok(FieldValue::Integer(f.trunc() as i64))
                        }
                        _ => Err(invalid("integer")),
                    }
                }
            }
            Value::String(s) => s
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| invalid("integer")),
            _ => Err(shape("integer")),
        },
        PrimitiveKind::Float => match raw {
            Value::Number(n) => n.as_f64().map(FieldValue::Float).ok_or_else(|| invalid("float")),
            Value::String(s) => s.parse::<f64>().map(FieldValue::Float).map_err(|_| invalid("float")),
            _ => Err(shape("float")),
        },
        PrimitiveKind::Boolean => Ok(FieldValue::Boolean(match raw {
            Value::Bool(b) => *b,
            Value::String(s) => is_truthy_token(s),
            Value::Number(n) => is_truthy_token(&n.to_string()),
            _ => false,
        })),
        PrimitiveKind::DateTime => match raw {
            Value::String(s) => parse_datetime(s)
                .map(FieldValue::DateTime)
                .ok_or_else(|| invalid("date-time")),
            _ => Err(shape("date-time string")),
        },
        PrimitiveKind::Date => match raw {
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
                .map(FieldValue::Date)
                .ok_or_else(|| invalid("date")),
            _ => Err(shape("date string")),
        },
        PrimitiveKind::Object => Ok(FieldValue::Json(raw.clone())),
    }
}

/// Case-insensitive `true`, `t`, `yes`, `y` or `1`
pub fn is_truthy_token(token: &str) -> bool {
    matches!(
        token.to_ascii_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1"
    )
}

/// RFC3339, or a zone-less timestamp taken as UTC
pub fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok().or_else(|| {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive).into())
    })
}

fn coerce_key(key: &str, kind: PrimitiveKind, path: &str) -> Result<String, DeserializeError> {
    if kind == PrimitiveKind::String {
        return Ok(key.to_string());
    }
    Ok(match coerce_primitive(&Value::String(key.to_string()), kind, path)? {
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Boolean(b) => b.to_string(),
        FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        FieldValue::DateTime(dt) => super::serialize::format_datetime(&dt),
        _ => key.to_string(),
    })
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn child_path(path: &str, key: &str) -> String {
    format!("{}.{}", path, key)
}

pub(crate) fn index_path(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}
