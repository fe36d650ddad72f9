//! Typed values and model instances
//!
//! An [`Instance`] holds the fields of one model keyed by logical name.
//! A field missing from the map is *unset*; a field holding
//! [`FieldValue::Null`] was explicitly cleared.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Value;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// A typed field value
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    /// Untyped JSON for `Object` fields
    Json(Value),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    Object(Instance),
}

impl FieldValue {
    /// Short name of the variant, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::String(_) => "string",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::DateTime(_) => "date-time",
            FieldValue::Date(_) => "date",
            FieldValue::Json(_) => "json",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
            FieldValue::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            FieldValue::Object(instance) => Some(instance),
            _ => None,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            // Bitwise so that Eq and Hash agree (NaN == NaN)
            (FieldValue::Float(a), FieldValue::Float(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a == b,
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a == b,
            (FieldValue::Date(a), FieldValue::Date(b)) => a == b,
            (FieldValue::Json(a), FieldValue::Json(b)) => a == b,
            (FieldValue::Array(a), FieldValue::Array(b)) => a == b,
            (FieldValue::Map(a), FieldValue::Map(b)) => a == b,
            (FieldValue::Object(a), FieldValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            FieldValue::Null => {}
            FieldValue::String(s) => s.hash(state),
            FieldValue::Integer(i) => i.hash(state),
            FieldValue::Float(f) => f.to_bits().hash(state),
            FieldValue::Boolean(b) => b.hash(state),
            // Equal instants in different offsets compare equal, so hash the instant
            FieldValue::DateTime(dt) => {
                dt.timestamp().hash(state);
                dt.timestamp_subsec_nanos().hash(state);
            }
            FieldValue::Date(d) => d.hash(state),
            FieldValue::Json(v) => hash_json(v, state),
            FieldValue::Array(items) => items.hash(state),
            FieldValue::Map(map) => map.hash(state),
            FieldValue::Object(instance) => instance.hash(state),
        }
    }
}

/// Hash a JSON value consistently with `Value`'s `==` (`0.0 == -0.0`)
fn hash_json<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Null => {}
        Value::Bool(b) => b.hash(state),
        Value::Number(n) => {
            // Integer and float representations never compare equal
            if let Some(i) = n.as_i64() {
                0u8.hash(state);
                i.hash(state);
            } else if let Some(u) = n.as_u64() {
                1u8.hash(state);
                u.hash(state);
            } else if let Some(f) = n.as_f64() {
                2u8.hash(state);
                let f = if f == 0.0 { 0.0 } else { f };
                f.to_bits().hash(state);
            }
        }
        Value::String(s) => s.hash(state),
        Value::Array(items) => {
            items.len().hash(state);
            for item in items {
                hash_json(item, state);
            }
        }
        Value::Object(map) => {
            map.len().hash(state);
            // Key order is not part of equality
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, item) in entries {
                key.hash(state);
                hash_json(item, state);
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        FieldValue::DateTime(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<Instance> for FieldValue {
    fn from(value: Instance) -> Self {
        FieldValue::Object(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<BTreeMap<String, T>> for FieldValue {
    fn from(values: BTreeMap<String, T>) -> Self {
        FieldValue::Map(values.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// An object conforming to one model descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instance {
    model: String,
    fields: BTreeMap<String, FieldValue>,
}

impl Instance {
    /// Create an instance with every field unset
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Name of the (concrete) model this instance conforms to
    pub fn model(&self) -> &str {
        &self.model
    }

    /// `None` when unset, `Some(FieldValue::Null)` when explicitly cleared
    pub fn get(&self, logical: &str) -> Option<&FieldValue> {
        self.fields.get(logical)
    }

    pub fn is_set(&self, logical: &str) -> bool {
        self.fields.contains_key(logical)
    }

    pub fn set(&mut self, logical: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(logical.into(), value.into());
    }

    /// Builder-style [`Instance::set`]
    pub fn with(mut self, logical: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(logical, value);
        self
    }

    /// Explicitly clear a field (serialized as `null` on nullable fields)
    pub fn clear(&mut self, logical: impl Into<String>) {
        self.fields.insert(logical.into(), FieldValue::Null);
    }

    /// Return a field to the unset state
    pub fn unset(&mut self, logical: &str) -> Option<FieldValue> {
        self.fields.remove(logical)
    }

    /// Set fields in logical-name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
