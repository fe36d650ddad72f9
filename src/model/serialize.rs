//! Serializer
//!
//! Walks an [`Instance`] graph back into JSON keyed by wire names.
//! Unset fields are omitted; explicitly cleared fields are emitted as
//! `null` only when the field is declared nullable.

use super::deserialize::{child_path, index_path, ROOT_PATH};
use super::error::SerializeError;
use super::registry::{get_registry, Registry};
use super::value::{FieldValue, Instance};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::{Map, Number, Value};

/// Wire date-time format: RFC3339, `Z` for UTC, fractional seconds only when present
pub fn format_datetime(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Turns [`Instance`]s into JSON
#[derive(Debug, Clone, Copy)]
pub struct Serializer<'r> {
    registry: &'r Registry,
}

impl<'r> Serializer<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn serialize(&self, instance: &Instance) -> Result<Value, SerializeError> {
        self.instance(instance, ROOT_PATH)
    }

    /// Serialize a standalone value (array, map, scalar or instance)
    pub fn serialize_value(&self, value: &FieldValue) -> Result<Value, SerializeError> {
        self.value(value, ROOT_PATH)
    }

    fn instance(&self, instance: &Instance, path: &str) -> Result<Value, SerializeError> {
        let def = self
            .registry
            .model(instance.model())
            .ok_or_else(|| SerializeError::UnknownModel {
                path: path.to_string(),
                model: instance.model().to_string(),
            })?;

        let mut out = Map::new();
        for field in &def.fields {
            let Some(value) = instance.get(&field.logical) else {
                continue;
            };
            if value.is_null() && !field.nullable {
                tracing::debug!("Omitting null for non-nullable {}.{}", def.name, field.wire);
                continue;
            }
            let field_path = child_path(path, &field.wire);
            out.insert(field.wire.clone(), self.value(value, &field_path)?);
        }

        for (name, _) in instance.fields() {
            if def.field(name).is_none() {
                tracing::debug!("Dropping undeclared field '{}' of {}", name, def.name);
            }
        }

        Ok(Value::Object(out))
    }

    fn value(&self, value: &FieldValue, path: &str) -> Result<Value, SerializeError> {
        Ok(match value {
            FieldValue::Null => Value::Null,
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::Number((*i).into()),
            // Non-finite floats have no JSON form
            FieldValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::DateTime(dt) => Value::String(format_datetime(dt)),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Json(v) => v.clone(),
            FieldValue::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.value(item, &index_path(path, i)))
                    .collect::<Result<_, _>>()?,
            ),
            FieldValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.value(v, &child_path(path, k))?)))
                    .collect::<Result<_, SerializeError>>()?,
            ),
            FieldValue::Object(instance) => self.instance(instance, path)?,
        })
    }
}

/// Serialize `instance` using the global registry
pub fn serialize(instance: &Instance) -> Result<Value, SerializeError> {
    Serializer::new(get_registry()).serialize(instance)
}
