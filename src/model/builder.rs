//! Request construction from loose attribute maps
//!
//! Callers building request bodies may key attributes by logical name
//! (`compartment_id`) or by wire name (`compartmentId`). Supplying both for
//! one field is a programming error and fails with an ambiguity error.

use super::deserialize::{Deserializer, KeyMode};
use super::error::DeserializeError;
use super::registry::{get_registry, Registry};
use super::value::Instance;
use serde_json::Value;

/// Build an instance of `model` from an attribute object
pub fn build_in(registry: &Registry, model: &str, attributes: &Value) -> Result<Instance, DeserializeError> {
    Deserializer::new(registry)
        .with_key_mode(KeyMode::Attributes)
        .deserialize_model(attributes, model)
}

/// [`build_in`] against the global registry
pub fn build(model: &str, attributes: &Value) -> Result<Instance, DeserializeError> {
    build_in(get_registry(), model, attributes)
}
