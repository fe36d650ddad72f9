//! Model Registry - Load model descriptors from JSON/YAML
//!
//! This module loads the model descriptors embedded in the binary (plus any
//! extra descriptor files the caller adds), resolves inheritance and
//! polymorphic groups, and provides lookup functions for the codec.

use super::error::RegistryError;
use super::types::{
    DescriptorFile, Discriminator, FieldDef, FieldSpec, ModelDef, ModelSpec, TypeRef,
    UNKNOWN_ENUM_VALUE,
};
use super::value::Instance;
use convert_case::{Case, Casing};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

/// Embedded descriptor files (compiled into the binary)
const DESCRIPTOR_FILES: &[(&str, &str)] = &[
    ("waf.json", include_str!("../descriptors/waf.json")),
    ("logging.json", include_str!("../descriptors/logging.json")),
    ("core.json", include_str!("../descriptors/core.json")),
    ("power.json", include_str!("../descriptors/power.json")),
    ("azure_network.json", include_str!("../descriptors/azure_network.json")),
];

/// Outcome of resolving a polymorphic payload to a concrete model
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch<'r> {
    /// The model is not polymorphic
    Plain(&'r ModelDef),
    /// The discriminator selected a registered subtype
    Concrete(&'r ModelDef),
    /// Unknown or missing discriminator; only base fields apply
    Fallback(&'r ModelDef),
}

impl<'r> Dispatch<'r> {
    pub fn model(&self) -> &'r ModelDef {
        match *self {
            Dispatch::Plain(def) | Dispatch::Concrete(def) | Dispatch::Fallback(def) => def,
        }
    }
}

/// A polymorphic base with its concrete members
#[derive(Debug, Clone)]
pub struct PolymorphicGroup<'r> {
    pub base: &'r ModelDef,
    /// Wire name of the discriminator field
    pub field: &'r str,
    /// (discriminator value, concrete model)
    pub members: Vec<(&'r str, &'r ModelDef)>,
}

/// Resolved, immutable set of model descriptors
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: HashMap<String, ModelDef>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Build a registry from the embedded descriptor files only
    pub fn embedded() -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new();
        builder.add_embedded()?;
        builder.build()
    }

    pub fn model(&self, name: &str) -> Option<&ModelDef> {
        self.models.get(name)
    }

    /// All model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Whether `model` is `ancestor` or inherits from it
    pub fn is_subtype(&self, model: &str, ancestor: &str) -> bool {
        let mut current = Some(model);
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.models.get(name).and_then(|def| def.parent.as_deref());
        }
        false
    }

    /// Pick the model a payload deserializes into
    pub fn dispatch<'r>(&'r self, model: &'r ModelDef, raw: &Map<String, Value>) -> Dispatch<'r> {
        let value = model
            .discriminator
            .as_ref()
            .and_then(|d| raw.get(&d.field))
            .and_then(|v| v.as_str());
        self.dispatch_value(model, value)
    }

    /// [`Registry::dispatch`] with the discriminator value already extracted
    pub fn dispatch_value<'r>(&'r self, model: &'r ModelDef, value: Option<&str>) -> Dispatch<'r> {
        let Some(discriminator) = &model.discriminator else {
            return Dispatch::Plain(model);
        };

        match value
            .and_then(|v| discriminator.mapping.get(v))
            .and_then(|name| self.models.get(name))
        {
            Some(concrete) => Dispatch::Concrete(concrete),
            None => Dispatch::Fallback(model),
        }
    }

    /// The polymorphic group rooted at `base`, if it has a discriminator
    pub fn group(&self, base: &str) -> Option<PolymorphicGroup<'_>> {
        let base = self.models.get(base)?;
        let discriminator = base.discriminator.as_ref()?;
        let members = discriminator
            .mapping
            .iter()
            .filter_map(|(value, name)| Some((value.as_str(), self.models.get(name)?)))
            .collect();
        Some(PolymorphicGroup {
            base,
            field: &discriminator.field,
            members,
        })
    }

    /// Create an empty instance; concrete subtypes get their discriminator preset
    pub fn new_instance(&self, model: &str) -> Option<Instance> {
        let def = self.models.get(model)?;
        let mut instance = Instance::new(model);
        if let Some((field, value)) = self.discriminator_slot(def) {
            instance.set(field.logical.clone(), value);
        }
        Some(instance)
    }

    /// Discriminator field and value a concrete member always carries
    pub(crate) fn discriminator_slot<'r>(&'r self, def: &'r ModelDef) -> Option<(&'r FieldDef, &'r str)> {
        let value = def.discriminator_value.as_deref()?;
        let mut ancestor = def.parent.as_deref();
        while let Some(name) = ancestor {
            let parent = self.models.get(name)?;
            if let Some(discriminator) = &parent.discriminator {
                return Some((def.field_by_wire(&discriminator.field)?, value));
            }
            ancestor = parent.parent.as_deref();
        }
        None
    }
}

/// Collects descriptor sources, then resolves them into a [`Registry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    specs: BTreeMap<String, ModelSpec>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_embedded(&mut self) -> Result<&mut Self, RegistryError> {
        for (name, content) in DESCRIPTOR_FILES {
            self.add_json(name, content)?;
        }
        Ok(self)
    }

    pub fn add_json(&mut self, source_name: &str, content: &str) -> Result<&mut Self, RegistryError> {
        let file: DescriptorFile =
            serde_json::from_str(content).map_err(|e| RegistryError::Parse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        self.add_file_contents(file)
    }

    pub fn add_yaml(&mut self, source_name: &str, content: &str) -> Result<&mut Self, RegistryError> {
        let file: DescriptorFile =
            serde_yaml::from_str(content).map_err(|e| RegistryError::Parse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        self.add_file_contents(file)
    }

    /// Add a `.json`, `.yaml` or `.yml` descriptor file
    pub fn add_path(&mut self, path: &Path) -> Result<&mut Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let source_name = path.display().to_string();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => self.add_yaml(&source_name, &content),
            _ => self.add_json(&source_name, &content),
        }
    }

    /// Add every descriptor file in a directory (non-recursive, sorted by name)
    pub fn add_dir(&mut self, dir: &Path) -> Result<&mut Self, RegistryError> {
        let entries = std::fs::read_dir(dir).map_err(|e| RegistryError::Io {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("json" | "yaml" | "yml")
                )
            })
            .collect();
        paths.sort();

        for path in paths {
            tracing::debug!("Loading descriptor file {:?}", path);
            self.add_path(&path)?;
        }
        Ok(self)
    }

    fn add_file_contents(&mut self, file: DescriptorFile) -> Result<&mut Self, RegistryError> {
        for (name, spec) in file.models {
            if self.specs.contains_key(&name) {
                return Err(RegistryError::DuplicateModel(name));
            }
            self.specs.insert(name, spec);
        }
        Ok(self)
    }

    pub fn build(&self) -> Result<Registry, RegistryError> {
        let mut resolved: HashMap<String, Vec<FieldDef>> = HashMap::new();
        for name in self.specs.keys() {
            self.resolve_fields(name, &mut Vec::new(), &mut resolved)?;
        }

        let mut models = HashMap::new();
        for (name, spec) in &self.specs {
            let fields = resolved.remove(name).unwrap_or_default();
            check_unique(name, &fields)?;

            let discriminator = match &spec.discriminator {
                Some(d) => {
                    if !fields.iter().any(|f| f.wire == d.field) {
                        return Err(RegistryError::MissingDiscriminatorField {
                            model: name.clone(),
                            field: d.field.clone(),
                        });
                    }
                    Some(Discriminator {
                        field: d.field.clone(),
                        mapping: d.mapping.clone(),
                    })
                }
                None => None,
            };

            models.insert(
                name.clone(),
                ModelDef {
                    name: name.clone(),
                    parent: spec.extends.clone(),
                    fields,
                    discriminator,
                    discriminator_value: None,
                },
            );
        }

        let mut registry = Registry { models };
        registry.link_groups()?;
        registry.check_references()?;

        tracing::debug!("Model registry built with {} models", registry.len());
        Ok(registry)
    }

    /// Inherited fields first, then the model's own, in declaration order
    fn resolve_fields(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        resolved: &mut HashMap<String, Vec<FieldDef>>,
    ) -> Result<Vec<FieldDef>, RegistryError> {
        if let Some(fields) = resolved.get(name) {
            return Ok(fields.clone());
        }
        if stack.iter().any(|s| s == name) {
            return Err(RegistryError::InheritanceCycle(name.to_string()));
        }
        let Some(spec) = self.specs.get(name) else {
            let referrer = stack.last().cloned().unwrap_or_default();
            return Err(RegistryError::UnknownReference {
                model: referrer,
                target: name.to_string(),
            });
        };

        stack.push(name.to_string());
        let mut fields = match &spec.extends {
            Some(parent) => self.resolve_fields(parent, stack, resolved)?,
            None => Vec::new(),
        };
        stack.pop();

        for field in &spec.fields {
            fields.push(field_def(name, field)?);
        }

        resolved.insert(name.to_string(), fields.clone());
        Ok(fields)
    }
}

fn field_def(model: &str, spec: &FieldSpec) -> Result<FieldDef, RegistryError> {
    let mut ty = TypeRef::parse(&spec.type_expr)?;
    if let Some(values) = &spec.enum_values {
        let unknown = spec
            .unknown
            .clone()
            .unwrap_or_else(|| UNKNOWN_ENUM_VALUE.to_string());
        ty = ty
            .with_enum(values.clone(), unknown)
            .map_err(|message| RegistryError::InvalidField {
                model: model.to_string(),
                field: spec.name.clone(),
                message,
            })?;
    }

    Ok(FieldDef {
        logical: spec.name.clone(),
        wire: spec
            .wire
            .clone()
            .unwrap_or_else(|| spec.name.to_case(Case::Camel)),
        ty,
        required: spec.required,
        nullable: spec.nullable,
        default: spec.default.clone(),
    })
}

fn check_unique(model: &str, fields: &[FieldDef]) -> Result<(), RegistryError> {
    for (i, field) in fields.iter().enumerate() {
        let earlier = &fields[..i];
        if earlier.iter().any(|f| f.wire == field.wire) {
            return Err(RegistryError::DuplicateWireName {
                model: model.to_string(),
                wire: field.wire.clone(),
            });
        }
        if earlier.iter().any(|f| f.logical == field.logical) {
            return Err(RegistryError::DuplicateLogicalName {
                model: model.to_string(),
                logical: field.logical.clone(),
            });
        }
    }
    Ok(())
}

impl Registry {
    /// Validate discriminator mappings and record each member's value
    fn link_groups(&mut self) -> Result<(), RegistryError> {
        let mut assignments = Vec::new();
        for base in self.models.values() {
            let Some(discriminator) = &base.discriminator else {
                continue;
            };
            for (value, member) in &discriminator.mapping {
                if !self.models.contains_key(member) {
                    return Err(RegistryError::UnknownReference {
                        model: base.name.clone(),
                        target: member.clone(),
                    });
                }
                if member == &base.name || !self.is_subtype(member, &base.name) {
                    return Err(RegistryError::NotASubtype {
                        base: base.name.clone(),
                        value: value.clone(),
                        member: member.clone(),
                    });
                }
                assignments.push((member.clone(), value.clone()));
            }
        }

        for (member, value) in assignments {
            if let Some(def) = self.models.get_mut(&member) {
                def.discriminator_value = Some(value);
            }
        }
        Ok(())
    }

    fn check_references(&self) -> Result<(), RegistryError> {
        for def in self.models.values() {
            for field in &def.fields {
                for target in field.ty.model_refs() {
                    if !self.models.contains_key(target) {
                        return Err(RegistryError::UnknownReference {
                            model: def.name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Global registry loaded from the embedded descriptors
static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Get the model registry (built from embedded descriptors on first access)
pub fn get_registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        Registry::embedded()
            .unwrap_or_else(|e| panic!("Failed to build embedded model registry: {}", e))
    })
}

/// Get a model descriptor by name
pub fn get_model(name: &str) -> Option<&'static ModelDef> {
    get_registry().model(name)
}

/// Get all model names (for listings and autocomplete)
pub fn get_all_model_names() -> Vec<&'static str> {
    get_registry().model_names()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::PrimitiveKind;
    use serde_json::json;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(!registry.is_empty(), "Registry should have models");
    }

    #[test]
    fn test_wire_names_default_to_camel_case() {
        let vcn = get_model("Vcn").expect("Vcn should exist");
        let field = vcn.field("compartment_id").expect("compartment_id field");
        assert_eq!(field.wire, "compartmentId");
        assert_eq!(field.ty, TypeRef::Primitive(PrimitiveKind::String));
    }

    #[test]
    fn test_subtypes_inherit_base_fields() {
        let base = get_model("WebAppFirewallPolicyRule").unwrap();
        let protection = get_model("ProtectionRule").unwrap();
        for field in &base.fields {
            assert!(
                protection.field(&field.logical).is_some(),
                "ProtectionRule should inherit {}",
                field.logical
            );
        }
        assert_eq!(protection.discriminator_value.as_deref(), Some("PROTECTION"));
        assert!(get_registry().is_subtype("ProtectionRule", "WebAppFirewallPolicyRule"));
        assert!(!get_registry().is_subtype("WebAppFirewallPolicyRule", "ProtectionRule"));
    }

    #[test]
    fn test_polymorphic_group_lists_members() {
        let group = get_registry().group("UnifiedAgentParser").expect("parser group");
        assert_eq!(group.field, "parserType");
        assert!(group.members.len() >= 12);
        assert!(group.members.iter().any(|(value, def)| *value == "GROK"
            && def.name == "UnifiedAgentGrokParser"));
    }

    #[test]
    fn test_dispatch() {
        let registry = get_registry();
        let base = registry.model("WebAppFirewallPolicyRule").unwrap();

        let raw = json!({"type": "ACCESS_CONTROL"});
        let dispatch = registry.dispatch(base, raw.as_object().unwrap());
        assert!(matches!(dispatch, Dispatch::Concrete(def) if def.name == "AccessControlRule"));

        let raw = json!({"type": "SOMETHING_NEW"});
        let dispatch = registry.dispatch(base, raw.as_object().unwrap());
        assert!(matches!(dispatch, Dispatch::Fallback(def) if def.name == "WebAppFirewallPolicyRule"));

        let vcn = registry.model("Vcn").unwrap();
        let dispatch = registry.dispatch(vcn, raw.as_object().unwrap());
        assert!(matches!(dispatch, Dispatch::Plain(_)));
    }

    #[test]
    fn test_new_instance_presets_discriminator() {
        let instance = get_registry().new_instance("RequestRateLimitingRule").unwrap();
        assert_eq!(
            instance.get("type").and_then(|v| v.as_str()),
            Some("REQUEST_RATE_LIMITING")
        );
        assert!(get_registry().new_instance("Vcn").unwrap().is_empty());
        assert!(get_registry().new_instance("Nope").is_none());
    }

    #[test]
    fn test_duplicate_wire_name_rejected() {
        let mut builder = Registry::builder();
        builder
            .add_json(
                "dup.json",
                r#"{"models": {"A": {"fields": [
                    {"name": "display_name", "type": "String"},
                    {"name": "label", "wire": "displayName", "type": "String"}
                ]}}}"#,
            )
            .unwrap();
        assert_eq!(
            builder.build().unwrap_err(),
            RegistryError::DuplicateWireName {
                model: "A".to_string(),
                wire: "displayName".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let mut builder = Registry::builder();
        builder
            .add_json(
                "ref.json",
                r#"{"models": {"A": {"fields": [{"name": "b", "type": "Array<B>"}]}}}"#,
            )
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(RegistryError::UnknownReference { target, .. }) if target == "B"
        ));
    }

    #[test]
    fn test_inheritance_cycle_rejected() {
        let mut builder = Registry::builder();
        builder
            .add_json(
                "cycle.json",
                r#"{"models": {"A": {"extends": "B"}, "B": {"extends": "A"}}}"#,
            )
            .unwrap();
        assert!(matches!(builder.build(), Err(RegistryError::InheritanceCycle(_))));
    }

    #[test]
    fn test_mapping_to_non_subtype_rejected() {
        let mut builder = Registry::builder();
        builder
            .add_json(
                "group.json",
                r#"{"models": {
                    "Base": {"discriminator": {"field": "kind", "mapping": {"X": "Other"}},
                             "fields": [{"name": "kind", "type": "String"}]},
                    "Other": {"fields": []}
                }}"#,
            )
            .unwrap();
        assert!(matches!(builder.build(), Err(RegistryError::NotASubtype { .. })));
    }

    #[test]
    fn test_yaml_sources() {
        let mut builder = Registry::builder();
        builder
            .add_yaml(
                "extra.yaml",
                "models:\n  Tag:\n    fields:\n      - name: tag_key\n        type: String\n        required: true\n",
            )
            .unwrap();
        let registry = builder.build().unwrap();
        assert_eq!(registry.model("Tag").unwrap().fields[0].wire, "tagKey");
    }

    #[test]
    fn test_duplicate_model_across_sources_rejected() {
        let mut builder = Registry::builder();
        builder.add_embedded().unwrap();
        let err = builder
            .add_json("again.json", r#"{"models": {"Vcn": {}}}"#)
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateModel("Vcn".to_string()));
    }
}
