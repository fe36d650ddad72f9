//! Descriptor types
//!
//! Raw descriptor file shapes (as read from JSON/YAML) and the resolved
//! descriptor tables the codec walks.

use super::error::RegistryError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel substituted for enum values outside the allowed set
pub const UNKNOWN_ENUM_VALUE: &str = "UNKNOWN_ENUM_VALUE";

/// Scalar kinds a field (or map key) can be declared as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    Date,
    /// Untyped JSON blob (`Object` in generator type expressions)
    Object,
}

impl PrimitiveKind {
    /// Look up a primitive by its generator type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "String" | "string" => Some(Self::String),
            "Integer" | "integer" | "Long" => Some(Self::Integer),
            "Float" | "float" | "Double" => Some(Self::Float),
            "Boolean" | "BOOLEAN" | "boolean" => Some(Self::Boolean),
            "DateTime" | "datetime" => Some(Self::DateTime),
            "Date" | "date" => Some(Self::Date),
            "Object" | "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
            Self::Date => "Date",
            Self::Object => "Object",
        }
    }
}

/// Closed set of allowed values for an enum-typed field
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    /// String or Integer
    pub base: PrimitiveKind,
    pub allowed: Vec<Value>,
    pub unknown: String,
}

impl EnumDef {
    pub fn contains(&self, value: &Value) -> bool {
        super::enum_guard::is_allowed(value, &self.allowed)
    }
}

/// Declared semantic type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Primitive(PrimitiveKind),
    Composite(String),
    ArrayOf(Box<TypeRef>),
    MapOf(PrimitiveKind, Box<TypeRef>),
    EnumOf(EnumDef),
}

impl TypeRef {
    /// Parse a generator type expression such as `Array<String>`,
    /// `Hash<String, Hash<String, Object>>` or `OCI::Waf::Models::ProtectionRule`.
    pub fn parse(expr: &str) -> Result<Self, RegistryError> {
        let mut parser = TypeParser { input: expr, pos: 0 };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != expr.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }

    /// Restrict the innermost scalar of this type to a closed value set
    pub fn with_enum(self, allowed: Vec<Value>, unknown: String) -> Result<Self, String> {
        match self {
            TypeRef::Primitive(base @ (PrimitiveKind::String | PrimitiveKind::Integer)) => {
                Ok(TypeRef::EnumOf(EnumDef {
                    base,
                    allowed,
                    unknown,
                }))
            }
            TypeRef::ArrayOf(inner) => Ok(TypeRef::ArrayOf(Box::new(
                inner.with_enum(allowed, unknown)?,
            ))),
            TypeRef::MapOf(key, inner) => Ok(TypeRef::MapOf(
                key,
                Box::new(inner.with_enum(allowed, unknown)?),
            )),
            other => Err(format!("enum values cannot restrict {}", other)),
        }
    }

    /// Names of all models referenced anywhere inside this type
    pub fn model_refs(&self) -> Vec<&str> {
        match self {
            TypeRef::Composite(name) => vec![name.as_str()],
            TypeRef::ArrayOf(inner) | TypeRef::MapOf(_, inner) => inner.model_refs(),
            TypeRef::Primitive(_) | TypeRef::EnumOf(_) => Vec::new(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(kind) => write!(f, "{}", kind.name()),
            TypeRef::Composite(name) => write!(f, "{}", name),
            TypeRef::ArrayOf(inner) => write!(f, "Array<{}>", inner),
            TypeRef::MapOf(key, inner) => write!(f, "Hash<{}, {}>", key.name(), inner),
            TypeRef::EnumOf(def) => write!(f, "Enum<{}>[{} values]", def.base.name(), def.allowed.len()),
        }
    }
}

struct TypeParser<'a> {
    input: &'a str,
    pos: usize,
}

impl TypeParser<'_> {
    fn error(&self, message: &str) -> RegistryError {
        RegistryError::InvalidType {
            expr: self.input.to_string(),
            message: format!("{} at offset {}", message, self.pos),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.input[self.pos..].chars().next().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), RegistryError> {
        self.skip_ws();
        if self.input[self.pos..].starts_with(ch) {
            self.pos += ch.len_utf8();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", ch)))
        }
    }

    fn ident(&mut self) -> Result<&str, RegistryError> {
        self.skip_ws();
        let start = self.pos;
        let rest = &self.input[start..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ':'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a type name"));
        }
        self.pos += len;
        Ok(&self.input[start..start + len])
    }

    fn parse_type(&mut self) -> Result<TypeRef, RegistryError> {
        let ident = self.ident()?;
        match ident {
            "Array" => {
                self.expect('<')?;
                let inner = self.parse_type()?;
                self.expect('>')?;
                Ok(TypeRef::ArrayOf(Box::new(inner)))
            }
            "Hash" | "Map" => {
                self.expect('<')?;
                let key_name = self.ident()?;
                let key = match PrimitiveKind::from_name(key_name) {
                    Some(PrimitiveKind::Object) | None => {
                        return Err(self.error("map keys must be a scalar primitive"))
                    }
                    Some(kind) => kind,
                };
                self.expect(',')?;
                let inner = self.parse_type()?;
                self.expect('>')?;
                Ok(TypeRef::MapOf(key, Box::new(inner)))
            }
            other => Ok(match PrimitiveKind::from_name(other) {
                Some(kind) => TypeRef::Primitive(kind),
                // Namespaced generator names resolve to their last segment
                None => TypeRef::Composite(other.rsplit("::").next().unwrap_or(other).to_string()),
            }),
        }
    }
}

// =============================================================================
// Descriptor file shapes
// =============================================================================

/// Root structure of a descriptor file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DescriptorFile {
    #[serde(default)]
    pub models: BTreeMap<String, ModelSpec>,
}

/// Model entry in a descriptor file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModelSpec {
    /// Base model whose fields are inherited
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub discriminator: Option<DiscriminatorSpec>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscriminatorSpec {
    /// Wire name of the discriminator field
    pub field: String,
    pub mapping: BTreeMap<String, String>,
}

/// Field entry in a descriptor file
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub wire: Option<String>,
    #[serde(rename = "type")]
    pub type_expr: String,
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default)]
    pub unknown: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

// =============================================================================
// Resolved descriptors
// =============================================================================

/// One attribute of a model
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub logical: String,
    pub wire: String,
    pub ty: TypeRef,
    pub required: bool,
    pub nullable: bool,
    /// Applied only when the key is absent from the input
    pub default: Option<Value>,
}

/// Discriminator of a polymorphic base model
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
    /// Wire name
    pub field: String,
    /// Discriminator value -> concrete model name
    pub mapping: BTreeMap<String, String>,
}

/// Resolved descriptor of one composite type, inherited fields included
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    pub name: String,
    pub parent: Option<String>,
    pub fields: Vec<FieldDef>,
    pub discriminator: Option<Discriminator>,
    /// Set when this model is a concrete member of a polymorphic group
    pub discriminator_value: Option<String>,
}

impl ModelDef {
    pub fn field(&self, logical: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.logical == logical)
    }

    pub fn field_by_wire(&self, wire: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.wire == wire)
    }

    pub fn is_polymorphic(&self) -> bool {
        self.discriminator.is_some()
    }
}
