use thiserror::Error;

/// Errors raised while building a descriptor registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("failed to parse descriptor source '{source_name}': {message}")]
    Parse {
        source_name: String,
        message: String,
    },
    #[error("failed to read descriptor source '{path}': {message}")]
    Io { path: String, message: String },

    #[error("invalid type expression '{expr}': {message}")]
    InvalidType { expr: String, message: String },
    #[error("model '{model}' field '{field}': {message}")]
    InvalidField {
        model: String,
        field: String,
        message: String,
    },

    #[error("model '{0}' is defined more than once")]
    DuplicateModel(String),
    #[error("model '{model}' declares wire name '{wire}' more than once")]
    DuplicateWireName { model: String, wire: String },
    #[error("model '{model}' declares field '{logical}' more than once")]
    DuplicateLogicalName { model: String, logical: String },

    #[error("model '{model}' references unknown model '{target}'")]
    UnknownReference { model: String, target: String },
    #[error("model '{0}' has a cyclic inheritance chain")]
    InheritanceCycle(String),
    #[error("model '{model}' discriminator field '{field}' is not one of its fields")]
    MissingDiscriminatorField { model: String, field: String },
    #[error("discriminator value '{value}' of '{base}' maps to '{member}', which does not extend it")]
    NotASubtype {
        base: String,
        value: String,
        member: String,
    },
}

/// Error when both the logical and the wire key are given for one field
/// during request construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("model '{model}': both '{logical}' and '{wire}' were given for the same field")]
pub struct AmbiguousInputError {
    pub model: String,
    pub logical: String,
    pub wire: String,
}

/// Malformed input while turning JSON into typed values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeserializeError {
    #[error("{path}: unknown model '{model}'")]
    UnknownModel { path: String, model: String },
    #[error("{path}: expected {expected}, found {found}")]
    UnexpectedShape {
        path: String,
        expected: String,
        found: &'static str,
    },
    #[error("{path}: cannot coerce {value} to {expected}")]
    InvalidValue {
        path: String,
        expected: &'static str,
        value: String,
    },
    #[error("{path}: map key '{key}' collides with an earlier key")]
    DuplicateKey { path: String, key: String },
    #[error("{path}: {source}")]
    Ambiguous {
        path: String,
        #[source]
        source: AmbiguousInputError,
    },
}

impl DeserializeError {
    /// Field path of the offending value (`$` is the document root)
    pub fn path(&self) -> &str {
        match self {
            Self::UnknownModel { path, .. }
            | Self::UnexpectedShape { path, .. }
            | Self::InvalidValue { path, .. }
            | Self::DuplicateKey { path, .. }
            | Self::Ambiguous { path, .. } => path,
        }
    }
}

/// Errors raised while turning typed values into JSON.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializeError {
    #[error("{path}: unknown model '{model}'")]
    UnknownModel { path: String, model: String },
}

/// Errors converting between registry instances and typed service models.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("{model}: required field '{field}' is not set")]
    MissingField { model: String, field: String },
    #[error("{model}: field '{field}' holds {found}, expected {expected}")]
    WrongType {
        model: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected an instance of '{expected}', got '{found}'")]
    WrongModel { expected: String, found: String },
}

/// Top-level error type for codec operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
