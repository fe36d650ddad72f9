//! Model abstraction layer
//!
//! This module provides a data-driven approach to the generated SDK models.
//! Model descriptors are loaded from JSON files at compile time, allowing
//! new models to be added without code changes.
//!
//! # Architecture
//!
//! - [`registry`] - Loads, resolves and caches model descriptors
//! - [`deserialize`] - JSON to typed instances, with polymorphic dispatch
//! - [`serialize`] - Typed instances back to wire-format JSON
//! - [`enum_guard`] - Unknown enum members become a sentinel
//! - [`builder`] - Request construction from logical or wire keys
//! - [`validate`] - Required-field and type checks
//!
//! # Descriptor Files
//!
//! Models are defined in JSON files under `src/descriptors/`:
//! - `waf.json` - Web Application Firewall policies, rules and actions
//! - `logging.json` - Log groups and unified agent parsers
//! - `core.json` - VCNs, subnets and security lists
//! - `power.json` - Power Systems instances, pools and volumes
//! - `azure_network.json` - Application gateway probes and SKUs
//!
//! # Example
//!
//! ```ignore
//! use cloudmodels::model::{deserialize, serialize};
//!
//! let rule = deserialize(&payload, "WebAppFirewallPolicyRule")?;
//! assert_eq!(rule.model(), "ProtectionRule");
//! let body = serialize(&rule)?;
//! ```

pub mod builder;
pub mod deserialize;
pub mod diagnostics;
pub mod enum_guard;
pub mod error;
pub mod registry;
pub mod serialize;
pub mod types;
pub mod validate;
pub mod value;

pub use builder::{build, build_in};
pub use deserialize::{deserialize, Deserializer, KeyMode};
pub use diagnostics::{Diagnostic, DiagnosticsSink, NoopSink, RecordingSink, TracingSink};
pub use enum_guard::coerce_enum;
pub use error::{AmbiguousInputError, DeserializeError, Error, RegistryError, SerializeError};
pub use registry::{get_all_model_names, get_model, get_registry, Dispatch, Registry};
pub use serialize::{serialize, Serializer};
pub use types::{FieldDef, ModelDef, PrimitiveKind, TypeRef, UNKNOWN_ENUM_VALUE};
pub use validate::{is_valid, list_invalid_properties};
pub use value::{FieldValue, Instance};
