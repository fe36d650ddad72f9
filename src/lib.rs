//! Typed model registry and JSON codec for generated cloud SDK clients
//!
//! - [`model`] - descriptors, polymorphic dispatch and the JSON codec
//! - [`services`] - closed Rust types for selected polymorphic groups
//! - [`transport`] - HTTP client that speaks registry models
//! - [`config`] - persisted user settings

pub mod config;
pub mod model;
pub mod services;
pub mod transport;

pub use config::Config;
pub use model::{build, deserialize, serialize, FieldValue, Instance, Registry};
