//! Transport collaborators

pub mod http;

pub use http::{format_api_error, ModelClient};
