//! Typed service models
//!
//! Hand-written Rust types layered over the registry instances for service
//! groups that callers match on directly.

pub mod waf;
