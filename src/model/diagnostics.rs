//! Diagnostics sinks
//!
//! The codec never logs on its own when a payload is degraded (unknown enum
//! member, unknown polymorphic subtype, skipped collection). Callers inject a
//! sink to observe those events; the default one discards them.

use serde_json::Value;
use std::fmt;
use std::sync::Mutex;

/// A degraded-but-accepted input event
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// An enum value outside the allowed set was replaced by the sentinel
    UnknownEnumValue {
        path: String,
        value: Value,
        substituted: String,
    },
    /// A discriminator value with no registered subtype; the base was used
    UnknownDiscriminator {
        path: String,
        base: String,
        value: Option<String>,
    },
    /// Input of the wrong shape for a forgiving field was dropped
    Skipped { path: String, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownEnumValue {
                path,
                value,
                substituted,
            } => write!(f, "{}: unknown enum value {}, replaced by {}", path, value, substituted),
            Diagnostic::UnknownDiscriminator { path, base, value } => match value {
                Some(value) => write!(f, "{}: unknown {} subtype \"{}\", decoded as base", path, base, value),
                None => write!(f, "{}: no {} discriminator, decoded as base", path, base),
            },
            Diagnostic::Skipped { path, reason } => write!(f, "{}: skipped, {}", path, reason),
        }
    }
}

/// Receiver of [`Diagnostic`] events
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    fn emit(&self, _diagnostic: Diagnostic) {}
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::UnknownEnumValue {
                path,
                value,
                substituted,
            } => {
                tracing::warn!(
                    "Unknown value {} for enum at {}, using {}",
                    value,
                    path,
                    substituted
                );
            }
            Diagnostic::UnknownDiscriminator { path, base, value } => {
                tracing::warn!(
                    "Unknown subtype {:?} of {} at {}, falling back to base model",
                    value,
                    base,
                    path
                );
            }
            Diagnostic::Skipped { path, reason } => {
                tracing::debug!("Skipped value at {}: {}", path, reason);
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the recorded events, leaving the sink empty
    pub fn take(&self) -> Vec<Diagnostic> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl DiagnosticsSink for RecordingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        match self.events.lock() {
            Ok(mut events) => events.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}
