//! Lenient lookups that substitute a default instead of failing.
//!
//! Template resolution, timezone parsing and multi-select decoding never
//! reject a request; they return [`Fallback::Defaulted`] with the reason so the
//! caller can see (and log) that the default was used.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No value was supplied.
    Missing,
    /// A value was supplied but could not be parsed.
    Malformed,
    /// The value parsed but refers to nothing that exists.
    NotFound,
    /// The value refers to something owned by another user.
    NotVisible,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fallback<T> {
    Exact(T),
    Defaulted { value: T, reason: FallbackReason },
}

impl<T> Fallback<T> {
    pub fn defaulted(value: T, reason: FallbackReason) -> Self {
        Fallback::Defaulted { value, reason }
    }

    pub fn value(&self) -> &T {
        match self {
            Fallback::Exact(value) | Fallback::Defaulted { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Fallback::Exact(value) | Fallback::Defaulted { value, .. } => value,
        }
    }

    pub fn reason(&self) -> Option<FallbackReason> {
        match self {
            Fallback::Exact(_) => None,
            Fallback::Defaulted { reason, .. } => Some(*reason),
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Fallback::Defaulted { .. })
    }
}
