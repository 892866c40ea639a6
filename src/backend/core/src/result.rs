//! Result Envelope (§3, §4.8, §6) — the common success/error container
//! returned by every user-facing core entry point.
//!
//! Two disjoint failure classes exist (§7): *expected states* come back as
//! an envelope with `status = error` and a registered `code`; *system
//! errors* are raised as [`crate::error::CoreError`]. This module is the
//! former half of that split.
//!
//! `is_ok()`/`is_error()` are the only supported status checks, and
//! [`ResultEnvelope::success`]/[`ResultEnvelope::fail`] are the only
//! factories — §3's ownership note says direct field mutation is reserved
//! for extension fields, which here means the `extra` map only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The open-but-registered exit-code taxonomy from §6. Kept as a string
/// newtype (not an enum) because §6 explicitly calls the taxonomy "open" —
/// plugins may mint their own codes — while still special-casing the
/// registered literals for easy construction and matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub String);

macro_rules! registered_codes {
    ($($const_name:ident => $lit:literal),+ $(,)?) => {
        impl StatusCode {
            $(pub const $const_name: &'static str = $lit;)+
        }
    };
}

registered_codes! {
    EMPTY => "empty",
    INVALID => "invalid",
    NOT_FOUND => "not_found",
    PARTIAL => "partial",
    DUPLICATE => "duplicate",
    DUPLICATE_MERGED => "duplicate_merged",
    NOT_HANDLED => "not_handled",
    NO_RESULTS => "no_results",
    DEGRADED => "degraded",
    CACHE_MISS => "cache_miss",
    ALREADY_EXISTS => "already_exists",
    INVALID_SPEC => "invalid_spec",
    PARTIAL_RESULTS => "partial_results",
}

impl StatusCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StatusCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `status` discriminant of a [`ResultEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Machine-readable detail attached to an envelope: a code, a human message,
/// and a free-form context map (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDetail {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl StatusDetail {
    pub fn new(code: impl Into<StatusCode>) -> Self {
        Self {
            code: code.into(),
            message: None,
            context: HashMap::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }
}

impl From<&str> for StatusDetail {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// The common success/error envelope (§3). `extra` carries
/// operation-specific fields that don't belong in `detail` — callers may
/// mutate it directly; every other field is set only through the factory
/// constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<StatusDetail>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ResultEnvelope {
    /// Construct a success envelope. `detail` may still carry a "partial
    /// success" code (e.g. [`StatusCode::PARTIAL`]) without flipping
    /// `status` to error — that asymmetry is deliberate (§4.8).
    pub fn success(detail: impl Into<Option<StatusDetail>>) -> Self {
        Self {
            status: Status::Success,
            detail: detail.into(),
            extra: HashMap::new(),
        }
    }

    /// Construct an error envelope. Always forces `status = error`,
    /// regardless of what `detail` contains.
    pub fn fail(detail: impl Into<StatusDetail>) -> Self {
        Self {
            status: Status::Error,
            detail: Some(detail.into()),
            extra: HashMap::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, Status::Success)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, Status::Error)
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.extra.insert(key.into(), v);
        }
        self
    }

    /// Convenience for the single most common shape: success with no detail.
    pub fn ok() -> Self {
        Self::success(None)
    }
}

impl From<Option<StatusDetail>> for ResultEnvelope {
    fn from(detail: Option<StatusDetail>) -> Self {
        Self::success(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_error_with_empty_code() {
        let envelope = ResultEnvelope::fail(StatusDetail::new(StatusCode::EMPTY));
        assert!(envelope.is_error());
        assert_eq!(envelope.detail.unwrap().code.as_str(), "empty");
    }

    #[test]
    fn success_can_carry_partial_detail_without_flipping_status() {
        let envelope = ResultEnvelope::success(Some(StatusDetail::new(StatusCode::PARTIAL)));
        assert!(envelope.is_ok());
        assert_eq!(envelope.detail.unwrap().code.as_str(), "partial");
    }

    #[test]
    fn fail_forces_error_status_even_with_arbitrary_code() {
        let envelope = ResultEnvelope::fail("duplicate_merged");
        assert!(envelope.is_error());
        assert!(!envelope.is_ok());
    }

    #[test]
    fn extra_fields_survive_serialization() {
        let envelope = ResultEnvelope::ok().with_extra("count", 3);
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: ResultEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.extra.get("count").and_then(|v| v.as_u64()), Some(3));
    }
}
