//! Failure classification shared across the subsystem
//!
//! Every service crate defines its own error enum, but user-visible failures
//! all collapse onto the small set of kinds below. Transport layers map a
//! kind onto a status code; internal kinds never leak storage detail to
//! non-admin callers.

use serde::{Deserialize, Serialize};

/// Classification of a service failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed input
    Validation,
    /// Referenced report, account, or content does not exist
    NotFound,
    /// The operation collides with existing state (duplicate report,
    /// already blocked, already resolved)
    Conflict,
    /// The caller is not allowed to perform this operation
    Forbidden,
    /// The operation is valid but policy forbids it for this target
    PolicyViolation,
    /// Storage or collaborator failure; details stay server-side
    Internal,
}

impl ErrorKind {
    /// Stable string form used in logs and wire payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::PolicyViolation => "policy_violation",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
