// Shared submission types - used by both the review and clinic flows.
//
// Every write in this system goes through a store port and comes back as
// either a record id or a StoreError. The caller-facing shape is always
// SubmissionResponse; the detailed error stays in the logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by any persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Backend rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Store configuration error: {0}")]
    ConfigError(String),
}

/// Identifier handed back by a store after an insert.
///
/// SQLite hands out integers, the hosted backend hands out UUIDs, so we keep
/// the textual form and let each store decide what it means.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// What the end user gets back from any submit action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: String,
}

impl SubmissionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_from_integer() {
        let id = RecordId::from(42);
        assert_eq!(id.as_str(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_response_serializes_to_success_message_shape() {
        let json = serde_json::to_value(SubmissionResponse::failed("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "message": "nope" }));
    }
}
