//! Bridge error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of any bridge call.
///
/// Covers both errors the backend reports (a parse failure, a custom action
/// that raised) and transport failures (process gone, malformed frame).
/// The text is what gets shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{error_text}")]
pub struct BackendError {
    #[serde(rename = "errorText", alias = "error_text")]
    pub error_text: String,
}

impl BackendError {
    pub fn new(error_text: impl Into<String>) -> Self {
        Self {
            error_text: error_text.into(),
        }
    }

    /// The connection to the backend is gone.
    pub fn disconnected() -> Self {
        Self::new("backend connection closed")
    }

    /// The backend sent something we could not decode.
    pub fn protocol(detail: impl std::fmt::Display) -> Self {
        Self::new(format!("protocol error: {detail}"))
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        Self::new(format!("IO error: {e}"))
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::protocol(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_is_error_text() {
        assert_eq!(BackendError::new("corrupt").to_string(), "corrupt");
    }

    #[test]
    fn test_wire_field_name() {
        let err: BackendError = serde_json::from_value(json!({"errorText": "corrupt"})).unwrap();
        assert_eq!(err.error_text, "corrupt");
        let err: BackendError = serde_json::from_value(json!({"error_text": "x"})).unwrap();
        assert_eq!(err.error_text, "x");
        assert_eq!(
            serde_json::to_value(BackendError::new("y")).unwrap(),
            json!({"errorText": "y"})
        );
    }
}
