//! Result types returned by the handler.

use crate::error::HandlerError;
use serde::{Deserialize, Serialize};

/// Message returned on success.
pub const SUCCESS_MESSAGE: &str = "Uploaded successfully";

/// The JSON body returned to the Lambda runtime.
///
/// ```json
/// { "success": true, "message": "Uploaded successfully" }
/// { "success": false, "error": { "kind": "ConversionError", "message": "…" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// The captured error of a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable tag, e.g. `StoreReadError`.
    pub kind: String,
    pub message: String,
}

impl HandlerResponse {
    pub fn uploaded() -> Self {
        Self {
            success: true,
            message: Some(SUCCESS_MESSAGE.to_string()),
            error: None,
        }
    }

    pub fn failed(err: &HandlerError) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(ErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

/// What one successful invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedObject {
    pub bucket: String,
    pub source_key: String,
    pub output_key: String,
    pub source_bytes: usize,
    pub output_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_shape() {
        let v = serde_json::to_value(HandlerResponse::uploaded()).unwrap();
        assert_eq!(v, json!({ "success": true, "message": "Uploaded successfully" }));
    }

    #[test]
    fn failure_shape() {
        let err = HandlerError::InvalidEvent("event has no records".into());
        let v = serde_json::to_value(HandlerResponse::failed(&err)).unwrap();
        assert_eq!(
            v,
            json!({
                "success": false,
                "error": {
                    "kind": "InvalidEvent",
                    "message": "Invalid event: event has no records"
                }
            })
        );
    }
}
