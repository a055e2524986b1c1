use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod chat_request;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Error envelope returned to relay callers, mirroring the upstream
/// `{ error, details }` shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn upstream(status: u16, details: Value) -> Self {
        ErrorResponse {
            error: format!("Gaia API Error: {}", status),
            details: Some(details),
            message: None,
        }
    }

    pub fn configuration() -> Self {
        ErrorResponse {
            error: "Gaia API key is not configured".to_string(),
            details: None,
            message: None,
        }
    }

    pub fn internal(message: String) -> Self {
        ErrorResponse {
            error: "Internal Server Error".to_string(),
            details: None,
            message: Some(message),
        }
    }
}
