use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Message;

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 2000;

/// A chat completion request as received from a caller. Optional fields are
/// kept optional so the relay can tell "not supplied" apart from an explicit
/// value; defaults are applied only when the outbound payload is built.
/// Fields this layer does not know about are captured in `extra` and
/// forwarded untouched.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatCompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        ChatCompletionRequest {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            stream: None,
            extra: Map::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Build the payload actually sent upstream. `force_stream` is set by the
    /// streaming relay, which enables streaming regardless of the caller's
    /// flag.
    pub fn outbound(&self, default_model: &str, force_stream: bool) -> OutboundChatRequest {
        OutboundChatRequest {
            messages: self.messages.clone(),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            stream: force_stream || self.stream.unwrap_or(false),
            extra: self.extra.clone(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct OutboundChatRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
