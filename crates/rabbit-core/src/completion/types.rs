//! ============================================================================
//! Completion Types - Request description and OpenAI-compatible wire format
//! ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RabbitError, Result};
use crate::types::{validate_endpoint, Settings};

/// Token cap sent with every transform request
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// One chat-completion call, built fresh per user action
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    /// Serialized as JSON into the single user message
    pub user_payload: Value,
    /// Ask for a streamed body even without a chunk callback
    pub stream: bool,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Request using the endpoint, model and system prompt from settings
    pub fn from_settings(settings: &Settings, user_payload: Value) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            system_prompt: settings.system_prompt.clone(),
            user_payload,
            stream: false,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Reject bad credentials/parameters before anything touches the network
    pub fn validate(&self) -> Result<()> {
        let errors = validate_endpoint(&self.api_key, &self.base_url, &self.model, self.temperature);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RabbitError::Configuration(errors.join("; ")))
        }
    }

    pub fn endpoint_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim().trim_end_matches('/'))
    }

    /// Wire body: fixed system message plus the JSON-encoded payload as user message
    pub fn to_chat_request(&self, stream: bool) -> Result<ChatRequest> {
        let user_content = serde_json::to_string(&self.user_payload)?;

        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::new("system", self.system_prompt.clone()),
                ChatMessage::new("user", user_content),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        })
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// `choices[0].message.content`, if present and non-empty
    pub fn first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty())
    }
}

/// One `data:` frame of a streamed response
#[derive(Debug, Deserialize)]
pub(crate) struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChoice {
    #[serde(default)]
    pub delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    /// `choices[0].delta.content`, if present and non-empty
    pub fn first_delta(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        let settings = Settings {
            api_key: "sk-test".into(),
            ..Settings::default()
        };
        CompletionRequest::from_settings(&settings, json!({"mode": "rewrite", "text": "hi"}))
    }

    #[test]
    fn test_wire_body_shape() {
        let body = request().to_chat_request(true).unwrap();
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["max_tokens"], 2000);
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");

        // User content is the JSON text of the payload
        let user: Value =
            serde_json::from_str(value["messages"][1]["content"].as_str().unwrap()).unwrap();
        assert_eq!(user["mode"], "rewrite");
    }

    #[test]
    fn test_string_payload_is_json_quoted() {
        let req = request().to_chat_request(false).unwrap();
        let plain = CompletionRequest {
            user_payload: Value::String("Test connection".into()),
            ..request()
        }
        .to_chat_request(false)
        .unwrap();

        assert_ne!(req.messages[1].content, plain.messages[1].content);
        assert_eq!(plain.messages[1].content, "\"Test connection\"");
    }

    #[test]
    fn test_endpoint_url_tolerates_trailing_slash() {
        let mut req = request();
        req.base_url = "https://example.test/v1/".into();
        assert_eq!(req.endpoint_url(), "https://example.test/v1/chat/completions");
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut req = request();
        req.api_key.clear();
        req.temperature = -0.1;

        match req.validate() {
            Err(RabbitError::Configuration(msg)) => {
                assert!(msg.contains("API key is required"));
                assert!(msg.contains("Temperature must be between 0 and 1"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_response_content_extraction() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"done"}}]}"#).unwrap();
        assert_eq!(response.first_content().as_deref(), Some("done"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.first_content().is_none());
    }
}
