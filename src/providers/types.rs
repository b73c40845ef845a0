use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::OpenAiErrorResponse;
use crate::models::{Message, Role};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{}", describe_failure(.status, .body))]
    RequestFailed { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

fn describe_failure(status: &u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<OpenAiErrorResponse>(body) {
        return format!("HTTP {}: {}", status, parsed.error.message);
    }
    if body.trim().is_empty() {
        format!("HTTP {}: Request failed", status)
    } else {
        format!("HTTP {}: {}", status, body.trim())
    }
}

/// A message as it goes over the wire: no timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub user: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}
