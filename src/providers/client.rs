use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;

use super::models::OpenAiResponse;
use super::traits::{ChunkStream, CompletionTransport};
use super::types::{CompletionRequest, ProviderError};

/// Talks to a single OpenAI-compatible `chat/completions` endpoint.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    fn build_auth_header(api_key: &str) -> Option<String> {
        let key = api_key.trim();
        if key.is_empty() {
            None
        } else if key.starts_with("Bearer ") {
            Some(key.to_string())
        } else {
            Some(format!("Bearer {}", key))
        }
    }

    async fn post(&self, request: &CompletionRequest) -> Result<reqwest::Response, ProviderError> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(request);

        if request.stream {
            req = req.header(ACCEPT, "text/event-stream");
        }
        if let Some(auth) = Self::build_auth_header(&self.api_key) {
            req = req.header(AUTHORIZATION, auth);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "Sending completion request"
        );

        let response = req
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ProviderError> {
        let response = self.post(request).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ProviderError::NetworkError(format!("Stream error: {}", e))))
            .boxed())
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let response = self.post(request).await?;
        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("No content in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::providers::ChatMessage;

    #[test]
    fn test_auth_header_prefixes_bare_key() {
        assert_eq!(
            HttpTransport::build_auth_header("sk-123").as_deref(),
            Some("Bearer sk-123")
        );
    }

    #[test]
    fn test_auth_header_keeps_bearer_token() {
        assert_eq!(
            HttpTransport::build_auth_header("Bearer sk-123").as_deref(),
            Some("Bearer sk-123")
        );
        assert_eq!(HttpTransport::build_auth_header("  "), None);
    }

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest {
            model: "m".to_string(),
            user: "user_id".to_string(),
            messages: vec![ChatMessage::new(Role::User, "Hi")],
            stream: true,
            temperature: None,
            max_tokens: None,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "m",
                "user": "user_id",
                "messages": [{ "role": "user", "content": "Hi" }],
                "stream": true
            })
        );
    }

    #[test]
    fn test_request_failed_display() {
        let err = ProviderError::RequestFailed {
            status: 401,
            body: r#"{"error":{"message":"bad key"}}"#.to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 401: bad key");

        let err = ProviderError::RequestFailed {
            status: 502,
            body: "upstream down".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: upstream down");
    }
}
