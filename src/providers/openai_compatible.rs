use super::{ChatProvider, ChatRequest, DeltaStream};
use crate::core::error::PluginError;
use crate::providers::base_client::HttpClient;
use crate::stream::delta_stream;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const COMPLETIONS_PATH: &str = "chat/completions";

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Extract `choices[0].message.content` from a non-streaming response body.
pub fn parse_completion(body: &str) -> Result<String, PluginError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| PluginError::Decode(format!("Failed to parse response: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| PluginError::Decode("No choices in API response".to_string()))
}

#[derive(Clone)]
pub struct OpenAICompatibleProvider {
    client: HttpClient,
}

impl OpenAICompatibleProvider {
    pub fn new(
        base_url: String,
        api_key: String,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            client: HttpClient::new(base_url, api_key, extra_headers),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAICompatibleProvider {
    async fn get_response(&self, request: &ChatRequest) -> Result<String, PluginError> {
        let payload = ChatRequest {
            stream: false,
            ..request.clone()
        };

        let response = self.client.post(COMPLETIONS_PATH, &payload).await?;
        let response_body: String = response.text().await?;
        parse_completion(&response_body)
    }

    async fn get_response_stream(&self, request: &ChatRequest) -> Result<DeltaStream, PluginError> {
        let payload = ChatRequest {
            stream: true,
            ..request.clone()
        };

        let response = self.client.post(COMPLETIONS_PATH, &payload).await?;
        Ok(delta_stream(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatMessage;

    #[test]
    fn parses_non_streaming_body() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "hello");
    }

    #[test]
    fn empty_choices_is_an_error() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(PluginError::Decode(_))
        ));
    }

    #[test]
    fn null_content_reads_as_empty() {
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "");
    }

    #[test]
    fn request_body_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            temperature: 0.5,
            stream: true,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "hi"}],
                "temperature": 0.5,
                "stream": true
            })
        );
    }
}
