use crate::core::error::PluginError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub mod base_client;
pub mod factory;
pub mod openai_compatible;

pub use factory::ProviderFactory;
pub use openai_compatible::OpenAICompatibleProvider;

/// Content deltas of a streamed answer, batched per network chunk.
pub type DeltaStream = BoxStream<'static, Result<Vec<String>, PluginError>>;

/// One `{role, content}` entry of the request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub stream: bool,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a non-streaming request and return the full response text.
    async fn get_response(&self, request: &ChatRequest) -> Result<String, PluginError>;

    /// Send a streaming request and return the content deltas.
    async fn get_response_stream(&self, request: &ChatRequest) -> Result<DeltaStream, PluginError>;
}
