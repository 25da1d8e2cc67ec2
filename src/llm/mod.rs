//! LLM access: conversation types and the chat completion client.

mod openai;
mod types;

use async_trait::async_trait;

pub use openai::OpenAiClient;
pub use types::{
    normalize_content, ChatMessage, ChatResponse, FunctionCall, FunctionRequest, FunctionSchema,
    ToolCall, ToolCallRequest, ToolSchema,
};

/// A chat model that can be offered tools.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion over the full conversation.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse>;
}
