//! OpenAI-compatible chat completions client.
//!
//! The base URL includes the API version prefix (for example
//! `https://api.openai.com/v1`); only `/chat/completions` is appended.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{ChatMessage, ChatResponse, ToolCallRequest, ToolSchema};
use super::LlmClient;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

const TEMPERATURE: f32 = 0.0;

/// Client for `POST {base}/chat/completions`.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn request_body(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<Value> {
        let mut body = json!({
            "model": model,
            "temperature": TEMPERATURE,
            "messages": messages.iter().map(wire_message).collect::<Vec<_>>(),
        });
        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = serde_json::to_value(tools)?;
        }
        Ok(body)
    }
}

/// Render a message for the wire. The API wants tool-call arguments as a
/// JSON-encoded string, whatever shape the model originally used.
fn wire_message(message: &ChatMessage) -> Value {
    let mut value = serde_json::to_value(message).unwrap_or(Value::Null);
    if let Some(calls) = value.get_mut("tool_calls").and_then(Value::as_array_mut) {
        for call in calls {
            if let Some(arguments) = call.pointer_mut("/function/arguments") {
                *arguments = match arguments.take() {
                    Value::String(s) => Value::String(s),
                    Value::Null => Value::String("{}".to_string()),
                    other => Value::String(other.to_string()),
                };
            }
        }
    }
    value
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Value,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(model, messages, tools)?;

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion failed with {}: {}", status, error_text);
        }

        let parsed: CompletionResponse = response.json().await?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("Chat completion returned no choices"))?;

        Ok(ChatResponse {
            content: message.content,
            tool_calls: message.tool_calls.unwrap_or_default(),
        })
    }
}
