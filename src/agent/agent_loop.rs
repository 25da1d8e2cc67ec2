//! Core agent loop implementation.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, Credentials, FileTokenCache};
use crate::config::Config;
use crate::endpoint_index::EndpointIndex;
use crate::llm::{ChatMessage, FunctionCall, LlmClient, OpenAiClient, ToolCall, ToolCallRequest};
use crate::tools::ToolRegistry;

use super::prompt::build_system_prompt;
use super::types::{AgentError, AgentRunResult, ToolCallRecord};

pub const DEFAULT_MAX_TURNS: usize = 6;

/// The property audit agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    model: String,
    system_prompt: String,
    max_turns: usize,
}

impl Agent {
    /// Create an agent over an LLM and a tool registry.
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, model: impl Into<String>) -> Self {
        let system_prompt = build_system_prompt(&tools);
        Self {
            llm,
            tools,
            model: model.into(),
            system_prompt,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    /// Wire the API client, tools and chat model from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut client = ApiClient::new(
            Credentials {
                base_url: config.api.base_url.clone(),
                username: config.api.username.clone(),
                password: config.api.password.clone(),
            },
            config.api.client_options(),
        )?;
        if let Some(path) = &config.api.token_cache_path {
            client = client.with_token_cache(Arc::new(FileTokenCache::new(path)));
        }

        let index = config
            .postman_path
            .as_ref()
            .map(|p| Arc::new(EndpointIndex::new(p)));
        let tools = ToolRegistry::for_api(Arc::new(client), index);
        let llm = OpenAiClient::new(&config.openai_api_key, &config.openai_base_url)?;

        Ok(Self::new(Arc::new(llm), tools, &config.default_model).with_max_turns(config.max_turns))
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a fresh conversation.
    pub async fn run(&self, prompt: &str) -> Result<AgentRunResult, AgentError> {
        self.run_with_history(prompt, &[]).await
    }

    /// Continue a conversation persisted from an earlier run.
    pub async fn run_with_history(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<AgentRunResult, AgentError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(prompt));

        let tool_schemas = self.tools.get_tool_schemas();
        let mut records = Vec::new();

        for turn in 0..self.max_turns {
            debug!("Agent turn {}/{}", turn + 1, self.max_turns);

            let response = self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas))
                .await
                .map_err(AgentError::Llm)?;

            let tool_calls = normalize_tool_calls(&response.tool_calls);
            if !tool_calls.is_empty() {
                let text = response.reply_text();
                messages.push(ChatMessage::Assistant {
                    content: (!text.is_empty()).then_some(text),
                    tool_calls: tool_calls.clone(),
                });

                for call in &tool_calls {
                    let name = call.function.name.as_str();
                    debug!("Dispatching tool {} ({})", name, call.id);

                    let outcome = self.tools.execute(name, &call.function.arguments).await;
                    if let Err(e) = &outcome.result {
                        warn!("Tool {} failed: {}", name, e);
                    }

                    let payload = outcome.payload();
                    messages.push(ChatMessage::tool(call.id.clone(), name, payload.to_string()));
                    records.push(ToolCallRecord {
                        tool_name: name.to_string(),
                        arguments: outcome.arguments,
                        endpoint: outcome.endpoint,
                        result: payload,
                    });
                }

                continue;
            }

            let reply = response.reply_text();
            if !reply.is_empty() {
                info!(
                    "Agent replied after {} turn(s) and {} tool call(s)",
                    turn + 1,
                    records.len()
                );
                messages.push(ChatMessage::assistant(reply.clone()));
                return Ok(AgentRunResult {
                    reply,
                    tool_calls: records,
                    messages,
                });
            }

            debug!("Model returned neither text nor tool calls");
        }

        Err(AgentError::TurnBudgetExceeded {
            max_turns: self.max_turns,
        })
    }
}

/// Turn provider tool calls into conversation tool calls.
///
/// Duplicate ids keep their first occurrence; calls without an id get a
/// generated one so every tool message can reference its call. A missing
/// name is kept as empty and later fails dispatch as an unknown tool.
pub fn normalize_tool_calls(raw: &[ToolCallRequest]) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    let mut calls = Vec::with_capacity(raw.len());

    for request in raw {
        let id = match request.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => {
                if !seen.insert(id.to_string()) {
                    continue;
                }
                id.to_string()
            }
            None => format!("call_{}", Uuid::new_v4().simple()),
        };

        calls.push(ToolCall {
            id,
            kind: request.kind.clone().unwrap_or_else(|| "function".to_string()),
            function: FunctionCall {
                name: request.name().unwrap_or_default().to_string(),
                arguments: request.arguments().clone(),
            },
        });
    }

    calls
}
