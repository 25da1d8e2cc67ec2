//! Conversation and tool-call types shared by the agent and LLM clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single conversation message, tagged by role.
///
/// Each variant carries only the fields valid for its role; a tool message
/// cannot exist without the id of the call it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            name: Some(name.into()),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }
}

/// A tool call as recorded in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

/// Function name and its arguments as the model emitted them.
///
/// `arguments` keeps the raw shape (usually a JSON-encoded string, sometimes
/// an object or null); the agent normalizes it before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A tool call exactly as a provider returned it.
///
/// Providers disagree on shape: OpenAI nests `name`/`arguments` under
/// `function`, others put them at the top level, and ids may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCallRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionRequest>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FunctionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Convenience constructor in the OpenAI shape.
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: Some(id.into()),
            kind: Some(function_kind()),
            function: Some(FunctionRequest {
                name: Some(name.into()),
                arguments,
            }),
            name: None,
            arguments: Value::Null,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.function
            .as_ref()
            .and_then(|f| f.name.as_deref())
            .or(self.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    pub fn arguments(&self) -> &Value {
        match &self.function {
            Some(f) if !f.arguments.is_null() => &f.arguments,
            _ => &self.arguments,
        }
    }
}

/// One model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    /// Raw message content: a string, a list of typed parts, or null
    pub content: Value,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: Value::Null,
            tool_calls: calls,
        }
    }

    /// Reply text with surrounding whitespace removed.
    pub fn reply_text(&self) -> String {
        normalize_content(&self.content)
    }
}

/// Collapse message content to plain text.
///
/// Strings are trimmed; lists keep only `{"type": "text"}` parts, joined by
/// newlines; anything else is empty.
pub fn normalize_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        _ => String::new(),
    }
}

/// Function schema offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}
