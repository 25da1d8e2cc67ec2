//! Run results, audit records and fatal run errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::llm::ChatMessage;
use crate::tools::ToolArguments;

/// Audit entry for one dispatched tool call, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: ToolArguments,
    pub endpoint: Option<String>,
    /// Tool output, or `{"error": ...}` when the call failed
    pub result: Value,
}

impl ToolCallRecord {
    pub fn is_error(&self) -> bool {
        self.result
            .as_object()
            .map_or(false, |o| o.contains_key("error"))
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRunResult {
    pub reply: String,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Full conversation, reusable as history for a follow-up run
    pub messages: Vec<ChatMessage>,
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent reached max turns ({max_turns}) without producing a reply")]
    TurnBudgetExceeded { max_turns: usize },

    #[error("LLM request failed: {0:#}")]
    Llm(anyhow::Error),
}
