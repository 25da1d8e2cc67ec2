//! Agent module - the tool-calling loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with system prompt, prior history and the user prompt
//! 2. Call the LLM with the available tools
//! 3. Dispatch every requested tool call and feed the results back
//! 4. Repeat until the LLM answers in text or the turn budget runs out

mod agent_loop;
mod prompt;
mod types;

pub use agent_loop::{normalize_tool_calls, Agent, DEFAULT_MAX_TURNS};
pub use prompt::build_system_prompt;
pub use types::{AgentError, AgentRunResult, ToolCallRecord};
