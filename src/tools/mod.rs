//! Tools the model can call, and the registry that dispatches them.
//!
//! Dispatch never fails outright: an unknown name, unparseable arguments or a
//! tool that errors all come back as a [`ToolError`] inside the
//! [`ToolOutcome`], rendered to the model as `{"error": "..."}`.

mod arguments;
mod endpoint_search;
mod property;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::api::ApiClient;
use crate::endpoint_index::EndpointIndex;
use crate::llm::{FunctionSchema, ToolSchema};

pub use arguments::{normalize_arguments, parse_args, ToolArguments};
pub use endpoint_search::SearchEndpoints;
pub use property::{CallEndpoint, GetProperty, GetPropertyGroup, ListPropertyGroups, ListWaterRoi};

/// A named, schema-described function the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: ToolArguments) -> anyhow::Result<Value>;

    /// Human-readable endpoint a call with `args` hits, for audit records.
    fn describe_endpoint(&self, _args: &ToolArguments) -> Option<String> {
        None
    }
}

/// Recoverable tool-layer failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("{message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    /// Structured payload handed back to the model.
    pub fn to_payload(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

/// Result of dispatching one tool call.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Normalized arguments (empty when they could not be parsed)
    pub arguments: ToolArguments,
    pub endpoint: Option<String>,
    pub result: Result<Value, ToolError>,
}

impl ToolOutcome {
    /// The value recorded and sent to the model: the tool's output or an
    /// error object.
    pub fn payload(&self) -> Value {
        match &self.result {
            Ok(value) => value.clone(),
            Err(e) => e.to_payload(),
        }
    }
}

/// Name and description of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Registered tools, kept in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard toolset over the property management API.
    ///
    /// The endpoint search tool is always registered; without an index it
    /// answers every call with an error.
    pub fn for_api(client: Arc<ApiClient>, index: Option<Arc<EndpointIndex>>) -> Self {
        let mut registry = Self::new();
        registry.register(ListPropertyGroups::new(client.clone()));
        registry.register(GetPropertyGroup::new(client.clone()));
        registry.register(GetProperty::new(client.clone()));
        registry.register(ListWaterRoi::new(client.clone()));
        registry.register(CallEndpoint::new(client));
        registry.register(SearchEndpoints::new(index));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// List all tools.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.ordered()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Function schemas to offer the model.
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.ordered()
            .map(|t| ToolSchema {
                kind: "function",
                function: FunctionSchema {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Dispatch a call by name with the model's raw arguments.
    pub async fn execute(&self, name: &str, raw_arguments: &Value) -> ToolOutcome {
        let Some(tool) = self.get(name) else {
            return ToolOutcome {
                arguments: ToolArguments::new(),
                endpoint: None,
                result: Err(ToolError::UnknownTool(name.to_string())),
            };
        };

        let arguments = match normalize_arguments(raw_arguments) {
            Ok(arguments) => arguments,
            Err(message) => {
                return ToolOutcome {
                    arguments: ToolArguments::new(),
                    endpoint: None,
                    result: Err(ToolError::InvalidArguments {
                        tool: name.to_string(),
                        message,
                    }),
                };
            }
        };

        let endpoint = tool.describe_endpoint(&arguments);
        let result = tool
            .execute(arguments.clone())
            .await
            .map_err(|e| ToolError::Execution {
                tool: name.to_string(),
                message: format!("{:#}", e),
            });

        ToolOutcome {
            arguments,
            endpoint,
            result,
        }
    }

    fn ordered(&self) -> impl Iterator<Item = &Arc<dyn Tool>> + '_ {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the arguments back"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: ToolArguments) -> anyhow::Result<Value> {
            if args.contains_key("fail") {
                anyhow::bail!("echo refused");
            }
            Ok(Value::Object(args))
        }

        fn describe_endpoint(&self, _args: &ToolArguments) -> Option<String> {
            Some("/echo".to_string())
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);
        registry
    }

    #[tokio::test]
    async fn unknown_tool_is_structured_error() {
        let outcome = registry().execute("nope", &json!("{}")).await;
        assert_eq!(outcome.result, Err(ToolError::UnknownTool("nope".to_string())));
        assert_eq!(outcome.payload(), json!({"error": "Unknown tool 'nope'"}));
        assert!(outcome.arguments.is_empty());
    }

    #[tokio::test]
    async fn malformed_arguments_name_the_tool() {
        let outcome = registry().execute("echo", &json!("{not json")).await;
        let payload = outcome.payload();
        let message = payload["error"].as_str().unwrap();
        assert!(message.starts_with("Invalid arguments for echo:"), "{message}");
        assert_eq!(outcome.endpoint, None);
    }

    #[tokio::test]
    async fn execution_errors_keep_parsed_arguments() {
        let outcome = registry().execute("echo", &json!({"fail": true})).await;
        assert_eq!(outcome.payload(), json!({"error": "echo refused"}));
        assert_eq!(outcome.arguments.get("fail"), Some(&json!(true)));
        assert_eq!(outcome.endpoint.as_deref(), Some("/echo"));
    }

    #[tokio::test]
    async fn success_returns_tool_output() {
        let outcome = registry().execute("echo", &json!("{\"a\": 1}")).await;
        assert_eq!(outcome.payload(), json!({"a": 1}));
    }

    #[test]
    fn schemas_follow_registration_order() {
        let client = Arc::new(
            ApiClient::new(
                crate::api::Credentials {
                    base_url: "http://localhost".to_string(),
                    username: "u".to_string(),
                    password: "p".to_string(),
                },
                crate::api::ClientOptions::default(),
            )
            .unwrap(),
        );
        let registry = ToolRegistry::for_api(client, None);
        let names: Vec<_> = registry
            .get_tool_schemas()
            .into_iter()
            .map(|s| s.function.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "list_property_groups",
                "get_property_group",
                "get_property",
                "list_water_roi",
                "call_symmons_endpoint",
                "search_postman_endpoints",
            ]
        );
    }
}
