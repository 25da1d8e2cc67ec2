//! Endpoint discovery over the bundled Postman collection.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, Tool, ToolArguments};
use crate::endpoint_index::{EndpointIndex, SearchFilters};

fn default_limit() -> usize {
    5
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    folder_contains: Option<String>,
}

pub struct SearchEndpoints {
    index: Option<Arc<EndpointIndex>>,
}

impl SearchEndpoints {
    pub fn new(index: Option<Arc<EndpointIndex>>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for SearchEndpoints {
    fn name(&self) -> &str {
        "search_postman_endpoints"
    }

    fn description(&self) -> &str {
        "Search the bundled Postman collection for endpoint definitions that match the provided keywords."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords describing the desired endpoint."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of matches to return (default 5).",
                    "default": 5
                },
                "method": {
                    "type": "string",
                    "description": "Optional HTTP method filter.",
                    "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"]
                },
                "folder_contains": {
                    "type": "string",
                    "description": "Optional folder substring to scope the search."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: ToolArguments) -> anyhow::Result<Value> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Postman collection not configured for this agent."))?;
        let args: SearchArgs = parse_args(args)?;

        let filters = SearchFilters {
            method: args.method,
            folder_contains: args.folder_contains,
        };
        let results = index.search(&args.query, args.limit, &filters).await?;
        Ok(serde_json::to_value(results)?)
    }

    fn describe_endpoint(&self, _args: &ToolArguments) -> Option<String> {
        Some("postman_collection_search".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> ToolArguments {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn unconfigured_index_reports_error() {
        let tool = SearchEndpoints::new(None);
        let err = tool.execute(args(json!({"query": "alerts"}))).await.unwrap_err();
        assert!(err.to_string().contains("not configured"), "{err}");
    }

    #[tokio::test]
    async fn searches_configured_index() {
        let index = EndpointIndex::from_collection(&json!({
            "item": [
                {"name": "List alerts", "request": {"method": "GET", "url": "/api/v2/alerts"}},
                {"name": "Get property", "request": {"method": "GET", "url": "/api/v2/property/:id"}}
            ]
        }));
        let tool = SearchEndpoints::new(Some(Arc::new(index)));

        let value = tool
            .execute(args(json!({"query": "alerts", "limit": 1})))
            .await
            .unwrap();
        assert_eq!(value["result_count"], 1);
        assert_eq!(value["results"][0]["path"], "/api/v2/alerts");
        assert_eq!(
            tool.describe_endpoint(&ToolArguments::new()).as_deref(),
            Some("postman_collection_search")
        );
    }
}
