//! Tools backed by the property management API.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse_args, Tool, ToolArguments};
use crate::api::{ApiClient, PropertyGroupFilters, PROPERTY_GROUPS_PATH};

/// Identifier the model may send as a number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn templated(args: &ToolArguments, key: &str, template: impl Fn(&str) -> String) -> Option<String> {
    args.get(key)
        .filter(|v| !v.is_null())
        .map(|v| template(&render(v)))
}

fn id_schema(key: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            key: {
                "type": "integer",
                "description": description
            }
        },
        "required": [key],
        "additionalProperties": false
    })
}

/// Paginated property group listing.
pub struct ListPropertyGroups {
    client: Arc<ApiClient>,
}

impl ListPropertyGroups {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListPropertyGroups {
    fn name(&self) -> &str {
        "list_property_groups"
    }

    fn description(&self) -> &str {
        "Retrieve a paginated list of property groups for the current user. Use filters such as groupType, searchTerm, page, size, or sort when needed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "group_type": {
                    "type": "integer",
                    "description": "Numeric group type identifier."
                },
                "search_term": {
                    "type": "string",
                    "description": "Text search filter for property groups."
                },
                "page": {
                    "type": "integer",
                    "description": "Zero-based page index to fetch.",
                    "default": 0
                },
                "size": {
                    "type": "integer",
                    "description": "Number of results per page (max 100).",
                    "default": 20
                },
                "sort": {
                    "type": "string",
                    "description": "Sort expression, i.e. 'name,asc'."
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: ToolArguments) -> anyhow::Result<Value> {
        let filters: PropertyGroupFilters = parse_args(args)?;
        Ok(self.client.list_property_groups(&filters).await?)
    }

    fn describe_endpoint(&self, args: &ToolArguments) -> Option<String> {
        const QUERY_KEYS: [(&str, &str); 5] = [
            ("group_type", "groupType"),
            ("search_term", "searchTerm"),
            ("page", "page"),
            ("size", "size"),
            ("sort", "sort"),
        ];

        let params: Vec<String> = QUERY_KEYS
            .iter()
            .filter_map(|(arg_key, query_key)| {
                args.get(*arg_key)
                    .filter(|v| !v.is_null())
                    .map(|v| format!("{}={}", query_key, render(v)))
            })
            .collect();

        if params.is_empty() {
            Some(PROPERTY_GROUPS_PATH.to_string())
        } else {
            Some(format!("{}?{}", PROPERTY_GROUPS_PATH, params.join("&")))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupIdArgs {
    group_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertyIdArgs {
    property_id: ResourceId,
}

/// Metadata for one property group.
pub struct GetPropertyGroup {
    client: Arc<ApiClient>,
}

impl GetPropertyGroup {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetPropertyGroup {
    fn name(&self) -> &str {
        "get_property_group"
    }

    fn description(&self) -> &str {
        "Fetch metadata for a specific property group using its numeric ID."
    }

    fn parameters_schema(&self) -> Value {
        id_schema("group_id", "Property group identifier.")
    }

    async fn execute(&self, args: ToolArguments) -> anyhow::Result<Value> {
        let args: GroupIdArgs = parse_args(args)?;
        Ok(self.client.get_property_group(args.group_id).await?)
    }

    fn describe_endpoint(&self, args: &ToolArguments) -> Option<String> {
        templated(args, "group_id", |id| format!("/api/v2/property-group/{}", id))
    }
}

/// Full detail for one property.
pub struct GetProperty {
    client: Arc<ApiClient>,
}

impl GetProperty {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetProperty {
    fn name(&self) -> &str {
        "get_property"
    }

    fn description(&self) -> &str {
        "Retrieve rich information about a property, including infrastructure, contacts, counts, and configuration values."
    }

    fn parameters_schema(&self) -> Value {
        id_schema("property_id", "Property identifier.")
    }

    async fn execute(&self, args: ToolArguments) -> anyhow::Result<Value> {
        let args: PropertyIdArgs = parse_args(args)?;
        Ok(self.client.get_property(args.property_id).await?)
    }

    fn describe_endpoint(&self, args: &ToolArguments) -> Option<String> {
        templated(args, "property_id", |id| format!("/api/v2/property/{}", id))
    }
}

/// Water ROI annotations for a property.
pub struct ListWaterRoi {
    client: Arc<ApiClient>,
}

impl ListWaterRoi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListWaterRoi {
    fn name(&self) -> &str {
        "list_water_roi"
    }

    fn description(&self) -> &str {
        "Get the list of water ROI annotations associated with a specific property ID."
    }

    fn parameters_schema(&self) -> Value {
        id_schema("property_id", "Property identifier used to retrieve ROI entries.")
    }

    async fn execute(&self, args: ToolArguments) -> anyhow::Result<Value> {
        let args: PropertyIdArgs = parse_args(args)?;
        Ok(self.client.list_water_roi(args.property_id).await?)
    }

    fn describe_endpoint(&self, args: &ToolArguments) -> Option<String> {
        templated(args, "property_id", |id| format!("/api/v2/water-roi/list/{}", id))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CallEndpointArgs {
    method: String,
    path: String,
    #[serde(default)]
    query: Option<Map<String, Value>>,
    #[serde(default)]
    body: Option<Value>,
}

/// Generic passthrough for endpoints without a dedicated tool.
pub struct CallEndpoint {
    client: Arc<ApiClient>,
}

impl CallEndpoint {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CallEndpoint {
    fn name(&self) -> &str {
        "call_symmons_endpoint"
    }

    fn description(&self) -> &str {
        "Invoke any Symmons API endpoint by specifying the HTTP method and path. Use this for endpoints that are not covered by dedicated tools."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "method": {
                    "type": "string",
                    "description": "HTTP method (GET, POST, PUT, PATCH, or DELETE).",
                    "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"]
                },
                "path": {
                    "type": "string",
                    "description": "Relative API path beginning with /api."
                },
                "query": {
                    "type": "object",
                    "description": "Optional query string key/value pairs.",
                    "additionalProperties": {"type": ["string", "number", "boolean"]}
                },
                "body": {
                    "type": "object",
                    "description": "Optional JSON payload for POST/PUT/PATCH calls."
                }
            },
            "required": ["method", "path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: ToolArguments) -> anyhow::Result<Value> {
        let args: CallEndpointArgs = parse_args(args)?;
        let body = args.body.filter(|b| !b.is_null());
        Ok(self
            .client
            .call_endpoint(&args.method, &args.path, args.query.as_ref(), body.as_ref())
            .await?)
    }

    fn describe_endpoint(&self, args: &ToolArguments) -> Option<String> {
        args.get("path").and_then(Value::as_str).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{spawn, MockState};
    use crate::api::{ClientOptions, Credentials};

    fn args(value: Value) -> ToolArguments {
        value.as_object().unwrap().clone()
    }

    async fn client() -> Arc<ApiClient> {
        let base_url = spawn(MockState::default()).await;
        Arc::new(
            ApiClient::new(
                Credentials {
                    base_url,
                    username: "ops@example.com".to_string(),
                    password: "hunter2".to_string(),
                },
                ClientOptions::default(),
            )
            .unwrap(),
        )
    }

    fn offline_client() -> Arc<ApiClient> {
        Arc::new(
            ApiClient::new(
                Credentials {
                    base_url: "http://127.0.0.1:9".to_string(),
                    username: "u".to_string(),
                    password: "p".to_string(),
                },
                ClientOptions::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn describes_group_listing_with_present_filters_only() {
        let tool = ListPropertyGroups::new(offline_client());
        assert_eq!(
            tool.describe_endpoint(&args(json!({"group_type": 2, "search_term": "inn", "sort": null}))),
            Some("/api/v2/property-groups?groupType=2&searchTerm=inn".to_string())
        );
        assert_eq!(
            tool.describe_endpoint(&ToolArguments::new()),
            Some("/api/v2/property-groups".to_string())
        );
    }

    #[test]
    fn describes_templated_paths() {
        let client = offline_client();
        assert_eq!(
            GetPropertyGroup::new(client.clone()).describe_endpoint(&args(json!({"group_id": 4}))),
            Some("/api/v2/property-group/4".to_string())
        );
        assert_eq!(
            ListWaterRoi::new(client.clone()).describe_endpoint(&args(json!({"property_id": "9"}))),
            Some("/api/v2/water-roi/list/9".to_string())
        );
        assert_eq!(
            CallEndpoint::new(client).describe_endpoint(&args(json!({"method": "GET", "path": "/api/v2/x"}))),
            Some("/api/v2/x".to_string())
        );
    }

    #[tokio::test]
    async fn get_property_accepts_numeric_or_string_ids() {
        let tool = GetProperty::new(client().await);

        let numeric = tool.execute(args(json!({"property_id": 3}))).await.unwrap();
        assert_eq!(numeric["path"], "/api/v2/property/3");

        let text = tool.execute(args(json!({"property_id": "3"}))).await.unwrap();
        assert_eq!(text["path"], "/api/v2/property/3");
    }

    #[tokio::test]
    async fn unexpected_arguments_fail_execution() {
        let tool = GetProperty::new(client().await);
        let err = tool
            .execute(args(json!({"property_id": 3, "verbose": true})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown field"), "{err}");
    }

    #[tokio::test]
    async fn list_property_groups_passes_filters() {
        let tool = ListPropertyGroups::new(client().await);
        let value = tool
            .execute(args(json!({"search_term": "resort", "size": 5})))
            .await
            .unwrap();
        let query = value["query"].as_str().unwrap();
        assert!(query.contains("searchTerm=resort"), "{query}");
        assert!(query.contains("size=5"), "{query}");
    }

    #[tokio::test]
    async fn call_endpoint_forwards_query_and_body() {
        let tool = CallEndpoint::new(client().await);
        let value = tool
            .execute(args(json!({
                "method": "put",
                "path": "api/v2/alerts/1",
                "query": {"notify": false},
                "body": {"acknowledged": true}
            })))
            .await
            .unwrap();
        assert_eq!(value["method"], "PUT");
        assert_eq!(value["path"], "/api/v2/alerts/1");
        assert_eq!(value["query"], "notify=false");
        assert_eq!(value["body"]["acknowledged"], true);
    }

    #[tokio::test]
    async fn api_errors_surface_as_tool_errors() {
        let tool = CallEndpoint::new(client().await);
        let err = tool
            .execute(args(json!({"method": "GET", "path": "/api/v2/missing"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed with 404"), "{err}");
    }
}
