//! Typed wrappers over [`ApiClient::request`].
//!
//! These only shape parameters: path templating and renaming filter keys
//! into the remote's camelCase query names.

use std::fmt::Display;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::client::ApiClient;
use super::error::{ApiError, ApiResult};

pub const PROPERTY_GROUPS_PATH: &str = "/api/v2/property-groups";

/// Filters accepted by `GET /api/v2/property-groups`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyGroupFilters {
    /// Numeric group type identifier
    pub group_type: Option<i64>,
    /// Text search filter
    pub search_term: Option<String>,
    /// Zero-based page index (default 0)
    pub page: Option<u32>,
    /// Page size (default 20)
    pub size: Option<u32>,
    /// Sort expression such as `name,asc`
    pub sort: Option<String>,
}

impl PropertyGroupFilters {
    /// Query pairs in the remote's naming.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("page".to_string(), self.page.unwrap_or(0).to_string()),
            ("size".to_string(), self.size.unwrap_or(20).to_string()),
        ];
        if let Some(group_type) = self.group_type {
            query.push(("groupType".to_string(), group_type.to_string()));
        }
        if let Some(term) = self.search_term.as_deref().filter(|t| !t.is_empty()) {
            query.push(("searchTerm".to_string(), term.to_string()));
        }
        if let Some(sort) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            query.push(("sort".to_string(), sort.to_string()));
        }
        query
    }
}

/// Flatten a JSON object into query pairs. Nulls are dropped, strings are
/// sent verbatim and everything else uses its JSON rendering.
pub fn query_pairs(query: &Map<String, Value>) -> Vec<(String, String)> {
    query
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key.clone(), s.clone())),
            other => Some((key.clone(), other.to_string())),
        })
        .collect()
}

impl ApiClient {
    /// Paginated list of property groups visible to the current user.
    pub async fn list_property_groups(&self, filters: &PropertyGroupFilters) -> ApiResult<Value> {
        self.request(Method::GET, PROPERTY_GROUPS_PATH, &filters.to_query(), None)
            .await
    }

    pub async fn get_property_group(&self, group_id: impl Display) -> ApiResult<Value> {
        let path = format!("/api/v2/property-group/{}", segment(group_id));
        self.request(Method::GET, &path, &[], None).await
    }

    pub async fn get_property(&self, property_id: impl Display) -> ApiResult<Value> {
        let path = format!("/api/v2/property/{}", segment(property_id));
        self.request(Method::GET, &path, &[], None).await
    }

    pub async fn list_water_roi(&self, property_id: impl Display) -> ApiResult<Value> {
        let path = format!("/api/v2/water-roi/list/{}", segment(property_id));
        self.request(Method::GET, &path, &[], None).await
    }

    pub async fn property_counts(&self, property_id: impl Display) -> ApiResult<Value> {
        let path = format!("/api/v2/property/{}/counts", segment(property_id));
        self.request(Method::GET, &path, &[], None).await
    }

    /// Property summary report for a date range. Numeric ids are sent as
    /// JSON numbers.
    pub async fn report_property_summary(
        &self,
        property_id: impl Display,
        start_date: &str,
        end_date: &str,
    ) -> ApiResult<Value> {
        let id = property_id.to_string();
        let property_id = id
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(id));

        let payload = json!({
            "propertyId": property_id,
            "startDate": start_date,
            "endDate": end_date,
        });
        self.request(
            Method::POST,
            "/api/v2/report/property-summary",
            &[],
            Some(&payload),
        )
        .await
    }

    /// Call any endpoint by method and path.
    pub async fn call_endpoint(
        &self,
        method: &str,
        path: &str,
        query: Option<&Map<String, Value>>,
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        let method = Method::from_bytes(method.trim().to_uppercase().as_bytes())
            .map_err(|_| ApiError::InvalidMethod(method.to_string()))?;
        let path = normalize_path(path);
        let query = query.map(query_pairs).unwrap_or_default();

        self.request(method, &path, &query, body).await
    }
}

/// Percent-encode an id for use as a single path segment.
fn segment(id: impl Display) -> String {
    urlencoding::encode(&id.to_string()).into_owned()
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
