//! Keyword search over an exported Postman collection.
//!
//! The collection is read lazily on first search and flattened into a list
//! of endpoints, each remembering the folder path it was found under.

use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;

/// One request definition from the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub name: String,
    pub method: String,
    pub path: String,
    pub description: Option<String>,
    pub folders: Vec<String>,
}

impl Endpoint {
    fn haystack(&self) -> String {
        let folders = self.folders.join(" ");
        [
            self.name.as_str(),
            self.path.as_str(),
            self.description.as_deref().unwrap_or(""),
            folders.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }
}

/// Ranked search response.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub limit: usize,
    pub result_count: usize,
    pub results: Vec<Endpoint>,
}

/// Optional narrowing of a search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub method: Option<String>,
    pub folder_contains: Option<String>,
}

pub struct EndpointIndex {
    collection_path: PathBuf,
    endpoints: OnceCell<Vec<Endpoint>>,
}

impl EndpointIndex {
    pub fn new(collection_path: impl Into<PathBuf>) -> Self {
        Self {
            collection_path: collection_path.into(),
            endpoints: OnceCell::new(),
        }
    }

    /// Build an index over an already-parsed collection.
    pub fn from_collection(collection: &Value) -> Self {
        let endpoints = OnceCell::new_with(Some(flatten_collection(collection)));
        Self {
            collection_path: PathBuf::new(),
            endpoints,
        }
    }

    /// Score every endpoint against the query terms and return the best
    /// `limit` matches.
    ///
    /// Each term adds twice its occurrence count in the endpoint's name,
    /// path, description and folders, or subtracts one when absent. Ties
    /// keep collection order.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> anyhow::Result<SearchResults> {
        if query.trim().is_empty() {
            anyhow::bail!("query must be a non-empty string");
        }
        if limit == 0 {
            anyhow::bail!("limit must be > 0");
        }

        let endpoints = self.endpoints().await?;
        let lowered = query.to_lowercase();
        let terms: Vec<&str> = lowered.split_whitespace().collect();
        let method = filters.method.as_deref().map(str::to_uppercase);
        let folder = filters.folder_contains.as_deref().map(str::to_lowercase);

        let mut scored: Vec<(i64, &Endpoint)> = endpoints
            .iter()
            .filter(|e| method.as_deref().map_or(true, |m| e.method == m))
            .filter(|e| {
                folder.as_deref().map_or(true, |f| {
                    e.folders.iter().any(|name| name.to_lowercase().contains(f))
                })
            })
            .map(|e| {
                let haystack = e.haystack();
                let score = terms
                    .iter()
                    .map(|term| match haystack.matches(term).count() {
                        0 => -1,
                        n => n as i64 * 2,
                    })
                    .sum();
                (score, e)
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        let results: Vec<Endpoint> = scored
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect();

        Ok(SearchResults {
            query: query.to_string(),
            limit,
            result_count: results.len(),
            results,
        })
    }

    async fn endpoints(&self) -> anyhow::Result<&Vec<Endpoint>> {
        self.endpoints
            .get_or_try_init(|| async {
                let path = &self.collection_path;
                if !path.exists() {
                    anyhow::bail!("Postman collection not found at {}", path.display());
                }
                let contents = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let collection: Value = serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                let endpoints = flatten_collection(&collection);
                tracing::debug!("Indexed {} endpoints from {}", endpoints.len(), path.display());
                Ok(endpoints)
            })
            .await
    }
}

fn flatten_collection(collection: &Value) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    if let Some(items) = collection.get("item").and_then(Value::as_array) {
        collect(items, &[], &mut endpoints);
    }
    endpoints
}

fn collect(items: &[Value], parents: &[String], out: &mut Vec<Endpoint>) {
    for entry in items {
        let name = entry.get("name").and_then(Value::as_str).unwrap_or("");

        if let Some(children) = entry.get("item").and_then(Value::as_array) {
            let mut folders = parents.to_vec();
            if !name.is_empty() {
                folders.push(name.to_string());
            }
            collect(children, &folders, out);
            continue;
        }

        let Some(request) = entry.get("request").filter(|r| r.is_object()) else {
            continue;
        };

        let method = match request.get("method") {
            Some(Value::String(m)) if !m.is_empty() => m.to_uppercase(),
            _ => "GET".to_string(),
        };

        out.push(Endpoint {
            name: name.to_string(),
            method,
            path: extract_path(request.get("url")),
            description: request
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            folders: parents.to_vec(),
        });
    }
}

fn extract_path(url: Option<&Value>) -> String {
    match url {
        Some(Value::String(raw)) => raw.clone(),
        Some(Value::Object(url)) => {
            if let Some(raw) = url.get("raw").and_then(Value::as_str) {
                return raw.to_string();
            }
            if let Some(parts) = url.get("path").and_then(Value::as_array) {
                let parts: Vec<String> = parts
                    .iter()
                    .map(|p| match p {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                return format!("/{}", parts.join("/"));
            }
            "unknown".to_string()
        }
        _ => "unknown".to_string(),
    }
}
