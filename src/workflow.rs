//! Requirements-driven audit workflow.
//!
//! A requirements file lists metric groups for a property group. Each group
//! becomes one agent run; its reply, a summary of every fetch and the raw
//! tool-call records are written to `NN-<slug>.json` in the output directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::agent::{Agent, AgentRunResult, ToolCallRecord};

/// Parsed requirements file.
#[derive(Debug, Clone, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub property_group_id_default: Option<i64>,
    #[serde(default)]
    pub groups: Option<Vec<MetricGroup>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricGroup {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl MetricGroup {
    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Per-metric prompt recorded alongside the group result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPrompt {
    pub key: Option<String>,
    pub label: Option<String>,
    pub prompt: String,
}

/// Condensed view of one tool call for human review.
#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub order: usize,
    pub tool_name: String,
    pub endpoint: Option<String>,
    pub arguments: Value,
    pub summary: String,
    pub raw_result: Value,
}

#[derive(Debug, Serialize)]
struct GroupReport<'a> {
    group_order: usize,
    group_name: Option<&'a str>,
    property_group_id: i64,
    prompt: &'a str,
    metrics: &'a [Metric],
    metric_prompts: &'a [MetricPrompt],
    agent_summary: &'a str,
    fetches: Vec<FetchSummary>,
    tool_calls: &'a [ToolCallRecord],
    completed_at: String,
}

/// Inputs of a workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub requirements_path: PathBuf,
    pub property_group_id: Option<i64>,
    pub output_dir: PathBuf,
    /// Restrict to these group names (case-insensitive)
    pub group_filters: Vec<String>,
}

impl Requirements {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("Requirements file not found: {}", path.display());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let requirements: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if requirements.groups.is_none() {
            anyhow::bail!(
                "Requirements file {} must contain a 'groups' field.",
                path.display()
            );
        }
        Ok(requirements)
    }
}

/// Lowercase alphanumerics, everything else becomes `-`; edges trimmed.
pub fn slugify(value: &str) -> String {
    let slug: String = value
        .trim()
        .chars()
        .flat_map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().collect::<Vec<_>>()
            } else {
                vec!['-']
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "group".to_string()
    } else {
        slug.to_string()
    }
}

pub fn build_metric_prompt(metric: &Metric, property_group_id: i64) -> String {
    let key = metric.key.as_deref().unwrap_or("");
    let label = metric.label.as_deref().unwrap_or(key);
    let description = metric.description.as_deref().unwrap_or("").trim();
    let desc_clause = if description.is_empty() {
        String::new()
    } else {
        format!(" ({})", description)
    };

    format!(
        "Gather '{}' (key: {}){} for property group ID {}. \
         Use Postman endpoint search before calling APIs you are not certain about. \
         Quote the exact value, units, timeframe, and describe the source endpoint.",
        label, key, desc_clause, property_group_id
    )
}

pub fn build_group_prompt(group: &MetricGroup, property_group_id: i64) -> (String, Vec<MetricPrompt>) {
    let metric_prompts: Vec<MetricPrompt> = group
        .metrics
        .iter()
        .map(|metric| MetricPrompt {
            key: metric.key.clone(),
            label: metric.label.clone(),
            prompt: build_metric_prompt(metric, property_group_id),
        })
        .collect();

    let overview = group
        .metrics
        .iter()
        .map(|m| {
            format!(
                "- {}: {}",
                m.key.as_deref().unwrap_or(""),
                m.description.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let instructions = metric_prompts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p.prompt))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "You are auditing '{name}' metrics for property group ID {id}.\n\
         Use the metric-specific prompts below to drive each fetch. \
         Always search the Postman collection before calling an unfamiliar endpoint, and cite the exact API path.\n\n\
         Metrics overview:\n{overview}\n\n\
         Metric-specific instructions:\n{instructions}\n\n\
         After gathering data for each metric, summarize the findings with values, units, endpoints, and any gaps.",
        name = group.display_name(),
        id = property_group_id,
        overview = overview,
        instructions = instructions,
    );

    (prompt, metric_prompts)
}

/// One-line description of a tool result.
pub fn summarize_tool_call(result: &Value) -> String {
    match result {
        Value::Null => "No data returned.".to_string(),
        Value::Object(map) => {
            if let Some(error) = map.get("error") {
                return match error {
                    Value::String(s) => format!("Error: {}", s),
                    other => format!("Error: {}", other),
                };
            }

            let keys = map.keys().take(6).cloned().collect::<Vec<_>>().join(", ");
            let size_info = match map.get("data") {
                Some(Value::Array(items)) => format!("data_count={}", items.len()),
                Some(Value::Object(data)) => format!(
                    "data_keys=[{}]",
                    data.keys().take(5).cloned().collect::<Vec<_>>().join(", ")
                ),
                _ => String::new(),
            };

            let context = [keys, size_info]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("; ");
            if context.is_empty() {
                "Structured response received.".to_string()
            } else {
                context
            }
        }
        Value::Array(items) => format!("List with {} entries.", items.len()),
        Value::String(s) => s.chars().take(400).collect(),
        other => other.to_string(),
    }
}

pub fn build_fetch_summaries(records: &[ToolCallRecord]) -> Vec<FetchSummary> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| FetchSummary {
            order: i + 1,
            tool_name: record.tool_name.clone(),
            endpoint: record.endpoint.clone(),
            arguments: Value::Object(record.arguments.clone()),
            summary: summarize_tool_call(&record.result),
            raw_result: record.result.clone(),
        })
        .collect()
}

async fn write_group_result(
    group: &MetricGroup,
    prompt: &str,
    property_group_id: i64,
    result: &AgentRunResult,
    output_dir: &Path,
    index: usize,
    metric_prompts: &[MetricPrompt],
) -> anyhow::Result<PathBuf> {
    let report = GroupReport {
        group_order: index,
        group_name: group.name.as_deref(),
        property_group_id,
        prompt,
        metrics: &group.metrics,
        metric_prompts,
        agent_summary: &result.reply,
        fetches: build_fetch_summaries(&result.tool_calls),
        tool_calls: &result.tool_calls,
        completed_at: chrono::Utc::now().to_rfc3339(),
    };

    let slug = match group.name.as_deref() {
        Some(name) => slugify(name),
        None => slugify(&format!("group-{}", index)),
    };
    let path = output_dir.join(format!("{:02}-{}.json", index, slug));
    let contents = serde_json::to_string_pretty(&report)?;
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Run every selected metric group through the agent and write one result
/// file per group. A failing group is recorded with its error instead of
/// stopping the workflow.
pub async fn run_requirements_workflow(
    agent: &Agent,
    options: &WorkflowOptions,
) -> anyhow::Result<Vec<PathBuf>> {
    let requirements = Requirements::load(&options.requirements_path)?;
    let property_group_id = options
        .property_group_id
        .or(requirements.property_group_id_default)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "A property group ID must be provided via --property-group-id or in the requirements file."
            )
        })?;

    let groups = requirements.groups.unwrap_or_default();
    if groups.is_empty() {
        anyhow::bail!("Requirements file does not define any groups.");
    }

    let selected: Vec<&MetricGroup> = if options.group_filters.is_empty() {
        groups.iter().collect()
    } else {
        let wanted: Vec<String> = options
            .group_filters
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect();
        let matched: Vec<&MetricGroup> = groups
            .iter()
            .filter(|g| wanted.contains(&g.display_name().to_lowercase()))
            .collect();
        if matched.is_empty() {
            let available: Vec<&str> = groups.iter().map(MetricGroup::display_name).collect();
            anyhow::bail!(
                "No requirement groups matched the provided --group filters. Available groups: {:?}",
                available
            );
        }
        matched
    };

    tokio::fs::create_dir_all(&options.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", options.output_dir.display()))?;

    let mut written = Vec::with_capacity(selected.len());
    for (i, group) in selected.into_iter().enumerate() {
        let index = i + 1;
        let (prompt, metric_prompts) = build_group_prompt(group, property_group_id);
        info!("Running group {} '{}'", index, group.display_name());

        let result = match agent.run(&prompt).await {
            Ok(result) => result,
            Err(e) => {
                error!("Group '{}' failed: {}", group.display_name(), e);
                AgentRunResult {
                    reply: format!(
                        "Failed to complete '{}' request: {}",
                        group.display_name(),
                        e
                    ),
                    tool_calls: Vec::new(),
                    messages: Vec::new(),
                }
            }
        };

        let path = write_group_result(
            group,
            &prompt,
            property_group_id,
            &result,
            &options.output_dir,
            index,
            &metric_prompts,
        )
        .await?;
        written.push(path);
    }

    Ok(written)
}
