/// Prometheus tools, served through the Grafana datasource proxy.

use std::collections::BTreeMap;

use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::context::ToolContext;
use crate::core::error::RegistrationError;
use crate::core::output::Json;
use crate::core::registry::ToolRegistry;
use crate::core::schema::ToolArgs;
use crate::tools::{ApiResponse, ToolError, parse_time};

const DEFAULT_METADATA_LIMIT: u32 = 10;
const DEFAULT_METRIC_NAMES_LIMIT: u32 = 10;
const DEFAULT_LABEL_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryPrometheusParams {
    /// The UID of the datasource to query
    pub datasource_uid: String,
    /// The PromQL expression to query
    pub expr: String,
    /// The start time in RFC3339 format
    pub start_rfc3339: String,
    /// The end time in RFC3339 format. Ignored if queryType is 'instant'
    pub end_rfc3339: String,
    /// The time series step size in seconds. Ignored if queryType is 'instant'
    pub step_seconds: Option<u32>,
    /// The type of query to use. Either 'range' or 'instant'
    pub query_type: String,
}

impl ToolArgs for QueryPrometheusParams {
    const REQUIRED: &'static [&'static str] = &["datasourceUid", "expr", "startRfc3339"];
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ListPrometheusMetricMetadataParams {
    /// The UID of the datasource to query
    pub datasource_uid: String,
    /// The maximum number of metrics to return. Defaults to 10
    pub limit: u32,
    /// The maximum number of metadata entries per metric. Defaults to 10
    pub limit_per_metric: u32,
    /// Optionally, a metric name to filter the results by
    pub metric: String,
}

impl Default for ListPrometheusMetricMetadataParams {
    fn default() -> Self {
        Self {
            datasource_uid: String::new(),
            limit: DEFAULT_METADATA_LIMIT,
            limit_per_metric: DEFAULT_METADATA_LIMIT,
            metric: String::new(),
        }
    }
}

impl ToolArgs for ListPrometheusMetricMetadataParams {
    const REQUIRED: &'static [&'static str] = &["datasourceUid"];
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ListPrometheusMetricNamesParams {
    /// The UID of the datasource to query
    pub datasource_uid: String,
    /// A regex to filter metric names by; it matches anywhere in the name. Empty matches every name
    pub regex: String,
    /// The maximum number of results to return. Defaults to 10
    pub limit: u32,
    /// The page number to return, starting at 1
    pub page: u32,
}

impl Default for ListPrometheusMetricNamesParams {
    fn default() -> Self {
        Self {
            datasource_uid: String::new(),
            regex: String::new(),
            limit: DEFAULT_METRIC_NAMES_LIMIT,
            page: 1,
        }
    }
}

impl ToolArgs for ListPrometheusMetricNamesParams {
    const REQUIRED: &'static [&'static str] = &["datasourceUid"];
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ListPrometheusLabelNamesParams {
    /// The UID of the datasource to query
    pub datasource_uid: String,
    /// Optionally, series selectors such as {__name__="up"} to filter the results by
    pub matches: Vec<String>,
    /// Optionally, the start time of the time range in RFC3339 format
    pub start_rfc3339: String,
    /// Optionally, the end time of the time range in RFC3339 format
    pub end_rfc3339: String,
    /// The maximum number of results to return. Defaults to 100
    pub limit: u32,
}

impl Default for ListPrometheusLabelNamesParams {
    fn default() -> Self {
        Self {
            datasource_uid: String::new(),
            matches: Vec::new(),
            start_rfc3339: String::new(),
            end_rfc3339: String::new(),
            limit: DEFAULT_LABEL_LIMIT,
        }
    }
}

impl ToolArgs for ListPrometheusLabelNamesParams {
    const REQUIRED: &'static [&'static str] = &["datasourceUid"];
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ListPrometheusLabelValuesParams {
    /// The UID of the datasource to query
    pub datasource_uid: String,
    /// The name of the label to query
    pub label_name: String,
    /// Optionally, series selectors such as {job="api"} to filter the results by
    pub matches: Vec<String>,
    /// Optionally, the start time of the time range in RFC3339 format
    pub start_rfc3339: String,
    /// Optionally, the end time of the time range in RFC3339 format
    pub end_rfc3339: String,
    /// The maximum number of results to return. Defaults to 100
    pub limit: u32,
}

impl Default for ListPrometheusLabelValuesParams {
    fn default() -> Self {
        Self {
            datasource_uid: String::new(),
            label_name: String::new(),
            matches: Vec::new(),
            start_rfc3339: String::new(),
            end_rfc3339: String::new(),
            limit: DEFAULT_LABEL_LIMIT,
        }
    }
}

impl ToolArgs for ListPrometheusLabelValuesParams {
    const REQUIRED: &'static [&'static str] = &["datasourceUid", "labelName"];
}

/// Zero means "not set".
fn limit_or(limit: u32, default: u32) -> u32 {
    if limit == 0 { default } else { limit }
}

fn require(name: &'static str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::invalid(name, "must not be empty"));
    }
    Ok(())
}

pub async fn query_prometheus(
    ctx: ToolContext,
    params: QueryPrometheusParams,
) -> Result<Value, ToolError> {
    require("datasourceUid", &params.datasource_uid)?;
    require("expr", &params.expr)?;
    let start = parse_time("startRfc3339", &params.start_rfc3339)?
        .ok_or_else(|| ToolError::invalid("startRfc3339", "must not be empty"))?;

    let (path, query) = match params.query_type.as_str() {
        "" | "range" => {
            let end = parse_time("endRfc3339", &params.end_rfc3339)?;
            let (Some(end), Some(step)) = (end, params.step_seconds) else {
                return Err(ToolError::invalid(
                    "queryType",
                    "endRfc3339 and stepSeconds must be provided when queryType is 'range'",
                ));
            };
            if step == 0 {
                return Err(ToolError::invalid("stepSeconds", "must be positive"));
            }
            (
                ["api", "v1", "query_range"].as_slice(),
                vec![
                    ("query", params.expr),
                    ("start", start.to_rfc3339()),
                    ("end", end.to_rfc3339()),
                    ("step", step.to_string()),
                ],
            )
        }
        "instant" => (
            ["api", "v1", "query"].as_slice(),
            vec![("query", params.expr), ("time", start.to_rfc3339())],
        ),
        other => {
            return Err(ToolError::invalid(
                "queryType",
                format!("must be 'range' or 'instant', got '{other}'"),
            ));
        }
    };

    let response: ApiResponse<Value> = ctx
        .grafana()
        .datasource_get(&params.datasource_uid, path, &query)
        .await?;
    response.into_data()
}

/// Prometheus metric metadata entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(default)]
pub struct MetricMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub help: String,
    pub unit: String,
}

pub async fn list_prometheus_metric_metadata(
    ctx: ToolContext,
    params: ListPrometheusMetricMetadataParams,
) -> Result<Json<BTreeMap<String, Vec<MetricMetadata>>>, ToolError> {
    require("datasourceUid", &params.datasource_uid)?;
    let mut query = vec![
        ("limit", limit_or(params.limit, DEFAULT_METADATA_LIMIT).to_string()),
        (
            "limit_per_metric",
            limit_or(params.limit_per_metric, DEFAULT_METADATA_LIMIT).to_string(),
        ),
    ];
    if !params.metric.is_empty() {
        query.push(("metric", params.metric));
    }

    let response: ApiResponse<BTreeMap<String, Vec<MetricMetadata>>> = ctx
        .grafana()
        .datasource_get(&params.datasource_uid, &["api", "v1", "metadata"], &query)
        .await?;
    response.into_data().map(Json)
}

pub async fn list_prometheus_metric_names(
    ctx: ToolContext,
    params: ListPrometheusMetricNamesParams,
) -> Result<Vec<String>, ToolError> {
    require("datasourceUid", &params.datasource_uid)?;
    let filter = match params.regex.as_str() {
        "" => None,
        pattern => Some(
            Regex::new(pattern).map_err(|e| ToolError::invalid("regex", e.to_string()))?,
        ),
    };

    let response: ApiResponse<Vec<String>> = ctx
        .grafana()
        .datasource_get(
            &params.datasource_uid,
            &["api", "v1", "label", "__name__", "values"],
            &[],
        )
        .await?;
    let mut names = response.into_data()?;
    if let Some(filter) = filter {
        names.retain(|name| filter.is_match(name));
    }
    Ok(paginate(
        names,
        limit_or(params.limit, DEFAULT_METRIC_NAMES_LIMIT),
        params.page,
    ))
}

pub async fn list_prometheus_label_names(
    ctx: ToolContext,
    params: ListPrometheusLabelNamesParams,
) -> Result<Vec<String>, ToolError> {
    require("datasourceUid", &params.datasource_uid)?;
    let limit = limit_or(params.limit, DEFAULT_LABEL_LIMIT);
    let query = label_query(params.matches, &params.start_rfc3339, &params.end_rfc3339, limit)?;

    let response: ApiResponse<Vec<String>> = ctx
        .grafana()
        .datasource_get(&params.datasource_uid, &["api", "v1", "labels"], &query)
        .await?;
    let mut names = response.into_data()?;
    names.truncate(limit as usize);
    Ok(names)
}

pub async fn list_prometheus_label_values(
    ctx: ToolContext,
    params: ListPrometheusLabelValuesParams,
) -> Result<Vec<String>, ToolError> {
    require("datasourceUid", &params.datasource_uid)?;
    require("labelName", &params.label_name)?;
    let limit = limit_or(params.limit, DEFAULT_LABEL_LIMIT);
    let query = label_query(params.matches, &params.start_rfc3339, &params.end_rfc3339, limit)?;

    let path = ["api", "v1", "label", params.label_name.as_str(), "values"];
    let response: ApiResponse<Vec<String>> = ctx
        .grafana()
        .datasource_get(&params.datasource_uid, &path, &query)
        .await?;
    let mut values = response.into_data()?;
    values.truncate(limit as usize);
    Ok(values)
}

fn paginate(names: Vec<String>, limit: u32, page: u32) -> Vec<String> {
    let limit = limit as usize;
    let start = (page.max(1) as usize - 1).saturating_mul(limit);
    names.into_iter().skip(start).take(limit).collect()
}

fn label_query(
    matches: Vec<String>,
    start: &str,
    end: &str,
    limit: u32,
) -> Result<Vec<(&'static str, String)>, ToolError> {
    let mut query: Vec<(&str, String)> = matches
        .into_iter()
        .filter(|selector| !selector.trim().is_empty())
        .map(|selector| ("match[]", selector))
        .collect();
    if let Some(start) = parse_time("startRfc3339", start)? {
        query.push(("start", start.to_rfc3339()));
    }
    if let Some(end) = parse_time("endRfc3339", end)? {
        query.push(("end", end.to_rfc3339()));
    }
    query.push(("limit", limit.to_string()));
    Ok(query)
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.add(
        "query_prometheus",
        "Query Prometheus using a range or instant request",
        query_prometheus,
    )?;
    registry.add(
        "list_prometheus_metric_metadata",
        "List Prometheus metric metadata. Returns metadata about metrics currently scraped from targets.",
        list_prometheus_metric_metadata,
    )?;
    registry.add(
        "list_prometheus_metric_names",
        "List metric names in a Prometheus datasource that match the given regex",
        list_prometheus_metric_names,
    )?;
    registry.add(
        "list_prometheus_label_names",
        "List the label names in a Prometheus datasource, optionally filtered to those matching the given selectors and time range",
        list_prometheus_label_names,
    )?;
    registry.add(
        "list_prometheus_label_values",
        "Get the values of a label in Prometheus",
        list_prometheus_label_values,
    )
}
