/// Loki tools, served through the Grafana datasource proxy.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::context::ToolContext;
use crate::core::error::RegistrationError;
use crate::core::output::Json;
use crate::core::registry::ToolRegistry;
use crate::core::schema::ToolArgs;
use crate::tools::{ApiResponse, ToolError, parse_time};

const DEFAULT_LOG_LIMIT: u32 = 10;
const MAX_LOG_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ListLokiLabelNamesParams {
    /// The UID of the datasource to query
    pub datasource_uid: String,
    /// Optionally, the start time of the query in RFC3339 format (defaults to 1 hour ago)
    pub start_rfc3339: String,
    /// Optionally, the end time of the query in RFC3339 format (defaults to now)
    pub end_rfc3339: String,
}

impl ToolArgs for ListLokiLabelNamesParams {
    const REQUIRED: &'static [&'static str] = &["datasourceUid"];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ListLokiLabelValuesParams {
    /// The UID of the datasource to query
    pub datasource_uid: String,
    /// The name of the label to retrieve values for (e.g. 'app', 'env', 'pod')
    pub label_name: String,
    /// Optionally, the start time of the query in RFC3339 format (defaults to 1 hour ago)
    pub start_rfc3339: String,
    /// Optionally, the end time of the query in RFC3339 format (defaults to now)
    pub end_rfc3339: String,
}

impl ToolArgs for ListLokiLabelValuesParams {
    const REQUIRED: &'static [&'static str] = &["datasourceUid", "labelName"];
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryLokiLogsParams {
    /// The UID of the datasource to query
    pub datasource_uid: String,
    /// The LogQL query to execute against Loki
    pub logql: String,
    /// Optionally, the start time of the query in RFC3339 format (defaults to 1 hour ago)
    pub start_rfc3339: String,
    /// Optionally, the end time of the query in RFC3339 format (defaults to now)
    pub end_rfc3339: String,
    /// Optionally, the maximum number of log lines to return (default: 10, max: 100)
    pub limit: u32,
    /// Optionally, the direction of the query: 'forward' (oldest first) or 'backward' (newest first, default)
    pub direction: String,
}

impl Default for QueryLokiLogsParams {
    fn default() -> Self {
        Self {
            datasource_uid: String::new(),
            logql: String::new(),
            start_rfc3339: String::new(),
            end_rfc3339: String::new(),
            limit: DEFAULT_LOG_LIMIT,
            direction: String::new(),
        }
    }
}

impl ToolArgs for QueryLokiLogsParams {
    const REQUIRED: &'static [&'static str] = &["datasourceUid", "logql"];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryLokiStatsParams {
    /// The UID of the datasource to query
    pub datasource_uid: String,
    /// The LogQL stream selector, e.g. {app="api"}. Only label matchers are supported; line filters and metric queries are not
    pub logql: String,
    /// Optionally, the start time of the query in RFC3339 format (defaults to 1 hour ago)
    pub start_rfc3339: String,
    /// Optionally, the end time of the query in RFC3339 format (defaults to now)
    pub end_rfc3339: String,
}

impl ToolArgs for QueryLokiStatsParams {
    const REQUIRED: &'static [&'static str] = &["datasourceUid", "logql"];
}

/// Size of the streams selected by a query, from `/loki/api/v1/index/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Stats {
    pub streams: u64,
    pub chunks: u64,
    pub entries: u64,
    pub bytes: u64,
}

/// One log line with the labels of the stream it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub line: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Stream {
    #[serde(default)]
    stream: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<(String, String)>,
}

/// Resolve the query window, defaulting to the hour before `now`.
fn time_range(
    start: &str,
    end: &str,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ToolError> {
    let end = parse_time("endRfc3339", end)?.unwrap_or(now);
    let start = parse_time("startRfc3339", start)?.unwrap_or(end - Duration::hours(1));
    if start > end {
        return Err(ToolError::invalid(
            "startRfc3339",
            "must not be after endRfc3339",
        ));
    }
    Ok((start, end))
}

fn window_query(start: &str, end: &str) -> Result<Vec<(&'static str, String)>, ToolError> {
    let (start, end) = time_range(start, end, Utc::now())?;
    Ok(vec![("start", start.to_rfc3339()), ("end", end.to_rfc3339())])
}

fn require(name: &'static str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::invalid(name, "must not be empty"));
    }
    Ok(())
}

pub async fn list_loki_label_names(
    ctx: ToolContext,
    params: ListLokiLabelNamesParams,
) -> Result<Vec<String>, ToolError> {
    require("datasourceUid", &params.datasource_uid)?;
    let query = window_query(&params.start_rfc3339, &params.end_rfc3339)?;
    let response: ApiResponse<Vec<String>> = ctx
        .grafana()
        .datasource_get(&params.datasource_uid, &["loki", "api", "v1", "labels"], &query)
        .await?;
    response.into_data()
}

pub async fn list_loki_label_values(
    ctx: ToolContext,
    params: ListLokiLabelValuesParams,
) -> Result<Vec<String>, ToolError> {
    require("datasourceUid", &params.datasource_uid)?;
    require("labelName", &params.label_name)?;
    let query = window_query(&params.start_rfc3339, &params.end_rfc3339)?;
    let path = [
        "loki",
        "api",
        "v1",
        "label",
        params.label_name.as_str(),
        "values",
    ];
    let response: ApiResponse<Vec<String>> = ctx
        .grafana()
        .datasource_get(&params.datasource_uid, &path, &query)
        .await?;
    response.into_data()
}

pub async fn query_loki_logs(
    ctx: ToolContext,
    params: QueryLokiLogsParams,
) -> Result<Vec<LogEntry>, ToolError> {
    require("datasourceUid", &params.datasource_uid)?;
    require("logql", &params.logql)?;
    let direction = match params.direction.as_str() {
        "" | "backward" => "backward",
        "forward" => "forward",
        other => {
            return Err(ToolError::invalid(
                "direction",
                format!("must be 'forward' or 'backward', got '{other}'"),
            ));
        }
    };
    let limit = clamp_limit(params.limit);

    let mut query = window_query(&params.start_rfc3339, &params.end_rfc3339)?;
    query.push(("query", params.logql));
    query.push(("limit", limit.to_string()));
    query.push(("direction", direction.to_string()));

    let response: ApiResponse<QueryData> = ctx
        .grafana()
        .datasource_get(
            &params.datasource_uid,
            &["loki", "api", "v1", "query_range"],
            &query,
        )
        .await?;
    let data = response.into_data()?;
    if data.result_type != "streams" {
        return Err(ToolError::Backend(format!(
            "expected a log query, got result type '{}'; use a LogQL log query rather than a metric query",
            data.result_type
        )));
    }
    let streams: Vec<Stream> = match data.result {
        serde_json::Value::Null => Vec::new(),
        result => serde_json::from_value(result)
            .map_err(|e| ToolError::Backend(format!("decoding log streams: {e}")))?,
    };
    Ok(flatten_streams(streams, limit as usize))
}

pub async fn query_loki_stats(
    ctx: ToolContext,
    params: QueryLokiStatsParams,
) -> Result<Json<Stats>, ToolError> {
    require("datasourceUid", &params.datasource_uid)?;
    require("logql", &params.logql)?;
    let mut query = window_query(&params.start_rfc3339, &params.end_rfc3339)?;
    query.push(("query", params.logql));

    // The stats endpoint answers with the bare object, not a status envelope.
    let stats: Stats = ctx
        .grafana()
        .datasource_get(
            &params.datasource_uid,
            &["loki", "api", "v1", "index", "stats"],
            &query,
        )
        .await?;
    Ok(Json(stats))
}

fn clamp_limit(limit: u32) -> u32 {
    match limit {
        0 => DEFAULT_LOG_LIMIT,
        limit => limit.min(MAX_LOG_LIMIT),
    }
}

fn flatten_streams(streams: Vec<Stream>, limit: usize) -> Vec<LogEntry> {
    streams
        .into_iter()
        .flat_map(|stream| {
            let labels = stream.stream;
            stream
                .values
                .into_iter()
                .map(move |(timestamp, line)| LogEntry {
                    timestamp,
                    line,
                    labels: labels.clone(),
                })
        })
        .take(limit)
        .collect()
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.add(
        "list_loki_label_names",
        "List all available label names in a Loki datasource for the given time range. Defaults to the last hour.",
        list_loki_label_names,
    )?;
    registry.add(
        "list_loki_label_values",
        "Retrieve all unique values for a specific label name in a Loki datasource for the given time range. Defaults to the last hour.",
        list_loki_label_values,
    )?;
    registry.add(
        "query_loki_stats",
        "Query statistics about log streams in a Loki datasource, using a LogQL stream selector. Returns the number of streams, chunks, entries and bytes. Defaults to the last hour.",
        query_loki_stats,
    )?;
    registry.add(
        "query_loki_logs",
        "Execute a LogQL query against a Loki datasource to retrieve log entries. Returns a list of log entries with timestamp, labels and line. Defaults to the last hour and a limit of 10 entries.",
        query_loki_logs,
    )
}
