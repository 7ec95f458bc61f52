/// Tools Module
///
/// Grafana tools exposed over MCP. Each tool lives in a module that exports a
/// `register` function adding its tools to the registry during server
/// initialization.

pub mod alerting;
pub mod dashboard;
pub mod datasources;
pub mod incident;
pub mod loki;
pub mod oncall;
pub mod prometheus;
pub mod search;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::client::ClientError;
use crate::core::error::RegistrationError;
use crate::core::registry::ToolRegistry;

/// Failure inside a business tool, reported to the caller as the tool error.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("{0}")]
    Backend(String),
}

impl ToolError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// Register every Grafana tool.
pub fn register_all(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    search::register(registry)?;
    datasources::register(registry)?;
    dashboard::register(registry)?;
    prometheus::register(registry)?;
    loki::register(registry)?;
    alerting::register(registry)?;
    incident::register(registry)?;
    oncall::register(registry)?;
    Ok(())
}

/// `{"status": ..., "data": ...}` wrapper used by the Prometheus and Loki HTTP APIs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn into_data(self) -> Result<T, ToolError> {
        if self.status != "success" {
            let detail = match (self.error_type, self.error) {
                (Some(kind), Some(error)) => format!("{kind}: {error}"),
                (_, Some(error)) => error,
                _ => "no error details".to_string(),
            };
            return Err(ToolError::Backend(format!(
                "query returned status {}: {}",
                self.status, detail
            )));
        }
        self.data
            .ok_or_else(|| ToolError::Backend("response is missing data".to_string()))
    }
}

/// Parse an optional RFC3339 argument; empty strings count as missing.
pub(crate) fn parse_time(
    name: &'static str,
    value: &str,
) -> Result<Option<DateTime<Utc>>, ToolError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(value.trim())
        .map(|time| Some(time.with_timezone(&Utc)))
        .map_err(|e| ToolError::invalid(name, format!("'{value}' is not RFC3339: {e}")))
}
