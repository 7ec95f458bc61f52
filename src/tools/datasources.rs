/// Datasource lookup tools.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::context::ToolContext;
use crate::core::error::RegistrationError;
use crate::core::registry::ToolRegistry;
use crate::core::schema::ToolArgs;
use crate::tools::ToolError;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListDatasourcesParams {}

impl ToolArgs for ListDatasourcesParams {
    const REQUIRED: &'static [&'static str] = &[];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetDatasourceByUidParams {
    /// The uid of the datasource
    pub uid: String,
}

impl ToolArgs for GetDatasourceByUidParams {
    const REQUIRED: &'static [&'static str] = &["uid"];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetDatasourceByNameParams {
    /// The name of the datasource
    pub name: String,
}

impl ToolArgs for GetDatasourceByNameParams {
    const REQUIRED: &'static [&'static str] = &["name"];
}

pub async fn list_datasources(
    ctx: ToolContext,
    _params: ListDatasourcesParams,
) -> Result<Value, ToolError> {
    Ok(ctx.grafana().list_datasources().await?)
}

pub async fn get_datasource_by_uid(
    ctx: ToolContext,
    params: GetDatasourceByUidParams,
) -> Result<Value, ToolError> {
    if params.uid.is_empty() {
        return Err(ToolError::invalid("uid", "must not be empty"));
    }
    Ok(ctx.grafana().get_datasource_by_uid(&params.uid).await?)
}

pub async fn get_datasource_by_name(
    ctx: ToolContext,
    params: GetDatasourceByNameParams,
) -> Result<Value, ToolError> {
    if params.name.is_empty() {
        return Err(ToolError::invalid("name", "must not be empty"));
    }
    Ok(ctx.grafana().get_datasource_by_name(&params.name).await?)
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.add("list_datasources", "List datasources", list_datasources)?;
    registry.add(
        "get_datasource_by_uid",
        "Get datasource by uid",
        get_datasource_by_uid,
    )?;
    registry.add(
        "get_datasource_by_name",
        "Get datasource by name",
        get_datasource_by_name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GrafanaConfig;
    use crate::core::context::RequestContext;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn context(server: &MockServer, tool: &str) -> ToolContext {
        let config = GrafanaConfig {
            url: server.base_url(),
            api_key: String::new(),
        };
        ToolContext::new(
            Arc::new(RequestContext::new(config, &reqwest::Client::new())),
            tool,
        )
    }

    #[tokio::test]
    async fn looks_up_by_name() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/datasources/name/Prometheus");
            then.status(200)
                .json_body(serde_json::json!({"uid": "prom", "name": "Prometheus"}));
        });

        let result = get_datasource_by_name(
            context(&server, "get_datasource_by_name"),
            GetDatasourceByNameParams {
                name: "Prometheus".to_string(),
            },
        )
        .await
        .expect("datasource found");
        assert_eq!(result["uid"], "prom");
    }

    #[tokio::test]
    async fn missing_uid_is_reported_before_any_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.any_request();
            then.status(200);
        });

        let error = get_datasource_by_uid(
            context(&server, "get_datasource_by_uid"),
            GetDatasourceByUidParams::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(error.to_string(), "invalid argument uid: must not be empty");
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/datasources/uid/nope");
            then.status(404).body(r#"{"message":"Data source not found"}"#);
        });

        let error = get_datasource_by_uid(
            context(&server, "get_datasource_by_uid"),
            GetDatasourceByUidParams {
                uid: "nope".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(error.to_string().contains("404"));
    }
}
