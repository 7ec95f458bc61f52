/// Dashboard search tool.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::context::ToolContext;
use crate::core::error::RegistrationError;
use crate::core::registry::ToolRegistry;
use crate::core::schema::ToolArgs;
use crate::tools::ToolError;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SearchDashboardsParams {
    /// The query to search for
    pub query: String,
}

impl ToolArgs for SearchDashboardsParams {
    const REQUIRED: &'static [&'static str] = &[];
}

pub async fn search_dashboards(
    ctx: ToolContext,
    params: SearchDashboardsParams,
) -> Result<Value, ToolError> {
    Ok(ctx.grafana().search(Some(&params.query)).await?)
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.add(
        "search_dashboards",
        "Search for dashboards",
        search_dashboards,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GrafanaConfig;
    use crate::core::context::RequestContext;
    use crate::core::output::CallToolResult;
    use crate::core::tool::ArgumentPayload;
    use httpmock::prelude::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn searches_through_the_registry() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/search").query_param("query", "Demo");
            then.status(200)
                .json_body(serde_json::json!([{"uid": "d1", "title": "Demo"}]));
        });

        let mut registry = ToolRegistry::new();
        register(&mut registry).unwrap();
        let request = Arc::new(RequestContext::new(
            GrafanaConfig {
                url: server.base_url(),
                api_key: String::new(),
            },
            &reqwest::Client::new(),
        ));
        let mut arguments = ArgumentPayload::new();
        arguments.insert("query".to_string(), "Demo".into());

        let result = registry
            .call(request, "search_dashboards", arguments)
            .await
            .expect("search succeeds");

        mock.assert();
        assert_eq!(
            result,
            Some(CallToolResult::text(r#"[{"uid":"d1","title":"Demo"}]"#))
        );
    }
}
