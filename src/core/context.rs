/// Execution Context for Tool Handlers
///
/// A `RequestContext` is resolved once per STDIO session or once per HTTP
/// request and then shared read-only by every tool call made under it. Each
/// handler receives a `ToolContext`, which is the shared request context plus
/// the name of the tool being invoked.

use std::sync::Arc;

use crate::client::{ClientError, GrafanaClient, IncidentClient, OnCallClient};
use crate::core::config::GrafanaConfig;

/// Resolved configuration and the backend clients built from it.
pub struct RequestContext {
    config: GrafanaConfig,
    grafana: GrafanaClient,
    incident: IncidentClient,
    http: reqwest::Client,
}

impl RequestContext {
    /// Build the backend clients for `config`.
    ///
    /// `http` is cloned into each client; clones share one connection pool.
    pub fn new(config: GrafanaConfig, http: &reqwest::Client) -> Self {
        tracing::debug!(
            url = %config.redacted_url(),
            api_key_set = config.api_key_set(),
            "resolved Grafana configuration"
        );
        let grafana = GrafanaClient::new(http.clone(), &config);
        let incident = IncidentClient::new(http.clone(), &config);
        Self {
            config,
            grafana,
            incident,
            http: http.clone(),
        }
    }

    pub fn config(&self) -> &GrafanaConfig {
        &self.config
    }

    pub fn grafana(&self) -> &GrafanaClient {
        &self.grafana
    }

    pub fn incident(&self) -> &IncidentClient {
        &self.incident
    }

    /// Discover the OnCall API through the IRM plugin settings.
    pub async fn oncall(&self) -> Result<OnCallClient, ClientError> {
        OnCallClient::discover(&self.grafana, self.http.clone(), &self.config).await
    }
}

/// First argument of every tool handler.
///
/// Dropping the future a handler returns cancels the call at its next await
/// point, so the context carries no separate cancellation token.
#[derive(Clone)]
pub struct ToolContext {
    request: Arc<RequestContext>,
    tool: Arc<str>,
}

impl ToolContext {
    pub fn new(request: Arc<RequestContext>, tool: impl Into<Arc<str>>) -> Self {
        Self {
            request,
            tool: tool.into(),
        }
    }

    /// Name of the tool being invoked.
    pub fn tool_name(&self) -> &str {
        &self.tool
    }

    pub fn request(&self) -> &Arc<RequestContext> {
        &self.request
    }

    pub fn config(&self) -> &GrafanaConfig {
        self.request.config()
    }

    pub fn grafana(&self) -> &GrafanaClient {
        self.request.grafana()
    }

    pub fn incident(&self) -> &IncidentClient {
        self.request.incident()
    }

    pub async fn oncall(&self) -> Result<OnCallClient, ClientError> {
        self.request.oncall().await
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("tool", &self.tool)
            .field("config", self.config())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clients_share_the_resolved_config() {
        let config = GrafanaConfig {
            url: "http://grafana.internal:3000".to_string(),
            api_key: "token".to_string(),
        };
        let request = Arc::new(RequestContext::new(config.clone(), &reqwest::Client::new()));
        let ctx = ToolContext::new(request.clone(), "list_datasources");

        assert_eq!(ctx.tool_name(), "list_datasources");
        assert_eq!(ctx.config(), &config);
        assert_eq!(ctx.grafana().base_url(), "http://grafana.internal:3000");
        assert!(
            ctx.incident()
                .remote_host()
                .starts_with("http://grafana.internal:3000/api/plugins/")
        );
        assert!(Arc::ptr_eq(ctx.request(), &request));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let config = GrafanaConfig {
            url: "http://localhost:3000".to_string(),
            api_key: "glsa_secret".to_string(),
        };
        let ctx = ToolContext::new(
            Arc::new(RequestContext::new(config, &reqwest::Client::new())),
            "search_dashboards",
        );
        let rendered = format!("{ctx:?}");
        assert!(rendered.contains("search_dashboards"));
        assert!(!rendered.contains("glsa_secret"));
    }
}
