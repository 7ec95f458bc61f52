/// Grafana HTTP API client.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{ClientError, Transport};
use crate::core::config::GrafanaConfig;

#[derive(Clone)]
pub struct GrafanaClient {
    transport: Transport,
}

impl GrafanaClient {
    pub fn new(http: reqwest::Client, config: &GrafanaConfig) -> Self {
        Self {
            transport: Transport::new(http, config.url.clone(), config.api_key.clone()),
        }
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// `GET /api/search`, optionally filtered by a query string.
    pub async fn search(&self, query: Option<&str>) -> Result<Value, ClientError> {
        let params: Vec<(&str, String)> = query
            .filter(|q| !q.is_empty())
            .map(|q| vec![("query", q.to_string())])
            .unwrap_or_default();
        self.transport.get(&["api", "search"], &params).await
    }

    pub async fn list_datasources(&self) -> Result<Value, ClientError> {
        self.transport.get(&["api", "datasources"], &[]).await
    }

    pub async fn get_datasource_by_uid(&self, uid: &str) -> Result<Value, ClientError> {
        self.transport
            .get(&["api", "datasources", "uid", uid], &[])
            .await
    }

    pub async fn get_datasource_by_name(&self, name: &str) -> Result<Value, ClientError> {
        self.transport
            .get(&["api", "datasources", "name", name], &[])
            .await
    }

    pub async fn get_dashboard_by_uid(&self, uid: &str) -> Result<Value, ClientError> {
        self.transport
            .get(&["api", "dashboards", "uid", uid], &[])
            .await
    }

    /// `GET` through the datasource proxy, e.g. a Prometheus or Loki API path.
    ///
    /// `path` holds segments relative to the datasource root, such as
    /// `["api", "v1", "labels"]`. Each segment is percent-encoded on its own.
    pub async fn datasource_get<T: DeserializeOwned>(
        &self,
        uid: &str,
        path: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut segments = vec!["api", "datasources", "proxy", "uid", uid];
        segments.extend_from_slice(path);
        self.transport.get(&segments, query).await
    }

    /// Alert rules from the provisioning API.
    pub async fn list_alert_rules(&self) -> Result<Vec<Value>, ClientError> {
        self.transport
            .get(&["api", "v1", "provisioning", "alert-rules"], &[])
            .await
    }

    pub async fn get_alert_rule_by_uid(&self, uid: &str) -> Result<Value, ClientError> {
        self.transport
            .get(&["api", "v1", "provisioning", "alert-rules", uid], &[])
            .await
    }

    /// Settings of an app plugin, e.g. `grafana-irm-app`.
    pub async fn plugin_settings(&self, plugin_id: &str) -> Result<Value, ClientError> {
        self.transport
            .get(&["api", "plugins", plugin_id, "settings"], &[])
            .await
    }
}
