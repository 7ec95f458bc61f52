/// Grafana OnCall API client.
///
/// The OnCall API lives on its own host. Its URL is published in the
/// `grafana-irm-app` plugin settings as `jsonData.onCallApiUrl`, so a client is
/// discovered through Grafana before each use. Requests carry the Grafana
/// token as-is together with the Grafana URL it belongs to.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{ClientError, GrafanaClient, Transport};
use crate::core::config::GrafanaConfig;

pub const IRM_PLUGIN_ID: &str = "grafana-irm-app";

/// One page of a paginated OnCall list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub team_id: Option<String>,
    pub time_zone: Option<String>,
    pub on_call_now: Vec<String>,
    pub shifts: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct OnCallClient {
    transport: Transport,
}

impl OnCallClient {
    pub fn new(http: reqwest::Client, api_url: &str, config: &GrafanaConfig) -> Self {
        Self {
            transport: Transport::grafana_token(
                http,
                api_url.trim_end_matches('/').to_string(),
                config.api_key.clone(),
                config.url.clone(),
            ),
        }
    }

    /// Look up the OnCall API URL in the IRM plugin settings and build a client for it.
    pub async fn discover(
        grafana: &GrafanaClient,
        http: reqwest::Client,
        config: &GrafanaConfig,
    ) -> Result<Self, ClientError> {
        let settings = grafana.plugin_settings(IRM_PLUGIN_ID).await?;
        let api_url = settings
            .pointer("/jsonData/onCallApiUrl")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .ok_or(ClientError::MissingSetting {
                plugin: IRM_PLUGIN_ID,
                field: "jsonData.onCallApiUrl",
            })?;
        tracing::debug!(api_url, "discovered OnCall API");
        Ok(Self::new(http, api_url, config))
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// `GET api/v1/<collection>/[<id>/]`. OnCall paths end with a slash.
    async fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: Option<&str>,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut segments = vec!["api", "v1", collection];
        segments.extend(id);
        segments.push("");
        self.transport.get(&segments, query).await
    }

    pub async fn list_schedules(&self, page: Option<u32>) -> Result<Page<Schedule>, ClientError> {
        self.get("schedules", None, &page_query(page)).await
    }

    pub async fn get_schedule(&self, id: &str) -> Result<Schedule, ClientError> {
        self.get("schedules", Some(id), &[]).await
    }

    pub async fn get_shift(&self, id: &str) -> Result<Value, ClientError> {
        self.get("on_call_shifts", Some(id), &[]).await
    }

    pub async fn list_teams(&self, page: Option<u32>) -> Result<Page<Value>, ClientError> {
        self.get("teams", None, &page_query(page)).await
    }

    pub async fn list_users(
        &self,
        page: Option<u32>,
        username: Option<&str>,
    ) -> Result<Page<Value>, ClientError> {
        let mut query = page_query(page);
        if let Some(username) = username {
            query.push(("username", username.to_string()));
        }
        self.get("users", None, &query).await
    }

    pub async fn get_user(&self, id: &str) -> Result<Value, ClientError> {
        self.get("users", Some(id), &[]).await
    }
}

fn page_query(page: Option<u32>) -> Vec<(&'static str, String)> {
    page.map(|page| vec![("page", page.to_string())])
        .unwrap_or_default()
}
