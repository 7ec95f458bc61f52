/// Grafana Incident plugin client.
///
/// The Incident API is RPC style: every method is a `POST` to
/// `<grafana>/api/plugins/grafana-incident-app/resources/api/v1/<Service.Method>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ClientError, Transport};
use crate::core::config::GrafanaConfig;

const INCIDENT_API_PATH: [&str; 7] = [
    "api",
    "plugins",
    "grafana-incident-app",
    "resources",
    "api",
    "v1",
    "",
];

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentsQuery {
    pub query_string: String,
    pub order_direction: String,
    pub limit: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryIncidentsRequest {
    pub query: IncidentsQuery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct IncidentLabel {
    /// The label text
    pub label: String,
    /// Optional description of the label
    pub description: String,
    /// Optional color of the label
    pub color_hex: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncidentRequest {
    pub title: String,
    pub severity: String,
    pub room_prefix: String,
    pub is_drill: bool,
    pub status: String,
    pub attach_caption: String,
    #[serde(rename = "attachURL")]
    pub attach_url: String,
    pub labels: Vec<IncidentLabel>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddActivityRequest {
    #[serde(rename = "incidentID")]
    pub incident_id: String,
    pub activity_kind: String,
    pub body: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub event_time: String,
}

#[derive(Clone)]
pub struct IncidentClient {
    transport: Transport,
}

impl IncidentClient {
    pub fn new(http: reqwest::Client, config: &GrafanaConfig) -> Self {
        Self {
            transport: Transport::new(http, config.url.clone(), config.api_key.clone()),
        }
    }

    /// Root of the Incident RPC API, with a trailing slash.
    pub fn remote_host(&self) -> String {
        format!(
            "{}/{}",
            self.transport.base_url(),
            INCIDENT_API_PATH.join("/")
        )
    }

    async fn call(&self, method: &str, body: &impl Serialize) -> Result<Value, ClientError> {
        let mut segments = INCIDENT_API_PATH[..INCIDENT_API_PATH.len() - 1].to_vec();
        segments.push(method);
        self.transport.post(&segments, body).await
    }

    /// Returns the `incidents` array of the response.
    pub async fn query_incidents(&self, request: &QueryIncidentsRequest) -> Result<Value, ClientError> {
        let mut response = self.call("IncidentsService.QueryIncidents", request).await?;
        Ok(response
            .get_mut("incidents")
            .map(Value::take)
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    pub async fn create_incident(&self, request: &CreateIncidentRequest) -> Result<Value, ClientError> {
        let mut response = self.call("IncidentsService.CreateIncident", request).await?;
        Ok(response.get_mut("incident").map(Value::take).unwrap_or(response))
    }

    pub async fn add_activity(&self, request: &AddActivityRequest) -> Result<Value, ClientError> {
        let mut response = self.call("ActivityService.AddActivity", request).await?;
        Ok(response
            .get_mut("activityItem")
            .map(Value::take)
            .unwrap_or(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;

    fn client(url: &str) -> IncidentClient {
        let config = GrafanaConfig {
            url: url.to_string(),
            api_key: "token".to_string(),
        };
        IncidentClient::new(reqwest::Client::new(), &config)
    }

    #[test]
    fn remote_host_points_at_plugin_api() {
        assert_eq!(
            client("http://my-test-url.grafana.com").remote_host(),
            "http://my-test-url.grafana.com/api/plugins/grafana-incident-app/resources/api/v1/"
        );
    }

    #[tokio::test]
    async fn query_incidents_posts_rpc_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/plugins/grafana-incident-app/resources/api/v1/IncidentsService.QueryIncidents")
                .header("authorization", "Bearer token")
                .json_body(serde_json::json!({
                    "query": {"queryString": "isdrill:false", "orderDirection": "DESC", "limit": 2}
                }));
            then.status(200)
                .json_body(serde_json::json!({"incidents": [{"incidentID": "1"}], "cursor": {}}));
        });

        let request = QueryIncidentsRequest {
            query: IncidentsQuery {
                query_string: "isdrill:false".to_string(),
                order_direction: "DESC".to_string(),
                limit: 2,
            },
        };
        let incidents = client(&server.base_url())
            .query_incidents(&request)
            .await
            .expect("query should succeed");

        mock.assert();
        assert_eq!(incidents, serde_json::json!([{"incidentID": "1"}]));
    }

    #[test]
    fn activity_request_uses_incident_field_names() {
        let request = AddActivityRequest {
            incident_id: "42".to_string(),
            activity_kind: "userNote".to_string(),
            body: "looking".to_string(),
            event_time: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"incidentID": "42", "activityKind": "userNote", "body": "looking"})
        );
    }
}
