/// Grafana Incident tools.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::client::incident::{
    AddActivityRequest, CreateIncidentRequest, IncidentLabel, IncidentsQuery,
    QueryIncidentsRequest,
};
use crate::core::context::ToolContext;
use crate::core::error::RegistrationError;
use crate::core::registry::ToolRegistry;
use crate::core::schema::ToolArgs;
use crate::tools::{ToolError, parse_time};

const DEFAULT_INCIDENT_LIMIT: i64 = 10;
const DEFAULT_ROOM_PREFIX: &str = "incident";
const DEFAULT_STATUS: &str = "active";
const USER_NOTE: &str = "userNote";

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ListIncidentsParams {
    /// The maximum number of incidents to return
    pub limit: i64,
    /// Whether to include drill incidents
    pub drill: bool,
    /// The status of the incidents to include. Valid values: 'active', 'resolved'
    pub status: String,
}

impl Default for ListIncidentsParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_INCIDENT_LIMIT,
            drill: false,
            status: String::new(),
        }
    }
}

impl ToolArgs for ListIncidentsParams {
    const REQUIRED: &'static [&'static str] = &[];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateIncidentParams {
    /// The title of the incident
    pub title: String,
    /// The severity of the incident
    pub severity: String,
    /// The prefix of the room to create the incident in
    pub room_prefix: String,
    /// Whether the incident is a drill incident
    pub is_drill: bool,
    /// The status of the incident
    pub status: String,
    /// The caption of the attachment
    pub attach_caption: String,
    /// The URL of the attachment
    pub attach_url: String,
    /// The labels to add to the incident
    pub labels: Vec<IncidentLabel>,
}

impl ToolArgs for CreateIncidentParams {
    const REQUIRED: &'static [&'static str] = &[];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct AddActivityToIncidentParams {
    /// The ID of the incident to add the activity to
    pub incident_id: String,
    /// The body of the activity. URLs will be parsed and attached as context
    pub body: String,
    /// The time that the activity occurred in RFC3339 format. If not provided, the current time will be used
    pub event_time: String,
}

impl ToolArgs for AddActivityToIncidentParams {
    const REQUIRED: &'static [&'static str] = &[];
}

/// Incident search expression for the given filters.
fn query_string(drill: bool, status: &str) -> String {
    let mut query = if drill {
        String::new()
    } else {
        "isdrill:false".to_string()
    };
    if !status.is_empty() {
        if !query.is_empty() {
            query.push_str(" and ");
        }
        query.push_str("status:");
        query.push_str(status);
    }
    query
}

pub async fn list_incidents(
    ctx: ToolContext,
    params: ListIncidentsParams,
) -> Result<Value, ToolError> {
    let request = QueryIncidentsRequest {
        query: IncidentsQuery {
            query_string: query_string(params.drill, &params.status),
            order_direction: "DESC".to_string(),
            limit: if params.limit > 0 {
                params.limit
            } else {
                DEFAULT_INCIDENT_LIMIT
            },
        },
    };
    Ok(ctx.incident().query_incidents(&request).await?)
}

pub async fn create_incident(
    ctx: ToolContext,
    params: CreateIncidentParams,
) -> Result<Value, ToolError> {
    if params.title.trim().is_empty() {
        return Err(ToolError::invalid("title", "must not be empty"));
    }
    let or_default = |value: String, default: &str| {
        if value.is_empty() {
            default.to_string()
        } else {
            value
        }
    };
    let request = CreateIncidentRequest {
        title: params.title,
        severity: params.severity,
        room_prefix: or_default(params.room_prefix, DEFAULT_ROOM_PREFIX),
        is_drill: params.is_drill,
        status: or_default(params.status, DEFAULT_STATUS),
        attach_caption: params.attach_caption,
        attach_url: params.attach_url,
        labels: params.labels,
    };
    Ok(ctx.incident().create_incident(&request).await?)
}

pub async fn add_activity_to_incident(
    ctx: ToolContext,
    params: AddActivityToIncidentParams,
) -> Result<Value, ToolError> {
    if params.incident_id.trim().is_empty() {
        return Err(ToolError::invalid("incidentId", "must not be empty"));
    }
    let event_time = parse_time("eventTime", &params.event_time)?
        .map(|time| time.to_rfc3339())
        .unwrap_or_default();
    let request = AddActivityRequest {
        incident_id: params.incident_id,
        activity_kind: USER_NOTE.to_string(),
        body: params.body,
        event_time,
    };
    Ok(ctx.incident().add_activity(&request).await?)
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.add(
        "list_incidents",
        "List incidents in Grafana Incident. Incidents are returned newest first.",
        list_incidents,
    )?;
    registry.add(
        "create_incident",
        "Create an incident in Grafana Incident",
        create_incident,
    )?;
    registry.add(
        "add_activity_to_incident",
        "Add an activity to an incident in Grafana Incident",
        add_activity_to_incident,
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

    const API: &str = "/api/plugins/grafana-incident-app/resources/api/v1";

    fn context(server: &MockServer) -> ToolContext {
        let config = GrafanaConfig {
            url: server.base_url(),
            api_key: "token".to_string(),
        };
        ToolContext::new(
            Arc::new(RequestContext::new(config, &reqwest::Client::new())),
            "incident",
        )
    }

    #[test]
    fn builds_query_strings() {
        assert_eq!(query_string(false, ""), "isdrill:false");
        assert_eq!(query_string(false, "active"), "isdrill:false and status:active");
        assert_eq!(query_string(true, ""), "");
        assert_eq!(query_string(true, "resolved"), "status:resolved");
    }

    #[test]
    fn list_schema_has_no_required_fields() {
        let schema = crate::core::schema::derive_input_schema::<ListIncidentsParams>().unwrap();
        assert!(schema.required().is_empty());
        assert_eq!(schema.len(), 3);
    }

    #[tokio::test]
    async fn lists_active_incidents_newest_first() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("{API}/IncidentsService.QueryIncidents"))
                .json_body(serde_json::json!({
                    "query": {
                        "queryString": "isdrill:false and status:active",
                        "orderDirection": "DESC",
                        "limit": 10
                    }
                }));
            then.status(200)
                .json_body(serde_json::json!({"incidents": [{"incidentID": "7", "title": "DB down"}]}));
        });

        let incidents = list_incidents(
            context(&server),
            ListIncidentsParams {
                status: "active".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("incidents listed");

        mock.assert();
        assert_eq!(incidents[0]["title"], "DB down");
    }

    #[tokio::test]
    async fn creates_incident_with_defaults() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("{API}/IncidentsService.CreateIncident"))
                .json_body(serde_json::json!({
                    "title": "High error rate",
                    "severity": "minor",
                    "roomPrefix": "incident",
                    "isDrill": true,
                    "status": "active",
                    "attachCaption": "",
                    "attachURL": "",
                    "labels": [{"label": "api", "description": "", "colorHex": ""}]
                }));
            then.status(200)
                .json_body(serde_json::json!({"incident": {"incidentID": "8"}}));
        });

        let incident = create_incident(
            context(&server),
            CreateIncidentParams {
                title: "High error rate".to_string(),
                severity: "minor".to_string(),
                is_drill: true,
                labels: vec![IncidentLabel {
                    label: "api".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .await
        .expect("incident created");

        mock.assert();
        assert_eq!(incident["incidentID"], "8");
    }

    #[tokio::test]
    async fn adds_user_note() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("{API}/ActivityService.AddActivity"))
                .json_body(serde_json::json!({
                    "incidentID": "8",
                    "activityKind": "userNote",
                    "body": "rolled back",
                    "eventTime": "2024-05-01T12:00:00+00:00"
                }));
            then.status(200)
                .json_body(serde_json::json!({"activityItem": {"activityItemID": "a1"}}));
        });

        let activity = add_activity_to_incident(
            context(&server),
            AddActivityToIncidentParams {
                incident_id: "8".to_string(),
                body: "rolled back".to_string(),
                event_time: "2024-05-01T12:00:00Z".to_string(),
            },
        )
        .await
        .expect("activity added");

        mock.assert();
        assert_eq!(activity["activityItemID"], "a1");
    }

    #[tokio::test]
    async fn rejects_bad_event_time() {
        let server = MockServer::start();
        let error = add_activity_to_incident(
            context(&server),
            AddActivityToIncidentParams {
                incident_id: "8".to_string(),
                body: "note".to_string(),
                event_time: "noon".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            error,
            ToolError::InvalidArgument {
                name: "eventTime",
                ..
            }
        ));
    }
}
