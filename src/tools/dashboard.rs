/// Dashboard retrieval tool.

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
pub struct GetDashboardByUidParams {
    /// The UID of the dashboard
    pub uid: String,
}

impl ToolArgs for GetDashboardByUidParams {
    const REQUIRED: &'static [&'static str] = &["uid"];
}

pub async fn get_dashboard_by_uid(
    ctx: ToolContext,
    params: GetDashboardByUidParams,
) -> Result<Value, ToolError> {
    if params.uid.is_empty() {
        return Err(ToolError::invalid("uid", "must not be empty"));
    }
    Ok(ctx.grafana().get_dashboard_by_uid(&params.uid).await?)
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.add(
        "get_dashboard_by_uid",
        "Retrieves the complete dashboard, including panels, variables, and settings, for a specific dashboard identified by its UID.",
        get_dashboard_by_uid,
    )
}
