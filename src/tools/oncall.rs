/// Grafana OnCall tools: schedules, shifts, teams and users.
///
/// Every call first discovers the OnCall API through the IRM plugin settings,
/// so a Grafana without the plugin fails with a descriptive error.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::oncall::Schedule;
use crate::client::OnCallClient;
use crate::core::context::ToolContext;
use crate::core::error::RegistrationError;
use crate::core::output::Json;
use crate::core::registry::ToolRegistry;
use crate::core::schema::ToolArgs;
use crate::tools::ToolError;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ListOnCallSchedulesParams {
    /// The ID of the team to list schedules for
    pub team_id: String,
    /// The ID of the schedule to get details for. If provided, returns only that schedule's details
    pub schedule_id: String,
    /// The page number to return (1-based)
    pub page: u32,
}

impl ToolArgs for ListOnCallSchedulesParams {
    const REQUIRED: &'static [&'static str] = &[];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct GetOnCallShiftParams {
    /// The ID of the shift to get details for
    pub shift_id: String,
}

impl ToolArgs for GetOnCallShiftParams {
    const REQUIRED: &'static [&'static str] = &["shiftId"];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct GetCurrentOnCallUsersParams {
    /// The ID of the schedule to get current on-call users for
    pub schedule_id: String,
}

impl ToolArgs for GetCurrentOnCallUsersParams {
    const REQUIRED: &'static [&'static str] = &["scheduleId"];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ListOnCallTeamsParams {
    /// The page number to return
    pub page: u32,
}

impl ToolArgs for ListOnCallTeamsParams {
    const REQUIRED: &'static [&'static str] = &[];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ListOnCallUsersParams {
    /// The ID of the user to get details for. If provided, returns only that user's details
    pub user_id: String,
    /// The username to filter users by. If provided, returns only the user matching this username
    pub username: String,
    /// The page number to return
    pub page: u32,
}

impl ToolArgs for ListOnCallUsersParams {
    const REQUIRED: &'static [&'static str] = &[];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub id: String,
    pub name: String,
    pub team_id: String,
    pub timezone: String,
    pub shifts: Vec<String>,
}

impl From<Schedule> for ScheduleSummary {
    fn from(schedule: Schedule) -> Self {
        Self {
            id: schedule.id,
            name: schedule.name,
            team_id: schedule.team_id.unwrap_or_default(),
            timezone: schedule.time_zone.unwrap_or_default(),
            shifts: schedule.shifts.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentOnCallUsers {
    pub schedule_id: String,
    pub schedule_name: String,
    pub users: Vec<String>,
}

fn page(page: u32) -> Option<u32> {
    (page > 0).then_some(page)
}

fn required(name: &'static str, value: &str) -> Result<(), ToolError> {
    if value.is_empty() {
        return Err(ToolError::invalid(name, "must not be empty"));
    }
    Ok(())
}

async fn client(ctx: &ToolContext) -> Result<OnCallClient, ToolError> {
    Ok(ctx.oncall().await?)
}

pub async fn list_oncall_schedules(
    ctx: ToolContext,
    params: ListOnCallSchedulesParams,
) -> Result<Json<Vec<ScheduleSummary>>, ToolError> {
    let oncall = client(&ctx).await?;
    if !params.schedule_id.is_empty() {
        let schedule = oncall.get_schedule(&params.schedule_id).await?;
        return Ok(Json(vec![schedule.into()]));
    }

    // The schedules endpoint has no team filter.
    let schedules = oncall.list_schedules(page(params.page)).await?.results;
    let summaries = schedules
        .into_iter()
        .filter(|schedule| {
            params.team_id.is_empty()
                || schedule.team_id.as_deref() == Some(params.team_id.as_str())
        })
        .map(ScheduleSummary::from)
        .collect();
    Ok(Json(summaries))
}

pub async fn get_oncall_shift(
    ctx: ToolContext,
    params: GetOnCallShiftParams,
) -> Result<Value, ToolError> {
    required("shiftId", &params.shift_id)?;
    Ok(client(&ctx).await?.get_shift(&params.shift_id).await?)
}

pub async fn get_current_oncall_users(
    ctx: ToolContext,
    params: GetCurrentOnCallUsersParams,
) -> Result<Json<CurrentOnCallUsers>, ToolError> {
    required("scheduleId", &params.schedule_id)?;
    let schedule = client(&ctx).await?.get_schedule(&params.schedule_id).await?;
    Ok(Json(CurrentOnCallUsers {
        schedule_id: schedule.id,
        schedule_name: schedule.name,
        users: schedule.on_call_now,
    }))
}

pub async fn list_oncall_teams(
    ctx: ToolContext,
    params: ListOnCallTeamsParams,
) -> Result<Json<Vec<Value>>, ToolError> {
    let teams = client(&ctx).await?.list_teams(page(params.page)).await?;
    Ok(Json(teams.results))
}

pub async fn list_oncall_users(
    ctx: ToolContext,
    params: ListOnCallUsersParams,
) -> Result<Json<Vec<Value>>, ToolError> {
    let oncall = client(&ctx).await?;
    if !params.user_id.is_empty() {
        return Ok(Json(vec![oncall.get_user(&params.user_id).await?]));
    }
    let username = Some(params.username.as_str()).filter(|name| !name.is_empty());
    let users = oncall.list_users(page(params.page), username).await?;
    Ok(Json(users.results))
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.add(
        "list_oncall_schedules",
        "List OnCall schedules. A schedule is a calendar-based system defining when team members are on-call. Optionally provide a scheduleId to get details for a specific schedule",
        list_oncall_schedules,
    )?;
    registry.add(
        "get_oncall_shift",
        "Get details for a specific OnCall shift. A shift represents a designated time period within a rotation when a team or individual is actively on-call",
        get_oncall_shift,
    )?;
    registry.add(
        "get_current_oncall_users",
        "Get users currently on-call for a specific schedule. A schedule is a calendar-based system defining when team members are on-call",
        get_current_oncall_users,
    )?;
    registry.add(
        "list_oncall_teams",
        "List teams from Grafana OnCall",
        list_oncall_teams,
    )?;
    registry.add(
        "list_oncall_users",
        "List users from Grafana OnCall. If user ID is provided, returns details for that specific user. If username is provided, returns the user matching that username",
        list_oncall_users,
    )
}
