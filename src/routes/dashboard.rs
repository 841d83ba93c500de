use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{api_error, ApiError},
    models::auth::AuthenticatedUser,
    routes::{require_care_team, require_management},
    services::dashboard::DashboardService,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<NaiveDate>,
}

/// GET /dashboard: tells the client which dashboard to load for the caller.
pub async fn dashboard_redirect(user: AuthenticatedUser) -> Json<Value> {
    let dashboard = user.role.dashboard();
    Json(json!({
        "role": user.role,
        "dashboard": dashboard,
        "path": format!("/dashboard/{dashboard}"),
    }))
}

pub async fn management_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    DashboardService::management(&state.db, Local::now().date_naive())
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn staff_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let today = Local::now().date_naive();
    DashboardService::staff(&state.db, user.user_id, q.date.unwrap_or(today), today)
        .await
        .map(Json)
        .map_err(api_error)
}
