use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{api_error, ApiError},
    models::auth::AuthenticatedUser,
    routes::require_management,
    services::reports::ReportService,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ReportDateQuery {
    pub date: Option<NaiveDate>,
}

impl ReportDateQuery {
    fn date_or_today(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }
}

pub async fn daily_activities_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<ReportDateQuery>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    ReportService::daily_activities(&state.db, q.date_or_today())
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn medication_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    ReportService::medication(&state.db, Local::now().naive_local()).await.map(Json).map_err(api_error)
}

pub async fn incident_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    ReportService::incidents(&state.db, Local::now().date_naive())
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn staff_shifts_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<ReportDateQuery>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    ReportService::staff_shifts(&state.db, q.date_or_today())
        .await
        .map(Json)
        .map_err(api_error)
}
