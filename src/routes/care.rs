use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Local;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{api_error, ApiError},
    models::{
        auth::AuthenticatedUser,
        care::{CarePlanRequest, PbsPlanRequest, PlanQuery, RiskAssessmentQuery, RiskAssessmentRequest},
    },
    routes::{audit, ok, page_body, require_care_team, require_management},
    services::care::{CarePlanService, PbsPlanService, RiskAssessmentService},
    AppState,
};

// ─── Care plans ──────────────────────────────────────────────────────────────

pub async fn list_care_plans(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<PlanQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = CarePlanService::list(&state.db, &q, Local::now().date_naive())
        .await
        .map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_care_plan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let plan = CarePlanService::get(&state.db, id).await.map_err(api_error)?;
    let due = plan.is_due_for_review(Local::now().date_naive());
    Ok(Json(json!({ "care_plan": plan, "is_due_for_review": due })))
}

pub async fn create_care_plan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CarePlanRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let plan = CarePlanService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "CarePlan", plan.id);
    Ok((StatusCode::CREATED, ok(plan)))
}

pub async fn update_care_plan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<CarePlanRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let plan = CarePlanService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "CarePlan", plan.id);
    Ok(ok(plan))
}

// ─── PBS plans ───────────────────────────────────────────────────────────────

pub async fn list_pbs_plans(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<PlanQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = PbsPlanService::list(&state.db, &q, Local::now().date_naive())
        .await
        .map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_pbs_plan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let plan = PbsPlanService::get(&state.db, id).await.map_err(api_error)?;
    let due = plan.is_due_for_review(Local::now().date_naive());
    Ok(Json(json!({ "pbs_plan": plan, "is_due_for_review": due })))
}

pub async fn create_pbs_plan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<PbsPlanRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let plan = PbsPlanService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "PBSPlan", plan.id);
    Ok((StatusCode::CREATED, ok(plan)))
}

pub async fn update_pbs_plan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<PbsPlanRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let plan = PbsPlanService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "PBSPlan", plan.id);
    Ok(ok(plan))
}

// ─── Risk assessments ────────────────────────────────────────────────────────

pub async fn list_risk_assessments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<RiskAssessmentQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = RiskAssessmentService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_risk_assessment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    RiskAssessmentService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_risk_assessment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<RiskAssessmentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let ra = RiskAssessmentService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "RiskAssessment", ra.id);
    Ok((StatusCode::CREATED, ok(ra)))
}

pub async fn update_risk_assessment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<RiskAssessmentRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let ra = RiskAssessmentService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "RiskAssessment", ra.id);
    Ok(ok(ra))
}

pub async fn toggle_risk_assessment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let ra = RiskAssessmentService::toggle_active(&state.db, id, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "RiskAssessment", ra.id);
    Ok(ok(ra))
}
