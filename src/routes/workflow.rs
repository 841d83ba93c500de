use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{api_error, not_found, ApiError},
    models::{
        auth::AuthenticatedUser,
        workflow::{
            DailySummaryQuery, DailySummaryRequest, GovernanceQuery, GovernanceRequest, HandoverQuery,
            ManagementHandoverRequest, ManagementNoteQuery, ManagementNoteRequest, ResolveNoteRequest, ShiftQuery,
            ShiftRequest, StaffHandoverRequest,
        },
    },
    routes::{audit, ok, page_body, require_care_team, require_management},
    services::workflow::{
        caller_staff, DailySummaryService, GovernanceService, ManagementHandoverService, ManagementNoteService,
        ShiftService, StaffHandoverService,
    },
    AppState,
};

// ─── Shifts ──────────────────────────────────────────────────────────────────

/// Management sees every shift; staff are pinned to their own.
pub async fn list_shifts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<ShiftQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let own = if user.is_management() {
        None
    } else {
        Some(caller_staff(&state.db, user.user_id).await.map_err(api_error)?.id)
    };
    let (items, total) = ShiftService::list(&state.db, &q, own).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_shift(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let shift = ShiftService::get(&state.db, id).await.map_err(api_error)?;
    if !user.is_management() {
        let staff = caller_staff(&state.db, user.user_id).await.map_err(api_error)?;
        if staff.id != shift.staff_member_id {
            return Err(not_found("Shift"));
        }
    }
    Ok(ok(shift))
}

pub async fn create_shift(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<ShiftRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_management(&user)?;
    let shift = ShiftService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "StaffShift", shift.id);
    Ok((StatusCode::CREATED, ok(shift)))
}

pub async fn update_shift(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ShiftRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let shift = ShiftService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "StaffShift", shift.id);
    Ok(ok(shift))
}

pub async fn toggle_shift_completed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let shift = ShiftService::toggle_completed(&state.db, id, &user).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "StaffShift", shift.id);
    Ok(ok(shift))
}

// ─── Daily summaries ─────────────────────────────────────────────────────────

pub async fn list_daily_summaries(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<DailySummaryQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = DailySummaryService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_daily_summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    DailySummaryService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_daily_summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<DailySummaryRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let summary = DailySummaryService::create(&state.db, &req, &user).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "DailySummary", summary.id);
    Ok((StatusCode::CREATED, ok(summary)))
}

pub async fn update_daily_summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<DailySummaryRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let summary = DailySummaryService::update(&state.db, id, &req, &user).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "DailySummary", summary.id);
    Ok(ok(summary))
}

// ─── Staff handovers ─────────────────────────────────────────────────────────

pub async fn list_staff_handovers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<HandoverQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = StaffHandoverService::list(&state.db, &q, &user).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_staff_handover(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    StaffHandoverService::get(&state.db, id, &user).await.map(ok).map_err(api_error)
}

pub async fn create_staff_handover(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<StaffHandoverRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let handover = StaffHandoverService::create(&state.db, &req, &user).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "StaffHandover", handover.id);
    Ok((StatusCode::CREATED, ok(handover)))
}

pub async fn acknowledge_staff_handover(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let handover = StaffHandoverService::acknowledge(&state.db, id, &user).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "StaffHandover", handover.id);
    Ok(ok(handover))
}

// ─── Management daily notes ──────────────────────────────────────────────────

pub async fn list_management_notes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<ManagementNoteQuery>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let (items, total) = ManagementNoteService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_management_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    ManagementNoteService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_management_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<ManagementNoteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_management(&user)?;
    let note = ManagementNoteService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "ManagementDailyNote", note.id);
    Ok((StatusCode::CREATED, ok(note)))
}

pub async fn update_management_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ManagementNoteRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let note = ManagementNoteService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "ManagementDailyNote", note.id);
    Ok(ok(note))
}

pub async fn resolve_management_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveNoteRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let note = ManagementNoteService::resolve(&state.db, id, req.resolution_notes.as_deref(), user.user_id)
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "update", "ManagementDailyNote", note.id);
    Ok(ok(note))
}

// ─── Management handovers ────────────────────────────────────────────────────

pub async fn list_management_handovers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<HandoverQuery>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let (items, total) = ManagementHandoverService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_management_handover(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    ManagementHandoverService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_management_handover(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<ManagementHandoverRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_management(&user)?;
    let handover = ManagementHandoverService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "ManagementHandover", handover.id);
    Ok((StatusCode::CREATED, ok(handover)))
}

pub async fn acknowledge_management_handover(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let handover = ManagementHandoverService::acknowledge(&state.db, id, user.user_id)
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "update", "ManagementHandover", handover.id);
    Ok(ok(handover))
}

// ─── Governance ──────────────────────────────────────────────────────────────

pub async fn list_governance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<GovernanceQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = GovernanceService::list(&state.db, &q, user.is_management())
        .await
        .map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_governance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    GovernanceService::get(&state.db, id, user.is_management())
        .await
        .map(ok)
        .map_err(api_error)
}

pub async fn create_governance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<GovernanceRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_management(&user)?;
    let record = GovernanceService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "GovernanceRecord", record.id);
    Ok((StatusCode::CREATED, ok(record)))
}

pub async fn update_governance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<GovernanceRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let record = GovernanceService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "GovernanceRecord", record.id);
    Ok(ok(record))
}
