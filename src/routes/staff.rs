use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{api_error, ApiError},
    models::{
        auth::AuthenticatedUser,
        staff::{
            CreateDepartmentRequest, CreateStaffRequest, RoleRequest, StaffQuery, UpdateDepartmentRequest,
            UpdateStaffRequest, STAFF_PAGE_SIZE,
        },
        user::{AdminResetPasswordRequest, AdminResetPasswordResponse},
    },
    routes::{audit, ok, require_care_team, require_management},
    services::staff::{DepartmentService, RoleService, StaffService},
    AppState,
};

pub fn login_url(state: &AppState) -> String {
    format!("{}/login", state.config.app_base_url.trim_end_matches('/'))
}

#[derive(Debug, Deserialize)]
pub struct DepartmentListQuery {
    pub include_inactive: Option<bool>,
}

// ─── Departments ─────────────────────────────────────────────────────────────

pub async fn list_departments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<DepartmentListQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let include_inactive = q.include_inactive.unwrap_or(false) && user.is_management();
    DepartmentService::list(&state.db, include_inactive).await.map(ok).map_err(api_error)
}

pub async fn get_department(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    DepartmentService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_department(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_management(&user)?;
    let dept = DepartmentService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "Department", dept.id);
    Ok((StatusCode::CREATED, ok(dept)))
}

pub async fn update_department(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDepartmentRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let dept = DepartmentService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Department", dept.id);
    Ok(ok(dept))
}

pub async fn toggle_department(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let dept = DepartmentService::toggle_active(&state.db, id, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Department", dept.id);
    Ok(ok(dept))
}

// ─── Roles ───────────────────────────────────────────────────────────────────

pub async fn list_roles(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    RoleService::list(&state.db).await.map(ok).map_err(api_error)
}

pub async fn get_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    RoleService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<RoleRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_management(&user)?;
    let role = RoleService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "Role", role.id);
    Ok((StatusCode::CREATED, ok(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let role = RoleService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Role", role.id);
    Ok(ok(role))
}

pub async fn delete_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_management(&user)?;
    RoleService::delete(&state.db, id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "delete", "Role", id);
    Ok(StatusCode::NO_CONTENT)
}

// ─── Staff members ───────────────────────────────────────────────────────────

pub async fn list_staff(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<StaffQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = StaffService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(json!({
        "items": items,
        "total": total,
        "page": q.page.unwrap_or(1).max(1),
        "per_page": STAFF_PAGE_SIZE,
    })))
}

pub async fn get_staff(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    StaffService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_staff(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_management(&user)?;
    let created = StaffService::create(&state.db, state.email.as_deref(), &login_url(&state), &req, user.user_id)
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "create", "StaffMember", created.staff_member.id);
    Ok((StatusCode::CREATED, ok(created)))
}

pub async fn update_staff(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStaffRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let staff = StaffService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "StaffMember", staff.id);
    Ok(ok(staff))
}

pub async fn toggle_staff(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let staff = StaffService::toggle_active(&state.db, id, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "StaffMember", staff.id);
    Ok(ok(staff))
}

pub async fn reset_staff_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let staff = StaffService::get(&state.db, id).await.map_err(api_error)?;
    let temp_password = StaffService::reset_password(&state.db, staff.user_id, req.new_password.as_deref())
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "update", "StaffMember", staff.id);
    Ok(ok(AdminResetPasswordResponse {
        message: format!("Password reset for {}", staff.username),
        temp_password,
    }))
}
