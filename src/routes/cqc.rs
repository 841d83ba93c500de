use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{api_error, ApiError},
    middleware::security::client_ip,
    models::{
        auth::AuthenticatedUser,
        document::DocumentQuery,
        staff::{CreateCqcMemberRequest, UpdateCqcMemberRequest},
        user::{AdminResetPasswordRequest, AdminResetPasswordResponse},
    },
    routes::{audit, documents::file_response, ok, page_body, require_cqc, require_management, staff::login_url},
    services::{
        cqc::{AccessedItem, CqcMemberService, CqcPortalService},
        documents::DocumentService,
        staff::StaffService,
    },
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct MemberListQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AccessLogQuery {
    pub cqc_member_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

// ─── Member administration (management) ──────────────────────────────────────

pub async fn list_members(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<MemberListQuery>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let (items, total) = CqcMemberService::list(&state.db, q.search.as_deref(), q.page, q.per_page)
        .await
        .map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    CqcMemberService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CreateCqcMemberRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_management(&user)?;
    let created = CqcMemberService::create(&state.db, state.email.as_deref(), &login_url(&state), &req, user.user_id)
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "create", "CQCMember", created.cqc_member.id);
    Ok((StatusCode::CREATED, ok(created)))
}

pub async fn update_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCqcMemberRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let member = CqcMemberService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "CQCMember", member.id);
    Ok(ok(member))
}

pub async fn toggle_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let member = CqcMemberService::toggle_active(&state.db, id, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "CQCMember", member.id);
    Ok(ok(member))
}

pub async fn reset_member_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let member = CqcMemberService::get(&state.db, id).await.map_err(api_error)?;
    let temp_password = StaffService::reset_password(&state.db, member.user_id, req.new_password.as_deref())
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "update", "CQCMember", member.id);
    Ok(ok(AdminResetPasswordResponse {
        message: format!("Password reset for {}", member.cqc_id),
        temp_password,
    }))
}

pub async fn access_log(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<AccessLogQuery>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let (items, total) = CqcPortalService::access_log(&state.db, q.cqc_member_id, q.page, q.per_page)
        .await
        .map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

// ─── Portal (CQC members) ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PortalPage {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_cqc(&user)?;
    let member = CqcMemberService::for_user(&state.db, user.user_id).await.map_err(api_error)?;
    let body = CqcPortalService::dashboard(&state.db, &member, Utc::now()).await.map_err(api_error)?;
    let item = AccessedItem { item_type: "dashboard", item_id: member.id.to_string(), title: "CQC dashboard" };
    CqcPortalService::record_access(&state.db, &member, item, &client_ip(&headers))
        .await
        .map_err(api_error)?;
    Ok(Json(body))
}

pub async fn list_incidents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Query(q): Query<PortalPage>,
) -> Result<Json<Value>, ApiError> {
    require_cqc(&user)?;
    let member = CqcMemberService::for_user(&state.db, user.user_id).await.map_err(api_error)?;
    let (items, total) = CqcPortalService::visible_incidents(&state.db, &member, Utc::now(), q.page, q.per_page)
        .await
        .map_err(api_error)?;
    let item = AccessedItem { item_type: "incident_list", item_id: String::new(), title: "Incident list" };
    CqcPortalService::record_access(&state.db, &member, item, &client_ip(&headers))
        .await
        .map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_incident(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_cqc(&user)?;
    let member = CqcMemberService::for_user(&state.db, user.user_id).await.map_err(api_error)?;
    let incident = CqcPortalService::incident(&state.db, &member, id, Utc::now()).await.map_err(api_error)?;
    let item = AccessedItem { item_type: "incident", item_id: incident.id.to_string(), title: &incident.title };
    CqcPortalService::record_access(&state.db, &member, item, &client_ip(&headers))
        .await
        .map_err(api_error)?;
    Ok(ok(incident))
}

pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Query(q): Query<DocumentQuery>,
) -> Result<Json<Value>, ApiError> {
    require_cqc(&user)?;
    let member = CqcMemberService::for_user(&state.db, user.user_id).await.map_err(api_error)?;
    let (items, total) = DocumentService::list(&state.db, &q, true).await.map_err(api_error)?;
    let item = AccessedItem { item_type: "document_list", item_id: String::new(), title: "Document list" };
    CqcPortalService::record_access(&state.db, &member, item, &client_ip(&headers))
        .await
        .map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn download_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_cqc(&user)?;
    let member = CqcMemberService::for_user(&state.db, user.user_id).await.map_err(api_error)?;
    let doc = CqcPortalService::document(&state.db, id).await.map_err(api_error)?;
    let bytes = DocumentService::read_plaintext(&state.config.media_dir, &state.config.encryption_master_key, &doc)
        .await
        .map_err(api_error)?;

    let item = AccessedItem { item_type: "document", item_id: doc.id.to_string(), title: &doc.title };
    CqcPortalService::record_access(&state.db, &member, item, &client_ip(&headers))
        .await
        .map_err(api_error)?;
    Ok(file_response(&doc, bytes))
}

pub async fn my_access_log(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<PortalPage>,
) -> Result<Json<Value>, ApiError> {
    require_cqc(&user)?;
    let member = CqcMemberService::for_user(&state.db, user.user_id).await.map_err(api_error)?;
    let (items, total) = CqcPortalService::access_log(&state.db, Some(member.id), q.page, q.per_page)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({
        "cqc_id": member.cqc_id,
        "last_access": member.last_access,
        "log": page_body(&items, total, q.page, q.per_page),
    })))
}
