use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{api_error, ApiError},
    middleware::security::client_ip,
    models::{
        auth::AuthenticatedUser,
        medication::{
            AdministerRequest, AdministrationQuery, CreateMedicationRequest, ExportQuery, MedicationQuery,
            UpdateMedicationRequest,
        },
    },
    routes::{audit, ok, page_body, require_care_team, require_management},
    services::{
        audit::{self as audit_log, AuditEntry},
        medication::MedicationService,
    },
    AppState,
};

pub async fn list_medications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<MedicationQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = MedicationService::list(&state.db, &q, state.config.low_stock_threshold)
        .await
        .map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_medication(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    MedicationService::detail(&state.db, id, Local::now().naive_local())
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn create_medication(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CreateMedicationRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let med = MedicationService::create(&state.db, &req, user.user_id, Local::now().naive_local())
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "create", "Medication", med.id);
    Ok((StatusCode::CREATED, ok(med)))
}

pub async fn update_medication(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMedicationRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let med = MedicationService::update(&state.db, id, &req, user.user_id, Local::now().naive_local())
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Medication", med.id);
    Ok(ok(med))
}

pub async fn toggle_medication(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let med = MedicationService::toggle_active(&state.db, id, user.user_id, Local::now().naive_local())
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Medication", med.id);
    Ok(ok(med))
}

pub async fn administer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<AdministerRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let record = MedicationService::administer(&state.db, id, user.user_id, &req, Local::now().naive_local())
        .await
        .map_err(api_error)?;

    audit_log::log(
        state.db.clone(),
        AuditEntry::new(user.user_id, "create", "MedicationAdministration", record.id)
            .details(json!({
                "medication_id": id,
                "status": record.status,
                "dose": record.dose_administered,
                "witness_id": record.witness_id,
            }))
            .ip(client_ip(&headers)),
    );
    Ok((StatusCode::CREATED, ok(record)))
}

pub async fn medication_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    MedicationService::dashboard(&state.db, Local::now().naive_local())
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn list_administrations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<AdministrationQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = MedicationService::list_administrations(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_administration(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    MedicationService::get_administration(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn export_administrations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Query(q): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    require_management(&user)?;
    let csv = MedicationService::export_csv(&state.db, &q).await.map_err(api_error)?;

    audit_log::log(
        state.db.clone(),
        AuditEntry::new(user.user_id, "export", "MedicationAdministration", "")
            .details(json!({ "start_date": q.start_date, "end_date": q.end_date }))
            .ip(client_ip(&headers)),
    );

    let filename = format!("medication_administrations_{}_{}.csv", q.start_date, q.end_date);
    Ok((
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        csv,
    )
        .into_response())
}
