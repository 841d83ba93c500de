use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Local;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{api_error, ApiError},
    models::{
        auth::AuthenticatedUser,
        resident::{CreateServiceUserRequest, ServiceUserQuery, UpdateServiceUserRequest},
    },
    routes::{audit, ok, page_body, require_care_team, require_management},
    services::{photos, residents::ResidentService},
    AppState,
};

pub async fn list_residents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<ServiceUserQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = ResidentService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_resident(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    ResidentService::detail(&state.db, id, Local::now().date_naive())
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn create_resident(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CreateServiceUserRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_management(&user)?;
    let resident = ResidentService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "ServiceUser", resident.id);
    Ok((StatusCode::CREATED, ok(resident)))
}

pub async fn update_resident(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateServiceUserRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let resident = ResidentService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "ServiceUser", resident.id);
    Ok(ok(resident))
}

pub async fn toggle_resident(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let resident = ResidentService::toggle_active(&state.db, id, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "ServiceUser", resident.id);
    Ok(ok(resident))
}

pub async fn upload_photo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let image = photos::read_image(multipart).await.map_err(api_error)?;
    let resident = ResidentService::set_photo(&state.db, &state.config.media_dir, id, &image, user.user_id)
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "update", "ServiceUser", resident.id);
    Ok(ok(resident))
}
