use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::{api_error, ApiError},
    middleware::security::client_ip,
    models::{auth::AuthenticatedUser, notification::UpdateSettingRequest},
    routes::{ok, require_management},
    services::{
        audit::{self as audit_log, AuditEntry},
        settings::SettingsService,
    },
    AppState,
};

/// GET /settings (management)
pub async fn list_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let settings = SettingsService::list(&state.db).await.map_err(api_error)?;
    Ok(Json(json!({ "items": settings })))
}

pub async fn get_setting(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    SettingsService::get(&state.db, &key).await.map(ok).map_err(api_error)
}

/// PUT /settings/{key} (management)
pub async fn update_setting(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(req): Json<UpdateSettingRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let setting = SettingsService::upsert(&state.db, &key, &req, user.user_id)
        .await
        .map_err(api_error)?;

    audit_log::log(
        state.db.clone(),
        AuditEntry::new(user.user_id, "update", "SystemSetting", setting.id)
            .details(json!({ "key": setting.key }))
            .ip(client_ip(&headers)),
    );
    Ok(ok(setting))
}
