use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{
    error::{api_error, ApiError},
    middleware::security::{client_ip, user_agent},
    models::{
        auth::AuthenticatedUser,
        user::{ChangePasswordRequest, LoginRequest, RefreshTokenRequest},
    },
    services::{
        audit::{self, AuditEntry},
        auth::{AuthService, RequestOrigin, TokenSettings},
    },
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let origin = RequestOrigin { ip: client_ip(&headers), user_agent: user_agent(&headers) };
    let response = AuthService::login(
        &state.db,
        TokenSettings::from(state.config.as_ref()),
        &origin,
        &body.username,
        &body.password,
    )
    .await
    .map_err(api_error)?;

    audit::log(
        state.db.clone(),
        AuditEntry::new(response.user.id, "login", "User", response.user.id).ip(origin.ip),
    );
    Ok(Json(json!(response)))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    AuthService::refresh(&state.db, TokenSettings::from(state.config.as_ref()), &body.refresh_token)
        .await
        .map(|res| Json(json!(res)))
        .map_err(api_error)
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    AuthService::logout(&state.db, &state.config.jwt_refresh_secret, &body.refresh_token)
        .await
        .map_err(api_error)?;

    audit::log(
        state.db.clone(),
        AuditEntry::new(user.user_id, "logout", "User", user.user_id).ip(client_ip(&headers)),
    );
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn me(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<Value>, ApiError> {
    let account = AuthService::find_user(&state.db, user.user_id).await.map_err(api_error)?;
    let profile = AuthService::profile(&state.db, account).await.map_err(api_error)?;
    Ok(Json(json!(profile)))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    AuthService::change_password(&state.db, user.user_id, &body.current_password, &body.new_password)
        .await
        .map_err(api_error)?;

    audit::log(
        state.db.clone(),
        AuditEntry::new(user.user_id, "update", "User", user.user_id)
            .details(json!({ "field": "password" }))
            .ip(client_ip(&headers)),
    );
    Ok(Json(json!({ "message": "Password updated. Please log in again." })))
}
